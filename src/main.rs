use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use value_decorator::{
    DecorateReporter, Decorator, PresenceCheck, ReportFormat, RuleSet, RuleSetConfig, RulesFile,
    TransformErrorPolicy,
};

mod source;

use source::{load_document, render_document, DocumentFormat};

#[derive(Parser, Debug)]
#[command(name = "value-decorator")]
#[command(about = "Strip, rename and normalize fields of a JSON or YAML document before exposing it")]
struct Args {
    /// Document to decorate: a file path, an http(s) URL, or "-" for stdin
    input: String,

    /// Rules file (YAML or JSON)
    #[arg(long, short, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format; defaults to the output file extension, then JSON
    #[arg(long, value_enum)]
    format: Option<DocumentFormat>,

    /// Abort on the first failing value transform
    #[arg(long)]
    strict: bool,

    /// Rename and transform keys holding falsy values such as 0 or ""
    #[arg(long)]
    strict_presence: bool,

    /// Maximum nesting depth before giving up
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Print a decoration report to stderr
    #[arg(long, value_enum, value_name = "FORMAT")]
    report: Option<ReportFormat>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let rules = build_rules(&args)?;
    let decorator = Decorator::new(rules);

    let document = load_document(&args.input)
        .await
        .with_context(|| format!("Failed to load input document: {}", args.input))?;

    let (decorated, stats) = decorator
        .decorate_with_stats(document)
        .context("Failed to decorate document")?;

    let format = output_format(&args);
    let rendered = render_document(&decorated, format)?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            info!(output = %path.display(), "wrote decorated document");
        }
        None => print!("{}", rendered),
    }

    if let Some(report_format) = args.report {
        let reporter = DecorateReporter::new().with_format(report_format);
        let report = reporter.generate_report(decorator.rules(), stats);
        eprintln!("{}", reporter.format_report(&report)?);
    }

    Ok(())
}

/// Build the rule set from the rules file, then apply command-line overrides
fn build_rules(args: &Args) -> Result<RuleSet> {
    let mut config = match &args.rules {
        Some(path) => RulesFile::from_path(path)
            .and_then(RulesFile::into_config)
            .with_context(|| format!("Failed to load rules file: {}", path.display()))?,
        None => RuleSetConfig::default(),
    };

    if args.strict {
        config.on_transform_error = TransformErrorPolicy::FailFast;
    }
    if args.strict_presence {
        config.presence = PresenceCheck::Present;
    }
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }

    Ok(RuleSet::new(config))
}

fn output_format(args: &Args) -> DocumentFormat {
    args.format
        .or_else(|| args.output.as_deref().and_then(DocumentFormat::from_path))
        .unwrap_or(DocumentFormat::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("value-decorator").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_build_rules_without_file() {
        let rules = build_rules(&parse(&["input.json"])).unwrap();
        assert!(rules.is_empty());
        assert_eq!(rules.on_transform_error(), TransformErrorPolicy::FailSoft);
    }

    #[test]
    fn test_cli_overrides_rules_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "restrictedKeys: [__v]\nonTransformError: failSoft\nmaxDepth: 10").unwrap();
        let rules_path = file.path().to_str().unwrap().to_string();

        let args = parse(&[
            "input.json",
            "--rules",
            &rules_path,
            "--strict",
            "--strict-presence",
            "--max-depth",
            "4",
        ]);
        let rules = build_rules(&args).unwrap();

        assert!(rules.is_restricted("__v"));
        assert_eq!(rules.on_transform_error(), TransformErrorPolicy::FailFast);
        assert_eq!(rules.presence(), PresenceCheck::Present);
        assert_eq!(rules.max_depth(), 4);
    }

    #[test]
    fn test_bad_rules_file_is_an_error() {
        let args = parse(&["input.json", "--rules", "/nonexistent/rules.yaml"]);
        assert!(build_rules(&args).is_err());
    }

    #[tokio::test]
    async fn test_loaded_document_is_decorated() {
        let mut rules_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(rules_file, "restrictedKeys: [__v]\ntranslations: {{ _id: uid }}").unwrap();
        let mut input = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(input, r#"{{"_id": "abc", "__v": 3, "tags": ["", "a"]}}"#).unwrap();

        let args = parse(&[
            input.path().to_str().unwrap(),
            "--rules",
            rules_file.path().to_str().unwrap(),
        ]);
        let decorator = Decorator::new(build_rules(&args).unwrap());
        let document = load_document(&args.input).await.unwrap();
        let out = decorator.decorate(document).unwrap();

        let rendered = render_document(&out, output_format(&args)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, serde_json::json!({"uid": "abc", "tags": ["a"]}));
    }

    #[test]
    fn test_output_format_selection() {
        assert_eq!(output_format(&parse(&["in.json"])), DocumentFormat::Json);
        assert_eq!(output_format(&parse(&["in.json", "-o", "out.yaml"])), DocumentFormat::Yaml);
        assert_eq!(
            output_format(&parse(&["in.json", "-o", "out.yaml", "--format", "json"])),
            DocumentFormat::Json
        );
    }
}

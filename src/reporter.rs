use serde::{Deserialize, Serialize};

use crate::rules::{PresenceCheck, RuleSet, TransformErrorPolicy};

/// Reporter for rendering decoration reports in various formats
pub struct DecorateReporter {
    output_format: ReportFormat,
}

/// Available output formats for decoration reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum ReportFormat {
    Console,
    Json,
    Yaml,
}

/// What a single traversal did to its input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorateStats {
    pub keys_restricted: usize,
    pub keys_renamed: usize,
    pub values_transformed: usize,
    pub functions_dropped: usize,
    pub empty_objects_dropped: usize,
    pub elements_compacted: usize,
    /// Deepest container nesting visited, the root being 0
    pub deepest: usize,
    pub transform_failures: Vec<TransformFailure>,
}

/// A value transform that failed and was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformFailure {
    pub path: String,
    pub key: String,
    pub message: String,
}

impl DecorateStats {
    pub fn record_failure(&mut self, path: String, key: &str, message: String) {
        self.transform_failures.push(TransformFailure {
            path,
            key: key.to_string(),
            message,
        });
    }

    pub fn total_changes(&self) -> usize {
        self.keys_restricted
            + self.keys_renamed
            + self.values_transformed
            + self.functions_dropped
            + self.empty_objects_dropped
            + self.elements_compacted
    }

    pub fn has_failures(&self) -> bool {
        !self.transform_failures.is_empty()
    }
}

/// Shape of the rule set a report was produced with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub restricted_keys: usize,
    pub translations: usize,
    pub value_transforms: usize,
    pub generic_transforms: usize,
    pub on_transform_error: TransformErrorPolicy,
    pub presence: PresenceCheck,
    pub max_depth: usize,
}

impl From<&RuleSet> for RuleSummary {
    fn from(rules: &RuleSet) -> Self {
        Self {
            restricted_keys: rules.restricted_keys().count(),
            translations: rules.translations().count(),
            value_transforms: rules.value_transforms().count(),
            generic_transforms: rules.transforms().len(),
            on_transform_error: rules.on_transform_error(),
            presence: rules.presence(),
            max_depth: rules.max_depth(),
        }
    }
}

/// Full decoration report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorateReport {
    pub rules: RuleSummary,
    pub stats: DecorateStats,
    pub recommendations: Vec<String>,
}

impl DecorateReporter {
    pub fn new() -> Self {
        Self {
            output_format: ReportFormat::Console,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn generate_report(&self, rules: &RuleSet, stats: DecorateStats) -> DecorateReport {
        let summary = RuleSummary::from(rules);
        let recommendations = self.generate_recommendations(&summary, &stats);

        DecorateReport {
            rules: summary,
            stats,
            recommendations,
        }
    }

    /// Format the report according to the configured output format
    pub fn format_report(&self, report: &DecorateReport) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => Ok(self.format_console_report(report)),
            ReportFormat::Json => serde_json::to_string_pretty(report)
                .map_err(|e| ReportError::SerializationError(e.to_string())),
            ReportFormat::Yaml => serde_yaml::to_string(report)
                .map_err(|e| ReportError::SerializationError(e.to_string())),
        }
    }

    fn generate_recommendations(&self, rules: &RuleSummary, stats: &DecorateStats) -> Vec<String> {
        let mut recommendations = Vec::new();

        if stats.has_failures() {
            recommendations.push(format!(
                "{} value transform(s) failed and kept their original value",
                stats.transform_failures.len()
            ));
        }

        if rules.max_depth > 0 && stats.deepest * 4 >= rules.max_depth * 3 {
            recommendations.push(format!(
                "Input nesting reached depth {} of the {} limit",
                stats.deepest, rules.max_depth
            ));
        }

        if stats.total_changes() == 0 && !stats.has_failures() {
            recommendations.push("No rule matched the input; output equals input".to_string());
        }

        recommendations
    }

    fn format_console_report(&self, report: &DecorateReport) -> String {
        let stats = &report.stats;
        let mut output = String::new();

        output.push_str("=== Decoration Report ===\n\n");
        output.push_str(&format!("Keys restricted:       {}\n", stats.keys_restricted));
        output.push_str(&format!("Keys renamed:          {}\n", stats.keys_renamed));
        output.push_str(&format!("Values transformed:    {}\n", stats.values_transformed));
        output.push_str(&format!("Functions dropped:     {}\n", stats.functions_dropped));
        output.push_str(&format!("Empty objects dropped: {}\n", stats.empty_objects_dropped));
        output.push_str(&format!("Elements compacted:    {}\n", stats.elements_compacted));
        output.push_str(&format!("Deepest nesting:       {}\n", stats.deepest));

        if stats.has_failures() {
            output.push_str("\nTransform failures:\n");
            for failure in &stats.transform_failures {
                output.push_str(&format!("  ✗ {}: {}\n", failure.path, failure.message));
            }
        }

        if !report.recommendations.is_empty() {
            output.push_str("\nNotes:\n");
            for rec in &report.recommendations {
                output.push_str(&format!("  • {}\n", rec));
            }
        }

        output
    }
}

impl Default for DecorateReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

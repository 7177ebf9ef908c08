//! Reading and writing documents for the command-line tool.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::debug;

use value_decorator::Value;

/// Serialization format of an input or output document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            _ => None,
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.contains("json") {
            Some(DocumentFormat::Json)
        } else if content_type.contains("yaml") {
            Some(DocumentFormat::Yaml)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch document: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Read a document from a file path, an http(s) URL, or `-` for stdin
pub async fn load_document(source: &str) -> Result<Value, SourceError> {
    if source == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .map_err(|source| SourceError::Io {
                path: "<stdin>".to_string(),
                source,
            })?;
        return parse_document(&text, None);
    }

    if source.starts_with("http://") || source.starts_with("https://") {
        debug!(url = source, "fetching document");
        let response = reqwest::get(source).await?.error_for_status()?;
        let format = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(DocumentFormat::from_content_type)
            .or_else(|| DocumentFormat::from_path(Path::new(response.url().path())));
        let text = response.text().await?;
        return parse_document(&text, format);
    }

    let path = Path::new(source);
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    parse_document(&text, DocumentFormat::from_path(path))
}

/// Parse text in the given format; without one, JSON is tried before YAML
pub fn parse_document(text: &str, format: Option<DocumentFormat>) -> Result<Value, SourceError> {
    match format {
        Some(DocumentFormat::Json) => Ok(serde_json::from_str(text)?),
        Some(DocumentFormat::Yaml) => Ok(serde_yaml::from_str(text)?),
        None => match serde_json::from_str(text) {
            Ok(value) => Ok(value),
            Err(_) => Ok(serde_yaml::from_str(text)?),
        },
    }
}

pub fn render_document(value: &Value, format: DocumentFormat) -> Result<String, SourceError> {
    match format {
        DocumentFormat::Json => {
            let mut out = serde_json::to_string_pretty(value)?;
            out.push('\n');
            Ok(out)
        }
        DocumentFormat::Yaml => Ok(serde_yaml::to_string(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.txt")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_parse_without_format_falls_back_to_yaml() {
        let value = parse_document("name: Fish\n", None).unwrap();
        assert_eq!(value.to_json(), json!({"name": "Fish"}));

        let value = parse_document(r#"{"name": "Fish"}"#, None).unwrap();
        assert_eq!(value.to_json(), json!({"name": "Fish"}));
    }

    #[test]
    fn test_parse_with_wrong_format_fails() {
        assert!(matches!(
            parse_document("name: Fish", Some(DocumentFormat::Json)),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn test_render_yaml() {
        let value = Value::from(json!({"uid": "abc"}));
        let out = render_document(&value, DocumentFormat::Yaml).unwrap();
        assert_eq!(out.trim(), "uid: abc");
    }

    #[tokio::test]
    async fn test_load_document_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "name: Fish\n__v: 3").unwrap();

        let value = load_document(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(value.to_json(), json!({"name": "Fish", "__v": 3}));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_document("/nonexistent/input.json").await.unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}

//! Declarative rules files (YAML or JSON).
//!
//! ```yaml
//! restrictedKeys: [__v]
//! translations:
//!   _id: uid
//! valueTransforms:
//!   createdAt: epochMillis
//!   email: { replace: "@.*$", with: "@example.com" }
//! onTransformError: failSoft
//! presence: truthy
//! ```

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::rules::{PresenceCheck, RuleSet, RuleSetConfig, TransformErrorPolicy, DEFAULT_MAX_DEPTH};
use crate::transforms::ValueTransform;

/// Rule set as written in a rules file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RulesFile {
    /// Keys removed from every object
    #[serde(alias = "restricted")]
    pub restricted_keys: Vec<String>,
    /// Old key to new key
    #[serde(alias = "keyTransforms")]
    pub translations: IndexMap<String, String>,
    #[serde(alias = "keyValueTransforms")]
    pub value_transforms: IndexMap<String, ValueTransformSpec>,
    pub on_transform_error: Option<TransformErrorPolicy>,
    /// Older spelling of `onTransformError`; `false` means fail fast
    pub catch_errs: Option<bool>,
    pub presence: Option<PresenceCheck>,
    pub max_depth: Option<usize>,
}

/// A value transform reference inside a rules file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueTransformSpec {
    /// Name of a builtin transform, e.g. `epochMillis`
    Builtin(String),
    Replace {
        replace: String,
        #[serde(default)]
        with: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML rules: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON rules: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern for value transform '{key}': {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },
}

impl RulesFile {
    /// Load a rules file; `.yaml`/`.yml` files are read as YAML, anything else as JSON
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::from_yaml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn error_policy(&self) -> TransformErrorPolicy {
        self.on_transform_error
            .or_else(|| {
                self.catch_errs.map(|catch| {
                    if catch {
                        TransformErrorPolicy::FailSoft
                    } else {
                        TransformErrorPolicy::FailFast
                    }
                })
            })
            .unwrap_or_default()
    }

    /// Resolve into a partial configuration; builtin names are checked only when a rule fires
    pub fn into_config(self) -> Result<RuleSetConfig, ConfigError> {
        let on_transform_error = self.error_policy();

        let mut value_transforms = IndexMap::with_capacity(self.value_transforms.len());
        for (key, spec) in self.value_transforms {
            let transform = match spec {
                ValueTransformSpec::Builtin(name) => ValueTransform::builtin(name),
                ValueTransformSpec::Replace { replace, with } => {
                    let pattern = Regex::new(&replace).map_err(|source| ConfigError::InvalidPattern {
                        key: key.clone(),
                        source,
                    })?;
                    ValueTransform::replace(pattern, with)
                }
            };
            value_transforms.insert(key, transform);
        }

        Ok(RuleSetConfig {
            restricted_keys: self.restricted_keys,
            translations: self.translations,
            value_transforms,
            transforms: Vec::new(),
            on_transform_error,
            presence: self.presence.unwrap_or_default(),
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        })
    }

    pub fn into_rule_set(self) -> Result<RuleSet, ConfigError> {
        self.into_config().map(RuleSet::new)
    }
}

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::transforms::{TransformError, ValueTransform};
use crate::value::{Map, Value};

/// Default limit on nested containers before a traversal is aborted
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Callback invoked for every (node, key, value) triple of an object
pub type GenericTransform = Arc<dyn Fn(&mut Map, &str, &Value) + Send + Sync>;

/// What happens when a value transform returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformErrorPolicy {
    /// Log the failure, keep the original value and continue
    #[default]
    FailSoft,
    /// Abort the traversal with the error
    FailFast,
}

/// How a key qualifies for renaming and value transforms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresenceCheck {
    /// The key must hold a truthy value; `0`, `""`, `false` and null are skipped
    #[default]
    Truthy,
    /// Any defined value qualifies
    Present,
}

impl PresenceCheck {
    pub fn admits(self, value: &Value) -> bool {
        match self {
            PresenceCheck::Truthy => value.is_truthy(),
            PresenceCheck::Present => !value.is_undefined(),
        }
    }
}

/// Caller-supplied partial configuration; every field defaults to empty
#[derive(Clone)]
pub struct RuleSetConfig {
    pub restricted_keys: Vec<String>,
    /// Old key to new key, applied in declared order
    pub translations: IndexMap<String, String>,
    pub value_transforms: IndexMap<String, ValueTransform>,
    pub transforms: Vec<GenericTransform>,
    pub on_transform_error: TransformErrorPolicy,
    pub presence: PresenceCheck,
    pub max_depth: usize,
}

impl Default for RuleSetConfig {
    fn default() -> Self {
        Self {
            restricted_keys: Vec::new(),
            translations: IndexMap::new(),
            value_transforms: IndexMap::new(),
            transforms: Vec::new(),
            on_transform_error: TransformErrorPolicy::default(),
            presence: PresenceCheck::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl fmt::Debug for RuleSetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSetConfig")
            .field("restricted_keys", &self.restricted_keys)
            .field("translations", &self.translations)
            .field("value_transforms", &self.value_transforms)
            .field("transforms", &self.transforms.len())
            .field("on_transform_error", &self.on_transform_error)
            .field("presence", &self.presence)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// Immutable set of rules shared by every traversal of one decorator
#[derive(Clone)]
pub struct RuleSet {
    restricted_keys: IndexSet<String>,
    translations: IndexMap<String, String>,
    value_transforms: IndexMap<String, ValueTransform>,
    transforms: Vec<GenericTransform>,
    on_transform_error: TransformErrorPolicy,
    presence: PresenceCheck,
    max_depth: usize,
}

impl RuleSet {
    pub fn new(config: RuleSetConfig) -> Self {
        Self {
            restricted_keys: config.restricted_keys.into_iter().collect(),
            translations: config.translations,
            value_transforms: config.value_transforms,
            transforms: config.transforms,
            on_transform_error: config.on_transform_error,
            presence: config.presence,
            max_depth: config.max_depth,
        }
    }

    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    pub fn restricted_keys(&self) -> impl Iterator<Item = &str> {
        self.restricted_keys.iter().map(String::as_str)
    }

    pub fn is_restricted(&self, key: &str) -> bool {
        self.restricted_keys.contains(key)
    }

    pub fn translations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.translations
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }

    pub fn value_transforms(&self) -> impl Iterator<Item = (&str, &ValueTransform)> {
        self.value_transforms.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn transforms(&self) -> &[GenericTransform] {
        &self.transforms
    }

    pub fn on_transform_error(&self) -> TransformErrorPolicy {
        self.on_transform_error
    }

    pub fn presence(&self) -> PresenceCheck {
        self.presence
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_empty(&self) -> bool {
        self.restricted_keys.is_empty()
            && self.translations.is_empty()
            && self.value_transforms.is_empty()
            && self.transforms.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(RuleSetConfig::default())
    }
}

impl From<RuleSetConfig> for RuleSet {
    fn from(config: RuleSetConfig) -> Self {
        Self::new(config)
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("restricted_keys", &self.restricted_keys)
            .field("translations", &self.translations)
            .field("value_transforms", &self.value_transforms)
            .field("transforms", &self.transforms.len())
            .field("on_transform_error", &self.on_transform_error)
            .field("presence", &self.presence)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// Incremental construction of a [`RuleSet`]
#[derive(Default)]
pub struct RuleSetBuilder {
    config: RuleSetConfig,
}

impl RuleSetBuilder {
    pub fn restrict(mut self, key: impl Into<String>) -> Self {
        self.config.restricted_keys.push(key.into());
        self
    }

    pub fn restrict_all<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .restricted_keys
            .extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn translate(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.translations.insert(from.into(), to.into());
        self
    }

    pub fn value_transform(mut self, key: impl Into<String>, transform: ValueTransform) -> Self {
        self.config.value_transforms.insert(key.into(), transform);
        self
    }

    /// Register a fallible closure as the value transform for `key`
    pub fn transform_value<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        self.value_transform(key, ValueTransform::func(f))
    }

    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Map, &str, &Value) + Send + Sync + 'static,
    {
        self.config.transforms.push(Arc::new(f));
        self
    }

    pub fn on_transform_error(mut self, policy: TransformErrorPolicy) -> Self {
        self.config.on_transform_error = policy;
        self
    }

    pub fn presence(mut self, presence: PresenceCheck) -> Self {
        self.config.presence = presence;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn build(self) -> RuleSet {
        RuleSet::new(self.config)
    }
}

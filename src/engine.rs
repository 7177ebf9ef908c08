//! Recursive traversal that applies a [`RuleSet`] to a value tree.
//!
//! Every object node goes through the same pipeline before its children are
//! visited: restriction, value transforms, key renames, generic transforms,
//! then descent. Arrays are mapped element by element and compacted.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::reporter::DecorateStats;
use crate::rules::{RuleSet, RuleSetConfig, TransformErrorPolicy};
use crate::transforms::TransformError;
use crate::value::{Map, Value};

/// Applies one rule set to any number of input values
#[derive(Debug, Clone)]
pub struct Decorator {
    rules: Arc<RuleSet>,
}

/// Errors that abort a traversal
#[derive(Debug, Error)]
pub enum DecorateError {
    #[error("value transform for '{key}' failed at {path}: {source}")]
    ValueTransformFailed {
        path: String,
        key: String,
        #[source]
        source: TransformError,
    },

    #[error("value transform for '{key}' at {path} names unknown builtin '{name}'")]
    UnknownTransform {
        path: String,
        key: String,
        name: String,
    },

    #[error("nesting deeper than {limit} levels at {path}")]
    DepthExceeded { limit: usize, path: String },
}

/// Build a decorating closure from a partial configuration
pub fn decorator(
    config: RuleSetConfig,
) -> impl Fn(Value) -> Result<Value, DecorateError> + Send + Sync {
    let engine = Decorator::new(RuleSet::new(config));
    move |value| engine.decorate(value)
}

impl Decorator {
    pub fn new(rules: impl Into<Arc<RuleSet>>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Produce the cleaned copy of `value`. `Value::Undefined` in, `Value::Undefined` out.
    pub fn decorate(&self, value: Value) -> Result<Value, DecorateError> {
        self.decorate_with_stats(value).map(|(value, _)| value)
    }

    pub fn decorate_with_stats(&self, value: Value) -> Result<(Value, DecorateStats), DecorateError> {
        debug!(shape = ?value.shape(), "decorating value");

        let mut pass = Pass::new(&self.rules);
        let decorated = pass.process(value)?;

        debug!(
            restricted = pass.stats.keys_restricted,
            renamed = pass.stats.keys_renamed,
            transformed = pass.stats.values_transformed,
            failures = pass.stats.transform_failures.len(),
            "decoration finished"
        );
        Ok((decorated, pass.stats))
    }
}

#[derive(Debug, Clone)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Where a key is about to be rewritten, for diagnostics
struct KeyPath<'a> {
    parent: &'a [PathSegment],
    key: &'a str,
}

impl fmt::Display for KeyPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_path(f, self.parent)?;
        if self.parent.is_empty() {
            f.write_str(self.key)
        } else {
            write!(f, ".{}", self.key)
        }
    }
}

fn write_path(f: &mut fmt::Formatter<'_>, path: &[PathSegment]) -> fmt::Result {
    for (i, segment) in path.iter().enumerate() {
        match segment {
            PathSegment::Key(key) if i == 0 => f.write_str(key)?,
            PathSegment::Key(key) => write!(f, ".{}", key)?,
            PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
        }
    }
    Ok(())
}

struct DisplayPath<'a>(&'a [PathSegment]);

impl fmt::Display for DisplayPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        write_path(f, self.0)
    }
}

enum Disposition {
    Skip,
    DropUndefined,
    DropFunction,
    DropEmpty,
    Descend,
}

/// Traversal-local state; the rule set itself is never written to
struct Pass<'r> {
    rules: &'r RuleSet,
    path: Vec<PathSegment>,
    stats: DecorateStats,
}

impl<'r> Pass<'r> {
    fn new(rules: &'r RuleSet) -> Self {
        Self {
            rules,
            path: Vec::new(),
            stats: DecorateStats::default(),
        }
    }

    fn process(&mut self, value: Value) -> Result<Value, DecorateError> {
        match value {
            Value::Array(items) => self.decorate_array(items),
            Value::Object(node) => self.decorate_object(node),
            Value::Document(document) => self.decorate_object(document.to_object()),
            Value::Function(_) => {
                self.stats.functions_dropped += 1;
                Ok(Value::Undefined)
            }
            scalar @ (Value::Undefined
            | Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Date(_)) => Ok(scalar),
        }
    }

    fn enter(&mut self) -> Result<(), DecorateError> {
        let depth = self.path.len();
        if depth > self.rules.max_depth() {
            return Err(DecorateError::DepthExceeded {
                limit: self.rules.max_depth(),
                path: DisplayPath(&self.path).to_string(),
            });
        }
        self.stats.deepest = self.stats.deepest.max(depth);
        Ok(())
    }

    fn key_path(&self, key: &str) -> String {
        KeyPath {
            parent: &self.path,
            key,
        }
        .to_string()
    }

    fn decorate_object(&mut self, mut node: Map) -> Result<Value, DecorateError> {
        self.enter()?;
        let rules = self.rules;
        let presence = rules.presence();

        for key in rules.restricted_keys() {
            if node.shift_remove(key).is_some() {
                self.stats.keys_restricted += 1;
            }
        }

        for (key, transform) in rules.value_transforms() {
            let Some(current) = node.get_mut(key) else {
                continue;
            };
            if !presence.admits(current) {
                continue;
            }

            match transform.apply(current) {
                Ok(next) => {
                    *current = next;
                    self.stats.values_transformed += 1;
                }
                Err(TransformError::UnknownBuiltin(name)) => {
                    return Err(DecorateError::UnknownTransform {
                        path: self.key_path(key),
                        key: key.to_string(),
                        name,
                    });
                }
                Err(source) => match rules.on_transform_error() {
                    TransformErrorPolicy::FailFast => {
                        return Err(DecorateError::ValueTransformFailed {
                            path: self.key_path(key),
                            key: key.to_string(),
                            source,
                        });
                    }
                    TransformErrorPolicy::FailSoft => {
                        let path = self.key_path(key);
                        warn!(
                            path = %path,
                            value = ?current,
                            error = %source,
                            "value transform failed, keeping original value"
                        );
                        self.stats.record_failure(path, key, source.to_string());
                    }
                },
            }
        }

        for (from, to) in rules.translations() {
            if !node.get(from).is_some_and(|v| presence.admits(v)) {
                continue;
            }
            // Copy then delete: a key renamed onto itself ends up removed.
            if let Some(value) = node.shift_remove(from) {
                trace!(from, to, "renaming key");
                if from != to {
                    node.insert(to.to_string(), value);
                }
                self.stats.keys_renamed += 1;
            }
        }

        // Keys added by callbacks below stay in the node but are not visited in this pass.
        let keys: Vec<String> = node.keys().cloned().collect();
        for key in keys {
            if !rules.transforms().is_empty() {
                if let Some(value) = node.get(&key).filter(|v| !v.is_undefined()).cloned() {
                    for transform in rules.transforms() {
                        transform(&mut node, key.as_str(), &value);
                    }
                }
            }

            if let Some(slot) = node.get_mut(&key) {
                if let Value::Document(document) = slot {
                    let plain = document.to_object();
                    *slot = Value::Object(plain);
                }
            }

            let disposition = match node.get(&key) {
                None => Disposition::Skip,
                Some(Value::Undefined) => Disposition::DropUndefined,
                Some(Value::Function(_)) => Disposition::DropFunction,
                Some(Value::Object(child)) if child.is_empty() => Disposition::DropEmpty,
                Some(_) => Disposition::Descend,
            };

            match disposition {
                Disposition::Skip => {}
                Disposition::DropUndefined => {
                    node.shift_remove(&key);
                }
                Disposition::DropFunction => {
                    node.shift_remove(&key);
                    self.stats.functions_dropped += 1;
                }
                Disposition::DropEmpty => {
                    node.shift_remove(&key);
                    self.stats.empty_objects_dropped += 1;
                }
                Disposition::Descend => {
                    if let Some(slot) = node.get_mut(&key) {
                        let child = std::mem::take(slot);
                        self.path.push(PathSegment::Key(key.clone()));
                        let result = self.process(child);
                        self.path.pop();
                        *slot = result?;
                    }
                }
            }
        }

        Ok(Value::Object(node))
    }

    fn decorate_array(&mut self, items: Vec<Value>) -> Result<Value, DecorateError> {
        self.enter()?;

        let mut kept = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            self.path.push(PathSegment::Index(index));
            let result = self.process(item);
            self.path.pop();

            let element = result?;
            if is_compactable(&element) {
                self.stats.elements_compacted += 1;
            } else {
                kept.push(element);
            }
        }

        Ok(Value::Array(kept))
    }
}

/// Falsy results and objects that render as `{}` do not survive in arrays
fn is_compactable(element: &Value) -> bool {
    match element {
        Value::Object(map) => map
            .values()
            .all(|v| matches!(v, Value::Undefined | Value::Function(_))),
        other => !other.is_truthy(),
    }
}

// Recursive value decoration for external exposure
pub mod config;
pub mod engine;
pub mod reporter;
pub mod rules;
pub mod transforms;
pub mod value;

// Re-export core types for convenience
pub use config::{ConfigError, RulesFile, ValueTransformSpec};
pub use engine::{decorator, DecorateError, Decorator};
pub use reporter::{DecorateReport, DecorateReporter, DecorateStats, ReportFormat, TransformFailure};
pub use rules::{
    GenericTransform, PresenceCheck, RuleSet, RuleSetBuilder, RuleSetConfig, TransformErrorPolicy,
};
pub use transforms::{TransformError, ValueTransform};
pub use value::{Function, Map, Shape, ToObject, Value};

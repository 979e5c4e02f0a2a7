// Blockcheck Core Library
//
// Rule-based classification of document blocks and structural queries over
// the labelled result. Loaders feed blocks in, the classifier attaches
// classes, then selectors, content rules and formatting checks read them
// back out.

pub mod types;
pub mod error;
pub mod matchers;
pub mod classifier;
pub mod selector;
pub mod loaders;
pub mod config;
pub mod content_rules;
pub mod styles;
pub mod report;
pub mod processor;

// Re-export main types and functions for easy use
pub use types::*;
pub use error::{ConfigError, SelectorError, SelectorErrorKind};
pub use matchers::MatchSpec;
pub use classifier::{classify, ClassRule, Classifier};
pub use selector::Selector;
pub use loaders::{loader_for_path, DocumentLoader, JsonLoader, XhtmlLoader};
pub use config::CheckConfig;
pub use content_rules::{ContentRule, RuleChecker};
pub use styles::StyleChecker;
pub use report::{CheckReport, ReportFormat};
pub use processor::{CheckOutcome, DocumentChecker, StepProfiler};

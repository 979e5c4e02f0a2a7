// Typed errors for the classification and query engine.
//
// Configuration errors are authoring mistakes in the rule set and stop the
// whole run. Selector errors are fatal to the single query that produced them.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Rules reference each other in a loop. `cycle` starts and ends with the same class.
    #[error("cyclic class dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A rule names a class that no rule assigns
    #[error("rule '{}' references undeclared class '{class}'", .rule.join(" > "))]
    UnknownClass { rule: Vec<String>, class: String },

    #[error("rule '{}' has an invalid pattern '{pattern}': {source}", .rule.join(" > "))]
    InvalidPattern {
        rule: Vec<String>,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{rule}' has a malformed match: {reason}")]
    MalformedMatch { rule: String, reason: String },

    #[error("content rule '{rule}' has an invalid selector: {source}")]
    InvalidSelector {
        rule: String,
        #[source]
        source: SelectorError,
    },

    #[error("content rule '{rule}' has an invalid count expression '{expression}'")]
    InvalidCount { rule: String, expression: String },

    #[error("content rule '{rule}' is invalid: {reason}")]
    InvalidCheck { rule: String, reason: String },

    #[error("config import cycle: {}", .chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorErrorKind {
    Empty,
    UnexpectedEnd,
    UnexpectedChar(char),
    UnsupportedCombinator(char),
    UnknownPseudoClass(String),
    InvalidIndex(String),
    UnknownAttribute(String),
    InvalidAttributeValue(String),
    UnterminatedString,
}

impl fmt::Display for SelectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty selector"),
            Self::UnexpectedEnd => write!(f, "unexpected end of selector"),
            Self::UnexpectedChar(c) => write!(f, "unexpected character '{c}'"),
            Self::UnsupportedCombinator(' ') => write!(f, "descendant combinator is not supported"),
            Self::UnsupportedCombinator(c) => write!(f, "combinator '{c}' is not supported"),
            Self::UnknownPseudoClass(name) => write!(f, "unknown pseudo-class ':{name}'"),
            Self::InvalidIndex(arg) => write!(f, "invalid index '{arg}'"),
            Self::UnknownAttribute(name) => write!(f, "unknown attribute '{name}'"),
            Self::InvalidAttributeValue(value) => write!(f, "invalid attribute value '{value}'"),
            Self::UnterminatedString => write!(f, "unterminated string"),
        }
    }
}

/// Malformed selector text, pinpointing the offending fragment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("selector syntax error at offset {offset}: {kind} (near '{fragment}')")]
pub struct SelectorError {
    pub kind: SelectorErrorKind,
    /// Byte offset into the selector text
    pub offset: usize,
    pub fragment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_chain() {
        let err = ConfigError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic class dependency: a -> b -> a");
    }

    #[test]
    fn test_unknown_class_message_names_rule_chain() {
        let err = ConfigError::UnknownClass {
            rule: vec!["front-matter".into(), "authors".into()],
            class: "title".into(),
        };
        assert_eq!(
            err.to_string(),
            "rule 'front-matter > authors' references undeclared class 'title'"
        );
    }
}

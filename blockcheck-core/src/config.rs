use crate::classifier::ClassRule;
use crate::content_rules::ContentRule;
use crate::error::ConfigError;
use crate::matchers::MatchSpec;
use crate::styles::class_key;
use crate::types::{BlockKind, BlockStyle};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

// `(title, abstract)` - brackets of either shape, class names may contain hyphens
static RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\[\(])\s*([\w-]+)\s*,\s*([\w-]+)\s*([\]\)])$").unwrap()
});

/// A complete check configuration: classifier rules, content rules and
/// expected formatting per class
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckConfig {
    /// Other config files, relative to this one. Their entries come first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default)]
    pub classifiers: Vec<ClassifierConfig>,
    #[serde(default)]
    pub rules: Vec<ContentRule>,
    /// Keyed by class, with or without the leading dot (`.title` or `title`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, BlockStyle>,
}

/// One `classifiers:` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    pub class: String,
    #[serde(rename = "match")]
    pub match_config: MatchConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ClassifierConfig>,
}

/// `type`, `position` and `pattern` are independent conditions; a block
/// must satisfy every one that is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    /// Restricts the rule to one block kind
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BlockKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// `position:` as a `{type: ..}` mapping or the shorthand `0`, `-1`,
/// `first`, `last`. The shorthand is absolute at the top level and
/// relative to the parent's range inside `children`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PositionValue {
    Spec(PositionConfig),
    Index(i64),
    Named(NamedPosition),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NamedPosition {
    First,
    Last,
}

impl NamedPosition {
    fn index(self) -> i64 {
        match self {
            NamedPosition::First => 0,
            NamedPosition::Last => -1,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "first" => Some(NamedPosition::First),
            "last" => Some(NamedPosition::Last),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PositionConfig {
    Absolute {
        index: i64,
    },
    Relative {
        index: RelativeIndex,
    },
    Next {
        class: String,
        #[serde(default)]
        offset: usize,
    },
    Prev {
        class: String,
        #[serde(default)]
        offset: usize,
    },
}

/// `index: -1`, `index: last` or `index: "(title, abstract)"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RelativeIndex {
    Index(i64),
    Range(String),
}

/// Parse a range expression into its two anchor classes.
///
/// `[a, b]`, `(a, b]` and friends are all accepted; the range is always
/// evaluated as the open interval between the anchors.
pub fn parse_range_expression(expression: &str) -> Option<(String, String)> {
    let caps = RANGE_REGEX.captures(expression.trim())?;
    Some((caps[2].to_string(), caps[3].to_string()))
}

impl ClassifierConfig {
    fn to_rule(&self, parent_path: &[String]) -> Result<ClassRule, ConfigError> {
        let mut path = parent_path.to_vec();
        path.push(self.class.clone());
        let malformed = |reason: String| ConfigError::MalformedMatch {
            rule: path.join(" > "),
            reason,
        };

        let m = &self.match_config;
        let (match_spec, pattern) = match (&m.position, &m.pattern) {
            (None, None) => {
                return Err(malformed("needs 'position', 'pattern' or both".to_string()))
            }
            (None, Some(pattern)) => (
                MatchSpec::ContentPattern {
                    pattern: pattern.clone(),
                },
                None,
            ),
            (Some(position), pattern) => {
                (Self::position_spec(position, parent_path.is_empty(), &malformed)?, pattern.clone())
            }
        };

        let children = self
            .children
            .iter()
            .map(|child| child.to_rule(&path))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ClassRule {
            class_name: self.class.clone(),
            match_spec,
            kind: m.kind,
            pattern,
            children,
        })
    }

    fn position_spec(
        position: &PositionValue,
        top_level: bool,
        malformed: &dyn Fn(String) -> ConfigError,
    ) -> Result<MatchSpec, ConfigError> {
        let shorthand = |index: i64| {
            if top_level {
                MatchSpec::AbsoluteIndex { index }
            } else {
                MatchSpec::RelativeIndex { index }
            }
        };

        let spec = match position {
            PositionValue::Index(index) => shorthand(*index),
            PositionValue::Named(named) => shorthand(named.index()),
            PositionValue::Spec(PositionConfig::Absolute { index }) => {
                MatchSpec::AbsoluteIndex { index: *index }
            }
            PositionValue::Spec(PositionConfig::Relative {
                index: RelativeIndex::Index(index),
            }) => MatchSpec::RelativeIndex { index: *index },
            PositionValue::Spec(PositionConfig::Relative {
                index: RelativeIndex::Range(expression),
            }) => {
                if let Some(named) = NamedPosition::parse(expression) {
                    return Ok(MatchSpec::RelativeIndex {
                        index: named.index(),
                    });
                }
                let (start_class, end_class) = parse_range_expression(expression).ok_or_else(|| {
                    malformed(format!(
                        "range '{expression}' needs two class names, e.g. '(title, abstract)'"
                    ))
                })?;
                MatchSpec::Between {
                    start_class,
                    end_class,
                }
            }
            PositionValue::Spec(PositionConfig::Next { class, offset }) => MatchSpec::Next {
                ref_class: class.clone(),
                offset: *offset,
            },
            PositionValue::Spec(PositionConfig::Prev { class, offset }) => MatchSpec::Prev {
                ref_class: class.clone(),
                offset: *offset,
            },
        };
        Ok(spec)
    }
}

impl CheckConfig {
    /// Parse a single YAML document. `imports` are kept but not resolved.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // an empty file is an empty config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: CheckConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Load config from file path, resolving `imports` recursively
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut chain = Vec::new();
        Self::load_resolved(path, &mut chain)
    }

    fn load_resolved(path: &Path, chain: &mut Vec<PathBuf>) -> Result<Self> {
        let canonical = fs::canonicalize(path)
            .with_context(|| format!("config file not found: {}", path.display()))?;
        if chain.contains(&canonical) {
            let mut cycle: Vec<String> = chain.iter().map(|p| p.display().to_string()).collect();
            cycle.push(canonical.display().to_string());
            let start = chain.iter().position(|p| p == &canonical).unwrap_or(0);
            return Err(ConfigError::ImportCycle {
                chain: cycle.split_off(start),
            }
            .into());
        }

        let content = fs::read_to_string(&canonical)
            .with_context(|| format!("failed to read config {}", canonical.display()))?;
        let own = Self::from_yaml_str(&content)
            .with_context(|| format!("invalid config {}", canonical.display()))?;

        chain.push(canonical.clone());
        let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut merged = Self::default();
        for import in &own.imports {
            debug!("📎 {} imports {}", canonical.display(), import);
            let imported = Self::load_resolved(&base_dir.join(import), chain)?;
            merged.merge(imported);
        }
        chain.pop();

        merged.merge(own);
        Ok(merged)
    }

    /// Append `other`'s entries. Style properties it declares override ours.
    fn merge(&mut self, other: CheckConfig) {
        self.classifiers.extend(other.classifiers);
        self.rules.extend(other.rules);
        for (selector, style) in other.styles {
            self.styles
                .entry(class_key(&selector).to_string())
                .or_default()
                .overlay(&style);
        }
    }

    /// Classifier entries as class rules
    pub fn class_rules(&self) -> Result<Vec<ClassRule>, ConfigError> {
        self.classifiers.iter().map(|c| c.to_rule(&[])).collect()
    }

    /// SHA-256 of the resolved configuration, stable across formatting and import layout
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(&(&self.classifiers, &self.rules, &self.styles))
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

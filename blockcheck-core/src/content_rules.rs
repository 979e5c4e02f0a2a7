// Content rules - selector-addressed checks over a labelled document.
//
// Each rule selects blocks and applies exactly one check:
// - pattern: every selected block's text must match at its start
// - exists: whether anything is selected
// - count: number of selected blocks against an expression (">= 2", "3", ...)
// - count_equals: number of selected blocks against a number derived from
//   another selection
//
// An optional condition gates the rule. Selectors, patterns and count
// expressions are all compiled by `RuleChecker::new`, so a broken rule set
// fails before any document is checked.

use crate::error::ConfigError;
use crate::selector::Selector;
use crate::types::{Block, Evidence, Issue, LabelledDocument, Location, Severity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

// ===== CONFIG TYPES =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRule {
    pub id: String,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    pub check: CheckSpec,
    #[serde(default)]
    pub severity: Severity,
    /// Defaults to "Rule <id> failed"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Exactly one field must be set. When several are, the first in
/// declaration order wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_equals: Option<CountEqualsSpec>,
}

/// `count: 3` or `count: ">= 2"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CountSpec {
    Exact(usize),
    Expression(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountEqualsSpec {
    pub selector: String,
    #[serde(default)]
    pub method: CountMethod,
    /// Regex whose matches are taken from each reference block's text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CountMethod {
    /// Number of reference blocks
    #[default]
    Count,
    /// Largest number extracted from any reference block
    Max,
    /// Total number of extract matches over all reference blocks
    Sum,
}

/// Gates a rule on the state of another selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub selector: String,
    /// Holds when any selected block's text contains a match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountSpec>,
}

impl CountMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountMethod::Count => "count",
            CountMethod::Max => "max",
            CountMethod::Sum => "sum",
        }
    }
}

// ===== COUNT EXPRESSIONS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountExpr {
    pub op: Comparison,
    pub value: usize,
}

impl CountExpr {
    /// Parse `>= n`, `<= n`, `> n`, `< n`, `== n`, `!= n` or a bare `n`
    pub fn parse(expression: &str) -> Option<Self> {
        let expression = expression.trim();
        // two-character operators first so ">=" is not read as ">"
        let operators = [
            (">=", Comparison::Ge),
            ("<=", Comparison::Le),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            (">", Comparison::Gt),
            ("<", Comparison::Lt),
        ];
        let (op, rest) = operators
            .iter()
            .find_map(|(prefix, op)| expression.strip_prefix(prefix).map(|rest| (*op, rest)))
            .unwrap_or((Comparison::Eq, expression));
        let value = rest.trim().parse().ok()?;
        Some(Self { op, value })
    }

    fn from_spec(spec: &CountSpec, rule_id: &str) -> Result<Self, ConfigError> {
        match spec {
            CountSpec::Exact(value) => Ok(Self {
                op: Comparison::Eq,
                value: *value,
            }),
            CountSpec::Expression(text) => Self::parse(text).ok_or_else(|| ConfigError::InvalidCount {
                rule: rule_id.to_string(),
                expression: text.clone(),
            }),
        }
    }

    pub fn holds(&self, count: usize) -> bool {
        match self.op {
            Comparison::Ge => count >= self.value,
            Comparison::Le => count <= self.value,
            Comparison::Gt => count > self.value,
            Comparison::Lt => count < self.value,
            Comparison::Eq => count == self.value,
            Comparison::Ne => count != self.value,
        }
    }
}

impl fmt::Display for CountExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        };
        write!(f, "{op} {}", self.value)
    }
}

// ===== COMPILED RULES =====

enum CompiledCheck {
    Pattern { source: String, regex: Regex },
    Exists(bool),
    Count(CountExpr),
    CountEquals {
        reference: Selector,
        method: CountMethod,
        extract: Option<Regex>,
    },
}

enum CompiledCondition {
    Pattern { selector: Selector, regex: Regex },
    Count { selector: Selector, expr: CountExpr },
}

struct CompiledRule {
    id: String,
    selector: Selector,
    condition: Option<CompiledCondition>,
    check: CompiledCheck,
    severity: Severity,
    message: String,
}

fn compile_selector(text: &str, rule_id: &str) -> Result<Selector, ConfigError> {
    Selector::parse(text).map_err(|source| ConfigError::InvalidSelector {
        rule: rule_id.to_string(),
        source,
    })
}

fn compile_regex(pattern: &str, anchored: bool, rule_id: &str) -> Result<Regex, ConfigError> {
    let source = if anchored {
        format!("^(?:{pattern})")
    } else {
        pattern.to_string()
    };
    Regex::new(&source).map_err(|source| ConfigError::InvalidPattern {
        rule: vec![rule_id.to_string()],
        pattern: pattern.to_string(),
        source,
    })
}

impl CompiledRule {
    fn compile(rule: &ContentRule) -> Result<Self, ConfigError> {
        let id = rule.id.as_str();
        let selector = compile_selector(&rule.selector, id)?;

        let condition = match &rule.condition {
            None => None,
            Some(condition) => {
                let selector = compile_selector(&condition.selector, id)?;
                match (&condition.pattern, &condition.count) {
                    (Some(pattern), _) => Some(CompiledCondition::Pattern {
                        selector,
                        regex: compile_regex(pattern, false, id)?,
                    }),
                    (None, Some(count)) => Some(CompiledCondition::Count {
                        selector,
                        expr: CountExpr::from_spec(count, id)?,
                    }),
                    // a bare selector gates nothing
                    (None, None) => None,
                }
            }
        };

        let spec = &rule.check;
        let check = if let Some(pattern) = &spec.pattern {
            CompiledCheck::Pattern {
                source: pattern.clone(),
                regex: compile_regex(pattern, true, id)?,
            }
        } else if let Some(exists) = spec.exists {
            CompiledCheck::Exists(exists)
        } else if let Some(count) = &spec.count {
            CompiledCheck::Count(CountExpr::from_spec(count, id)?)
        } else if let Some(count_equals) = &spec.count_equals {
            let extract = match (&count_equals.extract, count_equals.method) {
                (Some(pattern), _) => Some(compile_regex(pattern, false, id)?),
                (None, CountMethod::Count) => None,
                (None, method) => {
                    return Err(ConfigError::InvalidCheck {
                        rule: id.to_string(),
                        reason: format!(
                            "count_equals method '{}' needs an 'extract' pattern",
                            method.as_str()
                        ),
                    })
                }
            };
            CompiledCheck::CountEquals {
                reference: compile_selector(&count_equals.selector, id)?,
                method: count_equals.method,
                extract,
            }
        } else {
            return Err(ConfigError::InvalidCheck {
                rule: id.to_string(),
                reason: "check needs one of pattern, exists, count, count_equals".to_string(),
            });
        };

        Ok(Self {
            id: id.to_string(),
            selector,
            condition,
            check,
            severity: rule.severity,
            message: rule
                .message
                .clone()
                .unwrap_or_else(|| format!("Rule {id} failed")),
        })
    }

    fn condition_holds(&self, doc: &LabelledDocument) -> bool {
        match &self.condition {
            None => true,
            Some(CompiledCondition::Pattern { selector, regex }) => selector
                .evaluate(doc)
                .iter()
                .any(|block| regex.is_match(&block.text())),
            Some(CompiledCondition::Count { selector, expr }) => {
                expr.holds(selector.evaluate(doc).len())
            }
        }
    }

    fn issue(&self, location: Location, expected: String, actual: String) -> Issue {
        Issue {
            code: self.id.clone(),
            severity: self.severity,
            message: self.message.clone(),
            location,
            evidence: Some(Evidence { expected, actual }),
        }
    }

    fn check(&self, doc: &LabelledDocument, issues: &mut Vec<Issue>) {
        if !self.condition_holds(doc) {
            debug!("   ⏭️  {}: condition not met", self.id);
            return;
        }

        let targets = self.selector.evaluate(doc);
        let before = issues.len();

        match &self.check {
            CompiledCheck::Pattern { source, regex } => {
                for block in &targets {
                    let text = block.text();
                    if !regex.is_match(&text) {
                        issues.push(self.issue(
                            Location::block(block),
                            format!("Pattern: {source}"),
                            text,
                        ));
                    }
                }
            }
            CompiledCheck::Exists(expected) => {
                let exists = !targets.is_empty();
                if exists != *expected {
                    issues.push(self.issue(
                        Location::document("existence check"),
                        format!("Exists: {expected}"),
                        format!("Exists: {exists}"),
                    ));
                }
            }
            CompiledCheck::Count(expr) => {
                if !expr.holds(targets.len()) {
                    issues.push(self.issue(
                        Location::document("count check"),
                        format!("Count {expr}"),
                        format!("Count: {}", targets.len()),
                    ));
                }
            }
            CompiledCheck::CountEquals {
                reference,
                method,
                extract,
            } => {
                let reference_blocks = reference.evaluate(doc);
                let expected = reference_count(&reference_blocks, *method, extract.as_ref());
                if targets.len() != expected {
                    issues.push(self.issue(
                        Location::document("count comparison"),
                        format!("Count: {expected}"),
                        format!("Count: {}", targets.len()),
                    ));
                }
            }
        }

        debug!(
            "   🔎 {}: {} targets, {} issues",
            self.id,
            targets.len(),
            issues.len() - before
        );
    }
}

/// Number the target count is compared against in a count_equals check
fn reference_count(blocks: &[&Block], method: CountMethod, extract: Option<&Regex>) -> usize {
    let Some(extract) = extract else {
        return blocks.len();
    };

    // first capture group when the pattern has one, whole match otherwise
    let extracted = |text: &str| -> Vec<String> {
        extract
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().to_string())
            .collect()
    };

    match method {
        CountMethod::Count => blocks.len(),
        CountMethod::Max => blocks
            .iter()
            .flat_map(|block| extracted(&block.text()))
            .filter_map(|n| n.trim().parse::<usize>().ok())
            .max()
            .unwrap_or(0),
        CountMethod::Sum => blocks
            .iter()
            .map(|block| extracted(&block.text()).len())
            .sum(),
    }
}

// ===== CHECKER =====

/// A validated content rule set
pub struct RuleChecker {
    rules: Vec<CompiledRule>,
}

impl RuleChecker {
    pub fn new(rules: &[ContentRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule in declaration order
    pub fn check(&self, doc: &LabelledDocument) -> Vec<Issue> {
        let mut issues = Vec::new();
        for rule in &self.rules {
            rule.check(doc, &mut issues);
        }
        info!(
            "Content check: {} rules, {} issues",
            self.rules.len(),
            issues.len()
        );
        issues
    }
}

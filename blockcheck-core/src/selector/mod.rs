//! Structural queries over a labelled document
//!
//! A selector is a small, fixed clause language evaluated left to right:
//!
//! ```text
//! .abstract                  blocks carrying the class
//! .item:first / .item:last   first / last of the current candidates
//! .item:nth(2)               third of the current candidates (zero-based)
//! [kind="table"]             blocks of a kind (also `type`, `index`)
//! .head + .body              .body blocks directly following a .head block
//! ```
//!
//! Each clause narrows the candidate set produced by the clauses before it,
//! so `:nth(k)` indexes the current set, not the document.

pub mod parser;

use crate::error::SelectorError;
use crate::types::{Block, BlockKind, LabelledDocument};
use std::fmt;
use std::str::FromStr;

pub use parser::parse_selector;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeTest {
    Kind(BlockKind),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Class(String),
    First,
    Last,
    Nth(usize),
    Attribute(AttributeTest),
}

/// Clauses applied to one candidate set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound {
    pub clauses: Vec<Clause>,
}

/// Parsed selector: compounds joined by the adjacent-sibling combinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorExpr {
    pub steps: Vec<Compound>,
}

impl Clause {
    fn apply(&self, candidates: Vec<usize>, blocks: &[Block]) -> Vec<usize> {
        match self {
            Clause::Class(name) => candidates
                .into_iter()
                .filter(|&i| blocks[i].has_class(name))
                .collect(),
            Clause::First => candidates.first().copied().into_iter().collect(),
            Clause::Last => candidates.last().copied().into_iter().collect(),
            Clause::Nth(n) => candidates.get(*n).copied().into_iter().collect(),
            Clause::Attribute(AttributeTest::Kind(kind)) => candidates
                .into_iter()
                .filter(|&i| blocks[i].kind() == *kind)
                .collect(),
            Clause::Attribute(AttributeTest::Index(index)) => candidates
                .into_iter()
                .filter(|&i| blocks[i].index() == *index)
                .collect(),
        }
    }
}

/// Name used by callers holding a parsed query
pub type Selector = SelectorExpr;

impl SelectorExpr {
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        parse_selector(text)
    }

    /// Matching blocks in document order. Never fails; no match is an empty list.
    pub fn evaluate<'d>(&self, document: &'d LabelledDocument) -> Vec<&'d Block> {
        let blocks = document.blocks();
        let mut candidates: Vec<usize> = (0..blocks.len()).collect();

        for (step, compound) in self.steps.iter().enumerate() {
            if step > 0 {
                // candidates are ascending and unique, so their successors are too
                candidates = candidates
                    .into_iter()
                    .map(|i| i + 1)
                    .filter(|&next| next < blocks.len())
                    .collect();
            }
            for clause in &compound.clauses {
                if candidates.is_empty() {
                    break;
                }
                candidates = clause.apply(candidates, blocks);
            }
        }

        candidates.into_iter().map(|i| &blocks[i]).collect()
    }
}

impl FromStr for SelectorExpr {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Class(name) => write!(f, ".{name}"),
            Clause::First => write!(f, ":first"),
            Clause::Last => write!(f, ":last"),
            Clause::Nth(n) => write!(f, ":nth({n})"),
            Clause::Attribute(AttributeTest::Kind(kind)) => write!(f, "[kind=\"{kind}\"]"),
            Clause::Attribute(AttributeTest::Index(index)) => write!(f, "[index={index}]"),
        }
    }
}

impl fmt::Display for SelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (step, compound) in self.steps.iter().enumerate() {
            if step > 0 {
                write!(f, " + ")?;
            }
            for clause in &compound.clauses {
                write!(f, "{clause}")?;
            }
        }
        Ok(())
    }
}

// Convenience queries straight from selector text
impl LabelledDocument {
    pub fn select(&self, selector: &str) -> Result<Vec<&Block>, SelectorError> {
        Ok(Selector::parse(selector)?.evaluate(self))
    }

    pub fn select_one(&self, selector: &str) -> Result<Option<&Block>, SelectorError> {
        Ok(self.select(selector)?.into_iter().next())
    }

    pub fn exists(&self, selector: &str) -> Result<bool, SelectorError> {
        Ok(!self.select(selector)?.is_empty())
    }

    pub fn count(&self, selector: &str) -> Result<usize, SelectorError> {
        Ok(self.select(selector)?.len())
    }
}

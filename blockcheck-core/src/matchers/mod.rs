// Matcher library - one evaluator per positional relationship:
// - position.rs: absolute and scope-relative indices
// - pattern.rs: anchored content patterns
// - between.rs: open interval between two anchor classes
// - adjacent.rs: blocks following/preceding an anchor class
//
// Every matcher resolves the set of block indices it denotes inside a scope.
// Anchor classes are read from blocks that earlier rules already labelled.

pub mod adjacent;
pub mod between;
pub mod pattern;
pub mod position;

pub use adjacent::{AdjacentMatcher, Direction};
pub use between::BetweenMatcher;
pub use pattern::ContentPatternMatcher;
pub use position::{AbsoluteIndexMatcher, RelativeIndexMatcher};

use crate::types::Block;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The predicate describing which blocks a class rule matches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchSpec {
    /// Index over the whole document, negative counts from the end
    AbsoluteIndex { index: i64 },
    /// Full match of a paragraph's text. Never matches tables.
    ContentPattern { pattern: String },
    /// Index inside the current scope, negative counts from the end of the scope
    RelativeIndex { index: i64 },
    /// Blocks strictly between the first `start_class` block and the next `end_class` block
    Between { start_class: String, end_class: String },
    Next {
        ref_class: String,
        #[serde(default)]
        offset: usize,
    },
    Prev {
        ref_class: String,
        #[serde(default)]
        offset: usize,
    },
}

impl MatchSpec {
    /// Classes this predicate reads, in declaration order
    pub fn referenced_classes(&self) -> Vec<&str> {
        match self {
            MatchSpec::AbsoluteIndex { .. }
            | MatchSpec::ContentPattern { .. }
            | MatchSpec::RelativeIndex { .. } => Vec::new(),
            MatchSpec::Between {
                start_class,
                end_class,
            } => vec![start_class.as_str(), end_class.as_str()],
            MatchSpec::Next { ref_class, .. } | MatchSpec::Prev { ref_class, .. } => {
                vec![ref_class.as_str()]
            }
        }
    }

    /// Compile into an evaluator. Fails only on an invalid content pattern.
    pub fn build_matcher(&self) -> Result<Box<dyn Matcher>, regex::Error> {
        let matcher: Box<dyn Matcher> = match self {
            MatchSpec::AbsoluteIndex { index } => Box::new(AbsoluteIndexMatcher::new(*index)),
            MatchSpec::ContentPattern { pattern } => Box::new(ContentPatternMatcher::new(pattern)?),
            MatchSpec::RelativeIndex { index } => Box::new(RelativeIndexMatcher::new(*index)),
            MatchSpec::Between {
                start_class,
                end_class,
            } => Box::new(BetweenMatcher::new(start_class, end_class)),
            MatchSpec::Next { ref_class, offset } => {
                Box::new(AdjacentMatcher::new(ref_class, Direction::Next, *offset))
            }
            MatchSpec::Prev { ref_class, offset } => {
                Box::new(AdjacentMatcher::new(ref_class, Direction::Prev, *offset))
            }
        };
        Ok(matcher)
    }
}

/// Blocks plus the index range a matcher may select from
#[derive(Debug, Clone)]
pub struct MatchContext<'a> {
    pub blocks: &'a [Block],
    pub scope: Range<usize>,
}

impl<'a> MatchContext<'a> {
    pub fn document(blocks: &'a [Block]) -> Self {
        Self {
            blocks,
            scope: 0..blocks.len(),
        }
    }

    pub fn scoped(blocks: &'a [Block], scope: Range<usize>) -> Self {
        let end = scope.end.min(blocks.len());
        let start = scope.start.min(end);
        Self {
            blocks,
            scope: start..end,
        }
    }

    pub fn in_scope(&self, index: usize) -> bool {
        self.scope.contains(&index)
    }

    /// First block in scope carrying the class, at or after `from`
    pub fn first_with_class(&self, class_name: &str, from: usize) -> Option<usize> {
        let start = from.max(self.scope.start);
        (start..self.scope.end).find(|&i| self.blocks[i].has_class(class_name))
    }
}

pub trait Matcher {
    /// Indices of matching blocks inside `ctx.scope`, ascending
    fn resolve(&self, ctx: &MatchContext) -> Vec<usize>;
    fn name(&self) -> &str;
}

/// Resolve a possibly negative index against a sequence length
pub(crate) fn resolve_signed_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = usize::try_from(index).ok()?;
        (index < len).then_some(index)
    } else {
        let back = usize::try_from(index.unsigned_abs()).ok()?;
        len.checked_sub(back)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::Block;

    /// Paragraph blocks "b0".."bN" with the given classes attached by index
    pub fn blocks_with_classes(len: usize, classes: &[(usize, &str)]) -> Vec<Block> {
        let mut blocks: Vec<Block> = (0..len)
            .map(|i| Block::paragraph(i, format!("b{i}")))
            .collect();
        for (index, class_name) in classes {
            blocks[*index].add_class(class_name);
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_signed_index() {
        assert_eq!(resolve_signed_index(0, 3), Some(0));
        assert_eq!(resolve_signed_index(2, 3), Some(2));
        assert_eq!(resolve_signed_index(3, 3), None);
        assert_eq!(resolve_signed_index(-1, 3), Some(2));
        assert_eq!(resolve_signed_index(-3, 3), Some(0));
        assert_eq!(resolve_signed_index(-4, 3), None);
        assert_eq!(resolve_signed_index(0, 0), None);
        assert_eq!(resolve_signed_index(i64::MIN, 3), None);
    }

    #[test]
    fn test_referenced_classes() {
        let spec = MatchSpec::Between {
            start_class: "title".into(),
            end_class: "abstract".into(),
        };
        assert_eq!(spec.referenced_classes(), vec!["title", "abstract"]);
        assert!(MatchSpec::AbsoluteIndex { index: 0 }
            .referenced_classes()
            .is_empty());
    }

    #[test]
    fn test_scoped_context_is_clamped() {
        let blocks = test_support::blocks_with_classes(4, &[]);
        let ctx = MatchContext::scoped(&blocks, 2..10);
        assert_eq!(ctx.scope, 2..4);
    }

    #[test]
    fn test_invalid_pattern_fails_to_build() {
        let spec = MatchSpec::ContentPattern {
            pattern: "(unclosed".into(),
        };
        assert!(spec.build_matcher().is_err());
    }
}

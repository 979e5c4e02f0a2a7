//! Block classifier
//!
//! Attaches semantic classes to document blocks by evaluating declarative
//! class rules. Rules may read classes assigned by other rules (`Between`,
//! `Next`, `Prev`), so they run in dependency order computed up front. Rules
//! with children define composite regions: the children are matched inside
//! the range their parent resolved.
//!
//! All configuration problems (undeclared classes, invalid patterns, cycles)
//! are reported by [`Classifier::new`], before any block is touched.

pub mod dependency;

use crate::error::ConfigError;
use crate::matchers::{ContentPatternMatcher, MatchContext, MatchSpec, Matcher};
use crate::types::{Block, BlockKind, LabelledDocument};
use dependency::{flatten_rules, DependencyAnalyzer};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, info, warn};

/// A declarative rule assigning `class_name` to the blocks its predicate matches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassRule {
    pub class_name: String,
    pub match_spec: MatchSpec,
    /// Only blocks of this kind receive the class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BlockKind>,
    /// Only paragraphs whose whole text matches receive the class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Rules evaluated inside the range this rule resolves
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ClassRule>,
}

impl ClassRule {
    pub fn new(class_name: &str, match_spec: MatchSpec) -> Self {
        Self {
            class_name: class_name.to_string(),
            match_spec,
            kind: None,
            pattern: None,
            children: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: BlockKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Narrow the predicate's matches to paragraphs matching `pattern`
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<ClassRule>) -> Self {
        self.children = children;
        self
    }
}

struct CompiledRule {
    class_name: String,
    kind: Option<BlockKind>,
    filter: Option<ContentPatternMatcher>,
    parent: Option<usize>,
    matcher: Box<dyn Matcher>,
}

impl CompiledRule {
    fn accepts(&self, block: &Block) -> bool {
        self.kind.map_or(true, |kind| block.kind() == kind)
            && self.filter.as_ref().map_or(true, |filter| {
                block
                    .paragraph_text()
                    .is_some_and(|text| filter.is_match(text))
            })
    }
}

/// A validated rule set with a fixed evaluation order
pub struct Classifier {
    rules: Vec<CompiledRule>,
    order: Vec<usize>,
}

impl Classifier {
    pub fn new(rules: &[ClassRule]) -> Result<Self, ConfigError> {
        let nodes = flatten_rules(rules);

        let mut compiled = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let matcher = node.match_spec.build_matcher().map_err(|source| {
                let pattern = match &node.match_spec {
                    MatchSpec::ContentPattern { pattern } => pattern.clone(),
                    _ => String::new(),
                };
                ConfigError::InvalidPattern {
                    rule: node.path.clone(),
                    pattern,
                    source,
                }
            })?;
            let filter = node
                .pattern
                .as_deref()
                .map(ContentPatternMatcher::new)
                .transpose()
                .map_err(|source| ConfigError::InvalidPattern {
                    rule: node.path.clone(),
                    pattern: node.pattern.clone().unwrap_or_default(),
                    source,
                })?;
            compiled.push(CompiledRule {
                class_name: node.class_name.clone(),
                kind: node.kind,
                filter,
                parent: node.parent,
                matcher,
            });
        }

        let order = DependencyAnalyzer::new(&nodes)?.evaluation_order()?;
        debug!(
            "Classifier ready: {} rules ({} top-level), order: {:?}",
            nodes.len(),
            rules.len(),
            order.iter().map(|&id| nodes[id].class_name.as_str()).collect::<Vec<_>>()
        );

        Ok(Self {
            rules: compiled,
            order,
        })
    }

    /// Class names in the order the rules are evaluated
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&id| self.rules[id].class_name.as_str())
            .collect()
    }

    /// Label the blocks and hand them back as a [`LabelledDocument`].
    ///
    /// Blocks are taken in document order; see [`Self::classify_in_place`].
    pub fn classify(&self, mut blocks: Vec<Block>) -> LabelledDocument {
        self.classify_in_place(&mut blocks);
        LabelledDocument::new(blocks)
    }

    /// Label the blocks in place. Only ever adds classes, so running it twice
    /// with the same rules leaves the second run without effect.
    ///
    /// Matchers address blocks by position. A block whose `index()` differs
    /// from its position is renumbered first so selectors and issue
    /// locations agree with what the rules saw.
    pub fn classify_in_place(&self, blocks: &mut [Block]) {
        renumber_blocks(blocks);
        let mut scopes: Vec<Option<Range<usize>>> = vec![None; self.rules.len()];
        let mut labelled = 0usize;

        for &id in &self.order {
            let rule = &self.rules[id];
            let scope = match rule.parent {
                None => 0..blocks.len(),
                Some(parent) => match &scopes[parent] {
                    Some(range) => range.clone(),
                    None => {
                        debug!("   ⏭️  {}: parent matched nothing", rule.class_name);
                        continue;
                    }
                },
            };

            let matched: Vec<usize> = {
                let ctx = MatchContext::scoped(blocks, scope);
                rule.matcher
                    .resolve(&ctx)
                    .into_iter()
                    .filter(|&i| rule.accepts(&blocks[i]))
                    .collect()
            };

            for &i in &matched {
                if blocks[i].add_class(&rule.class_name) {
                    labelled += 1;
                }
            }

            debug!(
                "   🏷️  {} [{}]: {} blocks {:?}",
                rule.class_name,
                rule.matcher.name(),
                matched.len(),
                matched
            );

            if let (Some(&first), Some(&last)) = (matched.first(), matched.last()) {
                scopes[id] = Some(first..last + 1);
            }
        }

        info!(
            "Classified {} blocks with {} rules ({} new labels)",
            blocks.len(),
            self.rules.len(),
            labelled
        );
    }
}

fn renumber_blocks(blocks: &mut [Block]) {
    let drifted = blocks
        .iter()
        .enumerate()
        .filter(|(position, block)| block.index() != *position)
        .count();
    if drifted == 0 {
        return;
    }
    warn!(
        "⚠️  {} of {} blocks had an index different from their position, renumbering",
        drifted,
        blocks.len()
    );
    for (position, block) in blocks.iter_mut().enumerate() {
        block.set_index(position);
    }
}

/// Validate `rules` and label `blocks` in one step
pub fn classify(blocks: Vec<Block>, rules: &[ClassRule]) -> Result<LabelledDocument, ConfigError> {
    Ok(Classifier::new(rules)?.classify(blocks))
}

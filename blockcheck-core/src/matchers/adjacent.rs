use super::{MatchContext, Matcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Matches the block `offset + 1` positions after or before an anchor.
///
/// The anchor is the first block in scope carrying `ref_class`. Targets
/// outside the scope match nothing.
pub struct AdjacentMatcher {
    ref_class: String,
    direction: Direction,
    offset: usize,
}

impl AdjacentMatcher {
    pub fn new(ref_class: &str, direction: Direction, offset: usize) -> Self {
        Self {
            ref_class: ref_class.to_string(),
            direction,
            offset,
        }
    }

    fn target(&self, anchor: usize) -> Option<usize> {
        let distance = self.offset.checked_add(1)?;
        match self.direction {
            Direction::Next => anchor.checked_add(distance),
            Direction::Prev => anchor.checked_sub(distance),
        }
    }
}

impl Matcher for AdjacentMatcher {
    fn resolve(&self, ctx: &MatchContext) -> Vec<usize> {
        ctx.first_with_class(&self.ref_class, ctx.scope.start)
            .and_then(|anchor| self.target(anchor))
            .filter(|&target| ctx.in_scope(target))
            .into_iter()
            .collect()
    }

    fn name(&self) -> &str {
        match self.direction {
            Direction::Next => "Next",
            Direction::Prev => "Prev",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::test_support::blocks_with_classes;

    #[test]
    fn test_next_with_offsets() {
        let blocks = blocks_with_classes(6, &[(2, "ref")]);
        let ctx = MatchContext::document(&blocks);
        assert_eq!(AdjacentMatcher::new("ref", Direction::Next, 0).resolve(&ctx), vec![3]);
        assert_eq!(AdjacentMatcher::new("ref", Direction::Next, 1).resolve(&ctx), vec![4]);
        assert!(AdjacentMatcher::new("ref", Direction::Next, 3).resolve(&ctx).is_empty());
    }

    #[test]
    fn test_prev_with_offsets() {
        let blocks = blocks_with_classes(6, &[(2, "ref")]);
        let ctx = MatchContext::document(&blocks);
        assert_eq!(AdjacentMatcher::new("ref", Direction::Prev, 0).resolve(&ctx), vec![1]);
        assert_eq!(AdjacentMatcher::new("ref", Direction::Prev, 1).resolve(&ctx), vec![0]);
        assert!(AdjacentMatcher::new("ref", Direction::Prev, 2).resolve(&ctx).is_empty());
    }

    #[test]
    fn test_anchor_is_first_carrier() {
        let blocks = blocks_with_classes(6, &[(1, "ref"), (4, "ref")]);
        let ctx = MatchContext::document(&blocks);
        assert_eq!(AdjacentMatcher::new("ref", Direction::Next, 0).resolve(&ctx), vec![2]);
    }

    #[test]
    fn test_missing_anchor_matches_nothing() {
        let blocks = blocks_with_classes(3, &[]);
        let ctx = MatchContext::document(&blocks);
        assert!(AdjacentMatcher::new("ref", Direction::Next, 0).resolve(&ctx).is_empty());
    }

    #[test]
    fn test_target_must_stay_in_scope() {
        let blocks = blocks_with_classes(6, &[(4, "ref")]);
        let ctx = MatchContext::scoped(&blocks, 2..5);
        assert!(AdjacentMatcher::new("ref", Direction::Next, 0).resolve(&ctx).is_empty());
        assert_eq!(AdjacentMatcher::new("ref", Direction::Prev, 1).resolve(&ctx), vec![2]);
        assert!(AdjacentMatcher::new("ref", Direction::Prev, 2).resolve(&ctx).is_empty());
    }
}

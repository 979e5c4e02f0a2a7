use super::{resolve_signed_index, MatchContext, Matcher};

/// Matches one block by its index over the whole document
pub struct AbsoluteIndexMatcher {
    index: i64,
}

impl AbsoluteIndexMatcher {
    pub fn new(index: i64) -> Self {
        Self { index }
    }
}

impl Matcher for AbsoluteIndexMatcher {
    fn resolve(&self, ctx: &MatchContext) -> Vec<usize> {
        resolve_signed_index(self.index, ctx.blocks.len())
            .filter(|&target| ctx.in_scope(target))
            .into_iter()
            .collect()
    }

    fn name(&self) -> &str {
        "AbsoluteIndex"
    }
}

/// Matches one block by its position inside the current scope
pub struct RelativeIndexMatcher {
    index: i64,
}

impl RelativeIndexMatcher {
    pub fn new(index: i64) -> Self {
        Self { index }
    }
}

impl Matcher for RelativeIndexMatcher {
    fn resolve(&self, ctx: &MatchContext) -> Vec<usize> {
        resolve_signed_index(self.index, ctx.scope.len())
            .map(|offset| ctx.scope.start + offset)
            .into_iter()
            .collect()
    }

    fn name(&self) -> &str {
        "RelativeIndex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::test_support::blocks_with_classes;

    #[test]
    fn test_absolute_index_counts_from_both_ends() {
        let blocks = blocks_with_classes(5, &[]);
        let ctx = MatchContext::document(&blocks);
        assert_eq!(AbsoluteIndexMatcher::new(0).resolve(&ctx), vec![0]);
        assert_eq!(AbsoluteIndexMatcher::new(-1).resolve(&ctx), vec![4]);
        assert!(AbsoluteIndexMatcher::new(5).resolve(&ctx).is_empty());
        assert!(AbsoluteIndexMatcher::new(-6).resolve(&ctx).is_empty());
    }

    #[test]
    fn test_absolute_index_ignores_scope_for_position_but_not_membership() {
        let blocks = blocks_with_classes(6, &[]);
        let ctx = MatchContext::scoped(&blocks, 2..5);
        assert_eq!(AbsoluteIndexMatcher::new(3).resolve(&ctx), vec![3]);
        assert!(AbsoluteIndexMatcher::new(0).resolve(&ctx).is_empty());
    }

    #[test]
    fn test_relative_index_in_scope() {
        let blocks = blocks_with_classes(6, &[]);
        let ctx = MatchContext::scoped(&blocks, 2..5);
        assert_eq!(RelativeIndexMatcher::new(0).resolve(&ctx), vec![2]);
        assert_eq!(RelativeIndexMatcher::new(-1).resolve(&ctx), vec![4]);
        assert_eq!(RelativeIndexMatcher::new(1).resolve(&ctx), vec![3]);
        assert!(RelativeIndexMatcher::new(3).resolve(&ctx).is_empty());
        assert!(RelativeIndexMatcher::new(-4).resolve(&ctx).is_empty());
    }

    #[test]
    fn test_relative_index_in_empty_scope() {
        let blocks = blocks_with_classes(3, &[]);
        let ctx = MatchContext::scoped(&blocks, 1..1);
        assert!(RelativeIndexMatcher::new(0).resolve(&ctx).is_empty());
        assert!(RelativeIndexMatcher::new(-1).resolve(&ctx).is_empty());
    }
}

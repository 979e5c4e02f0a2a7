use super::{MatchContext, Matcher};

/// Matches the open interval between two anchor classes.
///
/// The start anchor is the first block in scope carrying `start_class`; the
/// end anchor is the first block after it carrying `end_class`. Neither anchor
/// is part of the result. A missing anchor yields an empty match.
pub struct BetweenMatcher {
    start_class: String,
    end_class: String,
}

impl BetweenMatcher {
    pub fn new(start_class: &str, end_class: &str) -> Self {
        Self {
            start_class: start_class.to_string(),
            end_class: end_class.to_string(),
        }
    }
}

impl Matcher for BetweenMatcher {
    fn resolve(&self, ctx: &MatchContext) -> Vec<usize> {
        let Some(start) = ctx.first_with_class(&self.start_class, ctx.scope.start) else {
            return Vec::new();
        };
        let Some(end) = ctx.first_with_class(&self.end_class, start + 1) else {
            return Vec::new();
        };
        (start + 1..end).collect()
    }

    fn name(&self) -> &str {
        "Between"
    }
}

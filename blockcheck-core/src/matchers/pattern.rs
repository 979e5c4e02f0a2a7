use super::{MatchContext, Matcher};
use regex::Regex;

/// Matches paragraphs whose whole text matches the pattern.
///
/// The pattern is anchored at both ends, so `Abstract` does not match
/// `Abstract: ...`. Substring checks belong to content rules, not classification.
pub struct ContentPatternMatcher {
    regex: Regex,
}

impl ContentPatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl Matcher for ContentPatternMatcher {
    fn resolve(&self, ctx: &MatchContext) -> Vec<usize> {
        ctx.scope
            .clone()
            .filter(|&i| {
                ctx.blocks[i]
                    .paragraph_text()
                    .is_some_and(|text| self.is_match(text))
            })
            .collect()
    }

    fn name(&self) -> &str {
        "ContentPattern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Block;

    fn sample_blocks() -> Vec<Block> {
        vec![
            Block::paragraph(0, "Abstract"),
            Block::paragraph(1, "Abstract: a study of things"),
            Block::table(2, vec![vec!["Abstract".to_string()]]),
            Block::paragraph(3, "Keywords: a, b"),
        ]
    }

    #[test]
    fn test_pattern_requires_full_match() {
        let blocks = sample_blocks();
        let ctx = MatchContext::document(&blocks);
        let matcher = ContentPatternMatcher::new("Abstract").unwrap();
        assert_eq!(matcher.resolve(&ctx), vec![0]);

        let matcher = ContentPatternMatcher::new("Abstract:.*").unwrap();
        assert_eq!(matcher.resolve(&ctx), vec![1]);
    }

    #[test]
    fn test_pattern_never_matches_tables() {
        let blocks = sample_blocks();
        let ctx = MatchContext::document(&blocks);
        let matcher = ContentPatternMatcher::new(".*").unwrap();
        assert_eq!(matcher.resolve(&ctx), vec![0, 1, 3]);
    }

    #[test]
    fn test_alternation_stays_anchored() {
        let matcher = ContentPatternMatcher::new("a|b").unwrap();
        assert!(matcher.is_match("a"));
        assert!(!matcher.is_match("ab"));
        assert!(!matcher.is_match("xb"));
    }
}

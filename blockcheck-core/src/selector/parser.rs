// Hand-written recursive-descent parser for the selector grammar:
//
//   selector := compound ( '+' compound )*
//   compound := clause+
//   clause   := '.' ident | ':first' | ':last' | ':nth(' integer ')'
//             | '[' ident '=' value ']'

use super::{AttributeTest, Clause, Compound, SelectorExpr};
use crate::error::{SelectorError, SelectorErrorKind};
use crate::types::BlockKind;

pub fn parse_selector(input: &str) -> Result<SelectorExpr, SelectorError> {
    Parser::new(input).parse()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(mut self) -> Result<SelectorExpr, SelectorError> {
        self.skip_whitespace();
        if self.at_end() {
            return Err(self.error(SelectorErrorKind::Empty, 0));
        }

        let mut steps = vec![self.parse_compound()?];
        loop {
            let ws_start = self.pos;
            let had_whitespace = self.skip_whitespace();
            let Some(c) = self.peek() else {
                break;
            };
            match c {
                '+' => {
                    self.bump();
                    self.skip_whitespace();
                    if self.at_end() {
                        return Err(self.error(SelectorErrorKind::UnexpectedEnd, ws_start));
                    }
                    steps.push(self.parse_compound()?);
                }
                '>' | '~' => {
                    return Err(self.error_through_next(
                        SelectorErrorKind::UnsupportedCombinator(c),
                        self.pos,
                    ));
                }
                _ if had_whitespace => {
                    return Err(self.error_through_next(
                        SelectorErrorKind::UnsupportedCombinator(' '),
                        ws_start,
                    ));
                }
                _ => {
                    return Err(self.error_through_next(
                        SelectorErrorKind::UnexpectedChar(c),
                        self.pos,
                    ));
                }
            }
        }

        Ok(SelectorExpr { steps })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut clauses = Vec::new();
        while let Some(c) = self.peek() {
            let clause = match c {
                '.' => self.parse_class()?,
                ':' => self.parse_pseudo()?,
                '[' => self.parse_attribute()?,
                _ => break,
            };
            clauses.push(clause);
        }

        if clauses.is_empty() {
            return Err(match self.peek() {
                None => self.error(SelectorErrorKind::UnexpectedEnd, self.pos),
                Some(c) => self.error_through_next(SelectorErrorKind::UnexpectedChar(c), self.pos),
            });
        }
        Ok(Compound { clauses })
    }

    fn parse_class(&mut self) -> Result<Clause, SelectorError> {
        let start = self.pos;
        self.bump(); // '.'
        let name = self.expect_ident(start)?;
        Ok(Clause::Class(name.to_string()))
    }

    fn parse_pseudo(&mut self) -> Result<Clause, SelectorError> {
        let start = self.pos;
        self.bump(); // ':'
        let name = self.expect_ident(start)?;
        match name {
            "first" => Ok(Clause::First),
            "last" => Ok(Clause::Last),
            "nth" => {
                if self.peek() != Some('(') {
                    return Err(match self.peek() {
                        None => self.error(SelectorErrorKind::UnexpectedEnd, start),
                        Some(c) => self.error_through_next(SelectorErrorKind::UnexpectedChar(c), start),
                    });
                }
                self.bump();
                let arg_start = self.pos;
                let Some(close) = self.input[arg_start..].find(')') else {
                    self.pos = self.input.len();
                    return Err(self.error(SelectorErrorKind::UnexpectedEnd, start));
                };
                let arg = &self.input[arg_start..arg_start + close];
                self.pos = arg_start + close + 1;
                arg.trim()
                    .parse::<usize>()
                    .map(Clause::Nth)
                    .map_err(|_| self.error(SelectorErrorKind::InvalidIndex(arg.to_string()), start))
            }
            other => Err(self.error(SelectorErrorKind::UnknownPseudoClass(other.to_string()), start)),
        }
    }

    fn parse_attribute(&mut self) -> Result<Clause, SelectorError> {
        let start = self.pos;
        self.bump(); // '['
        self.skip_whitespace();
        let name = self.expect_ident(start)?;
        self.skip_whitespace();
        self.expect_char('=', start)?;
        self.skip_whitespace();
        let value = self.parse_value(start)?;
        self.skip_whitespace();
        self.expect_char(']', start)?;

        let test = match name {
            "kind" | "type" => BlockKind::parse(&value)
                .map(AttributeTest::Kind)
                .ok_or_else(|| self.error(SelectorErrorKind::InvalidAttributeValue(value.clone()), start))?,
            "index" => value
                .parse::<usize>()
                .map(AttributeTest::Index)
                .map_err(|_| self.error(SelectorErrorKind::InvalidAttributeValue(value.clone()), start))?,
            other => {
                return Err(self.error(SelectorErrorKind::UnknownAttribute(other.to_string()), start))
            }
        };
        Ok(Clause::Attribute(test))
    }

    fn parse_value(&mut self, clause_start: usize) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let value_start = self.pos;
                let Some(close) = self.input[value_start..].find(quote) else {
                    self.pos = self.input.len();
                    return Err(self.error(SelectorErrorKind::UnterminatedString, clause_start));
                };
                self.pos = value_start + close + quote.len_utf8();
                Ok(self.input[value_start..value_start + close].to_string())
            }
            _ => self.expect_ident(clause_start).map(str::to_string),
        }
    }

    fn expect_ident(&mut self, clause_start: usize) -> Result<&'a str, SelectorError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(match self.peek() {
                None => self.error(SelectorErrorKind::UnexpectedEnd, clause_start),
                Some(c) => self.error_through_next(SelectorErrorKind::UnexpectedChar(c), clause_start),
            });
        }
        let input = self.input;
        Ok(&input[start..self.pos])
    }

    fn expect_char(&mut self, expected: char, clause_start: usize) -> Result<(), SelectorError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error_through_next(SelectorErrorKind::UnexpectedChar(c), clause_start)),
            None => Err(self.error(SelectorErrorKind::UnexpectedEnd, clause_start)),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Returns true if any whitespace was skipped
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    /// Error whose fragment runs from `start` to the current position
    fn error(&self, kind: SelectorErrorKind, start: usize) -> SelectorError {
        let end = self.pos.max(start).min(self.input.len());
        SelectorError {
            kind,
            offset: start,
            fragment: self.input[start..end].to_string(),
        }
    }

    /// Error whose fragment also includes the character at the current position
    fn error_through_next(&self, kind: SelectorErrorKind, start: usize) -> SelectorError {
        let next_len = self.peek().map_or(0, char::len_utf8);
        let end = (self.pos + next_len).min(self.input.len());
        SelectorError {
            kind,
            offset: start,
            fragment: self.input[start..end].to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kind_of(input: &str) -> SelectorErrorKind {
        parse_selector(input).unwrap_err().kind
    }

    #[test]
    fn test_parse_compound_with_pseudo() {
        let expr = parse_selector(".item:nth(2)").unwrap();
        assert_eq!(
            expr.steps,
            vec![Compound {
                clauses: vec![Clause::Class("item".into()), Clause::Nth(2)]
            }]
        );
    }

    #[test]
    fn test_parse_adjacent_steps() {
        let expr = parse_selector(".head + .body:first").unwrap();
        assert_eq!(expr.steps.len(), 2);
        assert_eq!(expr.steps[1].clauses, vec![Clause::Class("body".into()), Clause::First]);

        let compact = parse_selector(".head+.body:first").unwrap();
        assert_eq!(compact, expr);
    }

    #[test]
    fn test_parse_attribute_forms() {
        let quoted = parse_selector(r#"[kind="table"]"#).unwrap();
        let single = parse_selector("[ kind = 'table' ]").unwrap();
        let bare = parse_selector("[type=table]").unwrap();
        assert_eq!(quoted, single);
        assert_eq!(quoted, bare);
        assert_eq!(
            parse_selector("[index=4].item").unwrap().steps[0].clauses,
            vec![Clause::Attribute(AttributeTest::Index(4)), Clause::Class("item".into())]
        );
    }

    #[test]
    fn test_class_names_with_hyphens_and_unicode() {
        let expr = parse_selector(".abstract-en.摘要").unwrap();
        assert_eq!(
            expr.steps[0].clauses,
            vec![Clause::Class("abstract-en".into()), Clause::Class("摘要".into())]
        );
    }

    #[test]
    fn test_unterminated_nth_argument() {
        let err = parse_selector(".item:nth(").unwrap_err();
        assert_eq!(err.kind, SelectorErrorKind::UnexpectedEnd);
        assert_eq!(err.offset, 5);
        assert_eq!(err.fragment, ":nth(");
    }

    #[test]
    fn test_malformed_nth_argument() {
        assert_eq!(kind_of(".item:nth(x)"), SelectorErrorKind::InvalidIndex("x".into()));
        assert_eq!(kind_of(".item:nth(-1)"), SelectorErrorKind::InvalidIndex("-1".into()));
        assert_eq!(kind_of(".item:nth"), SelectorErrorKind::UnexpectedEnd);
    }

    #[test]
    fn test_unknown_pseudo_class() {
        let err = parse_selector(".item:middle").unwrap_err();
        assert_eq!(err.kind, SelectorErrorKind::UnknownPseudoClass("middle".into()));
        assert_eq!(err.fragment, ":middle");
    }

    #[test]
    fn test_attribute_errors() {
        assert_eq!(kind_of("[color=red]"), SelectorErrorKind::UnknownAttribute("color".into()));
        assert_eq!(kind_of("[kind=figure]"), SelectorErrorKind::InvalidAttributeValue("figure".into()));
        assert_eq!(kind_of(r#"[kind="table]"#), SelectorErrorKind::UnterminatedString);
        assert_eq!(kind_of("[kind=table"), SelectorErrorKind::UnexpectedEnd);
    }

    #[test]
    fn test_unsupported_combinators() {
        assert_eq!(kind_of(".a .b"), SelectorErrorKind::UnsupportedCombinator(' '));
        assert_eq!(kind_of(".a > .b"), SelectorErrorKind::UnsupportedCombinator('>'));
        assert_eq!(kind_of(".a ~ .b"), SelectorErrorKind::UnsupportedCombinator('~'));
    }

    #[test]
    fn test_empty_and_dangling_input() {
        assert_eq!(kind_of(""), SelectorErrorKind::Empty);
        assert_eq!(kind_of("   "), SelectorErrorKind::Empty);
        assert_eq!(kind_of(".a +"), SelectorErrorKind::UnexpectedEnd);
        assert_eq!(kind_of("."), SelectorErrorKind::UnexpectedEnd);
        assert_eq!(kind_of("item"), SelectorErrorKind::UnexpectedChar('i'));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(parse_selector("  .a  ").unwrap(), parse_selector(".a").unwrap());
    }
}

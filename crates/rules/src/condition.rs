//! Parser for the `detection.condition` expression of a rule.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := and_expr ("or" and_expr)*
//! and_expr:= unary ("and" unary)*
//! unary   := "not" unary | primary
//! primary := "(" expr ")" | quant | IDENT
//! quant   := ("1" | "any" | "all") "of" (IDENT | "them")
//! ```
//!
//! Identifiers in a quantifier may end with `*` to select every selection
//! sharing the prefix. Keywords are case-insensitive; identifiers are not.

use std::fmt;

/// Which selections a quantifier ranges over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSet {
    /// Every selection in the rule.
    Them,
    /// Selections whose name starts with the prefix (`sel*`).
    Prefix(String),
    /// A single named selection.
    Named(String),
}

impl SelectionSet {
    pub fn contains(&self, name: &str) -> bool {
        match self {
            SelectionSet::Them => true,
            SelectionSet::Prefix(p) => name.starts_with(p.as_str()),
            SelectionSet::Named(n) => n == name,
        }
    }
}

/// Boolean expression over named selections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Selection(String),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    OneOf(SelectionSet),
    AllOf(SelectionSet),
}

impl Condition {
    /// Names referenced directly (not through a quantifier).
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Selection(name) => out.push(name),
            Condition::Not(inner) => inner.collect_names(out),
            Condition::And(items) | Condition::Or(items) => {
                for item in items {
                    item.collect_names(out);
                }
            }
            Condition::OneOf(SelectionSet::Named(name))
            | Condition::AllOf(SelectionSet::Named(name)) => out.push(name),
            Condition::OneOf(_) | Condition::AllOf(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at token {}", self.message, self.position)
    }
}

impl std::error::Error for ConditionError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Of,
    One,
    All,
    Them,
    Pipe,
    Ident(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        let token = match word.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "of" => Token::Of,
            "1" | "any" => Token::One,
            "all" => Token::All,
            "them" => Token::Them,
            _ => Token::Ident(word.clone()),
        };
        tokens.push(token);
        word.clear();
    };

    for ch in input.chars() {
        match ch {
            '(' | ')' | '|' => {
                flush(&mut word, &mut tokens);
                tokens.push(match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    _ => Token::Pipe,
                });
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> ConditionError {
        ConditionError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionError> {
        let mut items = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 { items.remove(0) } else { Condition::Or(items) })
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionError> {
        let mut items = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            items.push(self.parse_unary()?);
        }
        Ok(if items.len() == 1 { items.remove(0) } else { Condition::And(items) })
    }

    fn parse_unary(&mut self) -> Result<Condition, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Condition::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Condition, ConditionError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("expected ')'")),
                }
            }
            Some(Token::One) => Ok(Condition::OneOf(self.parse_quantified()?)),
            Some(Token::All) => Ok(Condition::AllOf(self.parse_quantified()?)),
            Some(Token::Ident(name)) => {
                if name.contains('*') {
                    return Err(self.error(format!(
                        "wildcard '{}' is only allowed after '1 of' or 'all of'",
                        name
                    )));
                }
                Ok(Condition::Selection(name))
            }
            Some(Token::Pipe) => Err(self.error("aggregation expressions are not supported")),
            Some(other) => Err(self.error(format!("unexpected token {:?}", other))),
            None => Err(self.error("unexpected end of condition")),
        }
    }

    fn parse_quantified(&mut self) -> Result<SelectionSet, ConditionError> {
        if self.next() != Some(Token::Of) {
            return Err(self.error("expected 'of'"));
        }
        match self.next() {
            Some(Token::Them) => Ok(SelectionSet::Them),
            Some(Token::Ident(name)) => match name.strip_suffix('*') {
                Some(prefix) => Ok(SelectionSet::Prefix(prefix.to_string())),
                None => Ok(SelectionSet::Named(name)),
            },
            _ => Err(self.error("expected selection name or 'them' after 'of'")),
        }
    }
}

/// Parse a condition string into an expression tree.
pub fn parse_condition(input: &str) -> Result<Condition, ConditionError> {
    let mut parser = Parser {
        tokens: tokenize(input),
        pos: 0,
    };
    if parser.tokens.is_empty() {
        return Err(parser.error("empty condition"));
    }
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::Pipe) => Err(parser.error("aggregation expressions are not supported")),
        Some(other) => {
            let msg = format!("unexpected trailing token {:?}", other);
            Err(parser.error(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(name: &str) -> Condition {
        Condition::Selection(name.to_string())
    }

    #[test]
    fn single_selection() {
        assert_eq!(parse_condition("selection").unwrap(), sel("selection"));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let parsed = parse_condition("a or b and not c").unwrap();
        assert_eq!(
            parsed,
            Condition::Or(vec![
                sel("a"),
                Condition::And(vec![sel("b"), Condition::Not(Box::new(sel("c")))]),
            ])
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        let parsed = parse_condition("(a or b) and c").unwrap();
        assert_eq!(
            parsed,
            Condition::And(vec![Condition::Or(vec![sel("a"), sel("b")]), sel("c")])
        );
    }

    #[test]
    fn quantifiers() {
        assert_eq!(
            parse_condition("1 of selection_*").unwrap(),
            Condition::OneOf(SelectionSet::Prefix("selection_".into()))
        );
        assert_eq!(
            parse_condition("all of them and not filter").unwrap(),
            Condition::And(vec![
                Condition::AllOf(SelectionSet::Them),
                Condition::Not(Box::new(sel("filter"))),
            ])
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            parse_condition("a AND NOT b").unwrap(),
            Condition::And(vec![sel("a"), Condition::Not(Box::new(sel("b")))])
        );
    }

    #[test]
    fn malformed_conditions_are_rejected() {
        assert!(parse_condition("").is_err());
        assert!(parse_condition("(a or b").is_err());
        assert!(parse_condition("a and").is_err());
        assert!(parse_condition("a b").is_err());
        assert!(parse_condition("sel* and a").is_err());
        assert!(parse_condition("selection | count() > 5").is_err());
    }

    #[test]
    fn referenced_names_skip_quantified_sets() {
        let parsed = parse_condition("a and 1 of b* and not c").unwrap();
        assert_eq!(parsed.referenced_names(), vec!["a", "c"]);
    }
}

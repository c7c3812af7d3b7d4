//! Boolean filter expressions over scalar fields.
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! expr    := and_expr (("or" | "||") and_expr)*
//! and_expr:= term (("and" | "&&") term)*
//! term    := "(" expr ")" | ident op integer
//! op      := "==" | "!=" | "<" | "<=" | ">" | ">="
//! ```

use crate::error::{Result, VectorDbError};
use crate::schema::{CollectionSchema, Entity};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn apply(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Compare {
        field: String,
        op: CompareOp,
        value: i64,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: i64) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn gt(field: impl Into<String>, value: i64) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    pub fn parse(expr: &str) -> Result<Self> {
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            expr,
            tokens,
            pos: 0,
        };
        let filter = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(parser.error(format!("unexpected token {:?}", tok)));
        }
        Ok(filter)
    }

    /// Field names referenced anywhere in the expression.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Compare { field, .. } => out.push(field),
            Filter::And(l, r) | Filter::Or(l, r) => {
                l.collect_fields(out);
                r.collect_fields(out);
            }
        }
    }

    /// Every referenced field must be a declared scalar field.
    pub fn validate_against(&self, schema: &CollectionSchema) -> Result<()> {
        for name in self.fields() {
            match schema.field(name) {
                None => {
                    return Err(VectorDbError::validation(
                        &schema.name,
                        format!("filter references unknown field '{}'", name),
                    ))
                }
                Some(field) if field.data_type.is_vector() => {
                    return Err(VectorDbError::validation(
                        &schema.name,
                        format!("filter references vector field '{}'", name),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Evaluate against an entity. Missing or non-integer fields never match.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Filter::Compare { field, op, value } => entity
                .int64(field)
                .map(|lhs| op.apply(lhs, *value))
                .unwrap_or(false),
            Filter::And(l, r) => l.matches(entity) && r.matches(entity),
            Filter::Or(l, r) => l.matches(entity) || r.matches(entity),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { field, op, value } => write!(f, "{} {} {}", field, op.as_str(), value),
            Filter::And(l, r) => {
                for (i, side) in [l, r].into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    match &**side {
                        Filter::Or(..) => write!(f, "({})", side)?,
                        _ => write!(f, "{}", side)?,
                    }
                }
                Ok(())
            }
            Filter::Or(l, r) => write!(f, "{} or {}", l, r),
        }
    }
}

impl FromStr for Filter {
    type Err = VectorDbError;

    fn from_str(s: &str) -> Result<Self> {
        Filter::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Op(CompareOp),
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let invalid = |reason: String| VectorDbError::InvalidFilter {
        expr: expr.to_string(),
        reason,
    };
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(invalid(format!("expected '{}{}' at {}", c, c, i)));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            '=' | '!' | '<' | '>' => {
                let has_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, has_eq) {
                    ('=', true) => CompareOp::Eq,
                    ('!', true) => CompareOp::Ne,
                    ('<', true) => CompareOp::Le,
                    ('>', true) => CompareOp::Ge,
                    ('<', false) => CompareOp::Lt,
                    ('>', false) => CompareOp::Gt,
                    _ => return Err(invalid(format!("unknown operator at {}", i))),
                };
                tokens.push(Token::Op(op));
                i += if has_eq { 2 } else { 1 };
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| invalid(format!("invalid integer '{}'", text)))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(invalid(format!("unexpected character '{}'", other))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn error(&self, reason: String) -> VectorDbError {
        VectorDbError::InvalidFilter {
            expr: self.expr.to_string(),
            reason,
        }
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            lhs = lhs.or(self.parse_and()?);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut lhs = self.parse_term()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            lhs = lhs.and(self.parse_term()?);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Filter> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("missing ')'".to_string())),
                }
            }
            Some(Token::Ident(field)) => match (self.next(), self.next()) {
                (Some(Token::Op(op)), Some(Token::Int(value))) => Ok(Filter::compare(field, op, value)),
                _ => Err(self.error(format!("expected '<op> <integer>' after '{}'", field))),
            },
            Some(tok) => Err(self.error(format!("unexpected token {:?}", tok))),
            None => Err(self.error("unexpected end of expression".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::FieldSchema;

    #[test]
    fn test_parse_simple() {
        let f = Filter::parse("id_field > 0").unwrap();
        assert_eq!(f, Filter::gt("id_field", 0));
        assert_eq!(f.to_string(), "id_field > 0");
    }

    #[test]
    fn test_precedence_and_display() {
        let f = Filter::parse("a >= 1 AND (b < 5 || c != -2)").unwrap();
        let expected = Filter::compare("a", CompareOp::Ge, 1)
            .and(Filter::compare("b", CompareOp::Lt, 5).or(Filter::compare("c", CompareOp::Ne, -2)));
        assert_eq!(f, expected);
        assert_eq!(f.to_string(), "a >= 1 and (b < 5 or c != -2)");
        assert_eq!(Filter::parse(&f.to_string()).unwrap(), f);
    }

    #[test]
    fn test_parse_errors() {
        for expr in ["", "id >", "id = 3", "(id > 1", "id > 1 id", "id > 1.5", "id > x"] {
            let err = Filter::parse(expr).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{expr}");
        }
    }

    #[test]
    fn test_matches() {
        let e = Entity::new().with_int64("id", 5).with_vector("v", vec![1.0f32]);
        assert!(Filter::parse("id > 0 and id <= 5").unwrap().matches(&e));
        assert!(!Filter::parse("id == 4").unwrap().matches(&e));
        assert!(Filter::parse("id == 4 or id == 5").unwrap().matches(&e));
        assert!(!Filter::parse("missing > 0").unwrap().matches(&e));
    }

    #[test]
    fn test_validate_against_schema() {
        let schema = CollectionSchema::new("demo")
            .with_field(FieldSchema::int64("id").primary())
            .with_field(FieldSchema::float_vector("v", 2));
        assert!(Filter::gt("id", 0).validate_against(&schema).is_ok());
        assert!(Filter::gt("v", 0).validate_against(&schema).is_err());
        assert!(Filter::gt("nope", 0).validate_against(&schema).is_err());
    }
}

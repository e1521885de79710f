// Rolekeep
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Condition expressions
//!
//! The subset of JPQL where-clause syntax that can be evaluated in memory.
//! Used by declarative row-level predicates and by the in-memory query runner.
//! Evaluation uses SQL three-valued logic: a comparison with a missing or
//! null value is unknown, and only a definite `true` admits an entity.

use serde_json::Value;
use std::collections::BTreeMap;

use super::lexer::{Keyword, Operator, Token, TokenKind, tokenize};
use crate::entity::{Entity, resolve_path};
use crate::error::{RoleError, RoleResult};

/// Parsed condition
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare { left: Operand, op: CompareOp, right: Operand },
    IsNull { operand: Operand, negated: bool },
    In { operand: Operand, list: Vec<Operand>, negated: bool },
    Like { operand: Operand, pattern: Operand, negated: bool },
    /// Bare boolean operand, e.g. `e.active`
    Truthy(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Dotted path including the alias, e.g. `["e", "customer", "name"]`
    Path(Vec<String>),
    Literal(Value),
    Parameter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Values available while evaluating a condition
pub struct EvalContext<'a> {
    pub entity: &'a dyn Entity,
    /// Alias the paths are rooted at
    pub alias: &'a str,
    pub parameters: &'a BTreeMap<String, Value>,
}

impl Expr {
    /// Parse a complete condition
    pub fn parse(input: &str) -> RoleResult<Expr> {
        let tokens = tokenize(input)?;
        let mut parser = ConditionParser { tokens: &tokens, pos: 0 };
        let expr = parser.parse_or()?;
        let next = parser.peek();
        if next.kind != TokenKind::Eof {
            return Err(RoleError::QuerySyntax {
                offset: next.span.start,
                message: "unexpected trailing input".to_string(),
            });
        }
        Ok(expr)
    }

    /// `true` only if the condition definitely holds
    pub fn matches(&self, ctx: &EvalContext<'_>) -> RoleResult<bool> {
        Ok(self.evaluate(ctx)? == Some(true))
    }

    /// Three-valued evaluation; `None` is unknown
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> RoleResult<Option<bool>> {
        match self {
            Expr::Or(left, right) => {
                let l = left.evaluate(ctx)?;
                if l == Some(true) {
                    return Ok(Some(true));
                }
                let r = right.evaluate(ctx)?;
                Ok(match (l, r) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                })
            }
            Expr::And(left, right) => {
                let l = left.evaluate(ctx)?;
                if l == Some(false) {
                    return Ok(Some(false));
                }
                let r = right.evaluate(ctx)?;
                Ok(match (l, r) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                })
            }
            Expr::Not(inner) => Ok(inner.evaluate(ctx)?.map(|v| !v)),
            Expr::Compare { left, op, right } => {
                let l = left.resolve(ctx)?;
                let r = right.resolve(ctx)?;
                Ok(compare(l.as_ref(), *op, r.as_ref()))
            }
            Expr::IsNull { operand, negated } => {
                let is_null = matches!(operand.resolve(ctx)?, None | Some(Value::Null));
                Ok(Some(is_null != *negated))
            }
            Expr::In { operand, list, negated } => {
                let Some(value) = operand.resolve(ctx)?.filter(|v| !v.is_null()) else {
                    return Ok(None);
                };
                let mut found = false;
                for item in list {
                    if compare(Some(&value), CompareOp::Eq, item.resolve(ctx)?.as_ref()) == Some(true) {
                        found = true;
                        break;
                    }
                }
                Ok(Some(found != *negated))
            }
            Expr::Like { operand, pattern, negated } => {
                let value = operand.resolve(ctx)?;
                let pattern = pattern.resolve(ctx)?;
                match (value.as_ref().and_then(Value::as_str), pattern.as_ref().and_then(Value::as_str)) {
                    (Some(text), Some(pattern)) => Ok(Some(like_matches(text, pattern) != *negated)),
                    _ => Ok(None),
                }
            }
            Expr::Truthy(operand) => Ok(operand.resolve(ctx)?.and_then(|v| v.as_bool())),
        }
    }
}

impl Operand {
    fn resolve(&self, ctx: &EvalContext<'_>) -> RoleResult<Option<Value>> {
        match self {
            Operand::Literal(value) => Ok(Some(value.clone())),
            Operand::Parameter(name) => ctx
                .parameters
                .get(name)
                .cloned()
                .map(Some)
                .ok_or_else(|| RoleError::UnboundParameter { name: name.clone() }),
            Operand::Path(path) => {
                let (root, attribute_path) = path.split_first().ok_or_else(|| RoleError::UnsupportedQuery {
                    construct: "empty path".to_string(),
                })?;
                if root != ctx.alias {
                    return Err(RoleError::UnsupportedQuery {
                        construct: format!("path '{}' is not rooted at alias '{}'", path.join("."), ctx.alias),
                    });
                }
                if attribute_path.is_empty() {
                    return Err(RoleError::UnsupportedQuery {
                        construct: format!("bare alias '{}' used as a value", root),
                    });
                }
                Ok(resolve_path(ctx.entity, attribute_path).cloned())
            }
        }
    }
}

fn compare(left: Option<&Value>, op: CompareOp, right: Option<&Value>) -> Option<bool> {
    let (left, right) = (left?, right?);
    if left.is_null() || right.is_null() {
        return None;
    }
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?)?,
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => {
            return match op {
                CompareOp::Eq => Some(left == right),
                CompareOp::Ne => Some(left != right),
                _ => None,
            };
        }
    };
    Some(match op {
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => ordering.is_ne(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Ge => ordering.is_ge(),
    })
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one
fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matches[j]: pattern[..i] matches text[..j]
    let mut matches = vec![false; text.len() + 1];
    matches[0] = true;
    for p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut any = false;
                for j in 0..=text.len() {
                    any = any || matches[j];
                    next[j] = any;
                }
            }
            _ => {
                for j in 1..=text.len() {
                    next[j] = matches[j - 1] && (*p == '_' || *p == text[j - 1]);
                }
            }
        }
        matches = next;
    }
    matches[text.len()]
}

struct ConditionParser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> ConditionParser<'t> {
    fn peek(&self) -> &'t Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek().is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error<T>(&self, message: &str) -> RoleResult<T> {
        Err(RoleError::QuerySyntax {
            offset: self.peek().span.start,
            message: message.to_string(),
        })
    }

    fn parse_or(&mut self) -> RoleResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> RoleResult<Expr> {
        let mut expr = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_not()?;
            expr = Expr::And(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> RoleResult<Expr> {
        if self.eat_keyword(Keyword::Not) {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> RoleResult<Expr> {
        if self.peek().kind == TokenKind::LeftParen {
            self.advance();
            let expr = self.parse_or()?;
            if self.advance().kind != TokenKind::RightParen {
                return self.error("expected ')'");
            }
            return Ok(expr);
        }

        let operand = self.parse_operand()?;

        if let TokenKind::Operator(op) = &self.peek().kind {
            let op = match op {
                Operator::Equal => CompareOp::Eq,
                Operator::NotEqual => CompareOp::Ne,
                Operator::Less => CompareOp::Lt,
                Operator::LessEqual => CompareOp::Le,
                Operator::Greater => CompareOp::Gt,
                Operator::GreaterEqual => CompareOp::Ge,
                _ => {
                    return Err(RoleError::UnsupportedQuery {
                        construct: "arithmetic".to_string(),
                    });
                }
            };
            self.advance();
            let right = self.parse_operand()?;
            return Ok(Expr::Compare { left: operand, op, right });
        }

        if self.eat_keyword(Keyword::Is) {
            let negated = self.eat_keyword(Keyword::Not);
            if !self.eat_keyword(Keyword::Null) {
                return self.error("expected NULL");
            }
            return Ok(Expr::IsNull { operand, negated });
        }

        self.reject_unsupported_comparison()?;
        let negated = self.eat_keyword(Keyword::Not);
        if negated {
            self.reject_unsupported_comparison()?;
        }
        if self.eat_keyword(Keyword::In) {
            if self.advance().kind != TokenKind::LeftParen {
                return self.error("expected '(' after IN");
            }
            let mut list = vec![self.parse_operand()?];
            while self.peek().kind == TokenKind::Comma {
                self.advance();
                list.push(self.parse_operand()?);
            }
            if self.advance().kind != TokenKind::RightParen {
                return self.error("expected ')' to close IN list");
            }
            return Ok(Expr::In { operand, list, negated });
        }
        if self.eat_keyword(Keyword::Like) {
            let pattern = self.parse_operand()?;
            return Ok(Expr::Like { operand, pattern, negated });
        }
        if negated {
            return self.error("expected IN or LIKE after NOT");
        }

        Ok(Expr::Truthy(operand))
    }

    /// `between` and `member of` are valid JPQL the evaluator does not run
    fn reject_unsupported_comparison(&self) -> RoleResult<()> {
        match &self.peek().kind {
            TokenKind::Identifier(word) if ["between", "member"].iter().any(|w| word.eq_ignore_ascii_case(w)) => Err(RoleError::UnsupportedQuery {
                construct: word.to_ascii_lowercase(),
            }),
            _ => Ok(()),
        }
    }

    fn parse_operand(&mut self) -> RoleResult<Operand> {
        let token = self.advance();
        match &token.kind {
            TokenKind::StringLiteral(s) => Ok(Operand::Literal(Value::String(s.clone()))),
            TokenKind::NumberLiteral(n) => Ok(Operand::Literal(number(*n))),
            TokenKind::Operator(Operator::Minus) => match &self.advance().kind {
                TokenKind::NumberLiteral(n) => Ok(Operand::Literal(number(-*n))),
                _ => Err(RoleError::QuerySyntax {
                    offset: token.span.start,
                    message: "expected number after '-'".to_string(),
                }),
            },
            TokenKind::Keyword(Keyword::True) => Ok(Operand::Literal(Value::Bool(true))),
            TokenKind::Keyword(Keyword::False) => Ok(Operand::Literal(Value::Bool(false))),
            TokenKind::Keyword(Keyword::Null) => Ok(Operand::Literal(Value::Null)),
            TokenKind::Parameter(name) => Ok(Operand::Parameter(name.clone())),
            TokenKind::Identifier(first) => {
                let mut path = vec![first.clone()];
                while self.peek().kind == TokenKind::Dot {
                    self.advance();
                    match &self.advance().kind {
                        TokenKind::Identifier(segment) => path.push(segment.clone()),
                        _ => return self.error("expected attribute name after '.'"),
                    }
                }
                if self.peek().kind == TokenKind::LeftParen {
                    return Err(RoleError::UnsupportedQuery {
                        construct: format!("function call '{}'", first),
                    });
                }
                Ok(Operand::Path(path))
            }
            _ => Err(RoleError::QuerySyntax {
                offset: token.span.start,
                message: "expected a value, path or parameter".to_string(),
            }),
        }
    }
}

/// Integral literals become JSON integers so they compare equal to stored integers
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRecord;
    use serde_json::json;

    fn eval(condition: &str, entity: &EntityRecord, parameters: &BTreeMap<String, Value>) -> Option<bool> {
        let expr = Expr::parse(condition).unwrap();
        let ctx = EvalContext {
            entity,
            alias: "e",
            parameters,
        };
        expr.evaluate(&ctx).unwrap()
    }

    fn order() -> EntityRecord {
        EntityRecord::new("sales_Order")
            .with("status", "ACTIVE")
            .with("total", 120)
            .with("owner", "alice")
            .with("note", Value::Null)
            .with("paid", true)
            .with("customer", json!({ "name": "Acme Ltd" }))
    }

    #[test]
    fn test_comparisons() {
        let params = BTreeMap::new();
        let order = order();
        assert_eq!(eval("e.status = 'ACTIVE'", &order, &params), Some(true));
        assert_eq!(eval("e.total > 100 and e.total <= 120", &order, &params), Some(true));
        assert_eq!(eval("e.total < -5", &order, &params), Some(false));
        assert_eq!(eval("e.total = 120.0", &order, &params), Some(true));
        assert_eq!(eval("e.paid", &order, &params), Some(true));
        assert_eq!(eval("not e.paid or e.status != 'ACTIVE'", &order, &params), Some(false));
    }

    #[test]
    fn test_null_logic() {
        let params = BTreeMap::new();
        let order = order();
        assert_eq!(eval("e.note = 'x'", &order, &params), None);
        assert_eq!(eval("not (e.note = 'x')", &order, &params), None);
        assert_eq!(eval("e.note is null", &order, &params), Some(true));
        assert_eq!(eval("e.missing is not null", &order, &params), Some(false));
        assert_eq!(eval("e.note = 'x' or e.paid", &order, &params), Some(true));
        assert_eq!(eval("e.note = 'x' and e.paid = false", &order, &params), Some(false));
    }

    #[test]
    fn test_in_and_like() {
        let mut params = BTreeMap::new();
        params.insert("statuses".to_string(), json!("CLOSED"));
        let order = order();
        assert_eq!(eval("e.status in ('NEW', 'ACTIVE')", &order, &params), Some(true));
        assert_eq!(eval("e.status not in ('NEW', :statuses)", &order, &params), Some(true));
        assert_eq!(eval("e.customer.name like 'Acme%'", &order, &params), Some(true));
        assert_eq!(eval("e.customer.name like 'A_me'", &order, &params), Some(false));
        assert_eq!(eval("e.customer.name not like '%Corp'", &order, &params), Some(true));
    }

    #[test]
    fn test_parameters() {
        let mut params = BTreeMap::new();
        params.insert("user".to_string(), json!("alice"));
        let order = order();
        assert_eq!(eval("e.owner = :user", &order, &params), Some(true));

        let expr = Expr::parse("e.owner = :other").unwrap();
        let ctx = EvalContext {
            entity: &order,
            alias: "e",
            parameters: &params,
        };
        assert_eq!(expr.evaluate(&ctx), Err(RoleError::UnboundParameter { name: "other".to_string() }));
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(Expr::parse("upper(e.name) = 'A'"), Err(RoleError::UnsupportedQuery { .. })));
        assert!(matches!(Expr::parse("e.total + 1 > 2"), Err(RoleError::UnsupportedQuery { .. })));
        assert!(matches!(Expr::parse("e.total between 1 and 2"), Err(RoleError::UnsupportedQuery { .. })));
        assert!(matches!(Expr::parse("e.total not between 1 and 2"), Err(RoleError::UnsupportedQuery { .. })));
        assert!(matches!(Expr::parse("e.a = 1 e.b"), Err(RoleError::QuerySyntax { .. })));

        let order = order();
        let params = BTreeMap::new();
        let expr = Expr::parse("o.status = 'ACTIVE'").unwrap();
        let ctx = EvalContext {
            entity: &order,
            alias: "e",
            parameters: &params,
        };
        assert!(matches!(expr.evaluate(&ctx), Err(RoleError::UnsupportedQuery { .. })));
    }

    #[test]
    fn test_like_matcher() {
        assert!(like_matches("", "%"));
        assert!(like_matches("abc", "a%c"));
        assert!(like_matches("abc", "___"));
        assert!(!like_matches("abc", "__"));
        assert!(like_matches("a%c", "a%"));
    }
}

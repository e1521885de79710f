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

//! JPQL query handling
//!
//! Row-level JPQL policies are spliced into queries by explicit composition:
//! the query is split into its clauses, join fragments are appended after the
//! root entity and where fragments are AND-ed onto the existing where clause.

pub mod condition;
pub mod lexer;
pub mod runner;

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{RoleError, RoleResult};
use lexer::{Keyword, Token, TokenKind, tokenize};

pub use condition::{CompareOp, EvalContext, Expr, Operand};
pub use runner::InMemoryQueryRunner;

/// Placeholder for the root entity alias in policy fragments
pub const ENTITY_ALIAS_PLACEHOLDER: &str = "{E}";

/// A query split into the clauses augmentation needs to touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpqlQuery {
    /// Projection, without the `select` keyword
    pub select: String,
    /// Root entity name
    pub entity: String,
    /// Root entity alias
    pub alias: String,
    /// Join clauses, each including its `join` keyword
    pub joins: Vec<String>,
    /// Original where clause, without the `where` keyword
    pub where_clause: Option<String>,
    /// `group by` / `order by` tail, verbatim
    pub tail: Option<String>,
    conditions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Join,
    Where,
    Tail,
}

impl JpqlQuery {
    pub fn parse(text: &str) -> RoleResult<Self> {
        let tokens = tokenize(text)?;
        if !tokens[0].is_keyword(Keyword::Select) {
            return Err(syntax(&tokens[0], "query must start with SELECT"));
        }

        let from_idx = top_level_position(&tokens, 1, |t| t.is_keyword(Keyword::From)).ok_or_else(|| syntax(&tokens[0], "missing FROM clause"))?;
        let select = text[tokens[0].span.end..tokens[from_idx].span.start].trim().to_string();
        if select.is_empty() {
            return Err(syntax(&tokens[from_idx], "empty projection"));
        }

        let entity_token = &tokens[from_idx + 1];
        let TokenKind::Identifier(entity) = &entity_token.kind else {
            return Err(syntax(entity_token, "expected entity name after FROM"));
        };

        let mut idx = from_idx + 2;
        if tokens[idx].is_keyword(Keyword::As) {
            idx += 1;
        }
        let alias_token = &tokens[idx];
        let TokenKind::Identifier(alias) = &alias_token.kind else {
            return Err(syntax(alias_token, "expected alias for the root entity"));
        };
        idx += 1;

        let mut query = JpqlQuery {
            select,
            entity: entity.clone(),
            alias: alias.clone(),
            joins: Vec::new(),
            where_clause: None,
            tail: None,
            conditions: Vec::new(),
        };

        let mut current: Option<(Segment, usize)> = None;
        let mut depth = 0usize;
        for i in idx..tokens.len() {
            let token = &tokens[i];
            let boundary = match &token.kind {
                TokenKind::LeftParen => {
                    depth += 1;
                    None
                }
                TokenKind::RightParen => {
                    depth = depth.checked_sub(1).ok_or_else(|| syntax(token, "unbalanced ')'"))?;
                    None
                }
                TokenKind::Eof => Some(None),
                _ if depth > 0 => None,
                TokenKind::Comma if current.is_none() => {
                    return Err(RoleError::UnsupportedQuery {
                        construct: "multiple FROM items".to_string(),
                    });
                }
                TokenKind::Keyword(Keyword::Left | Keyword::Inner) => Some(Some(Segment::Join)),
                TokenKind::Keyword(Keyword::Join) if !follows_join_modifier(&tokens, i) => Some(Some(Segment::Join)),
                TokenKind::Keyword(Keyword::Where) => Some(Some(Segment::Where)),
                TokenKind::Keyword(Keyword::Group | Keyword::Order) => Some(Some(Segment::Tail)),
                _ => None,
            };

            let Some(next) = boundary else {
                if current.is_none() {
                    return Err(syntax(token, "unexpected token after root entity"));
                }
                continue;
            };

            if let Some((segment, start)) = current.take() {
                query.close_segment(segment, text, &tokens, start, i)?;
            }
            if token.kind == TokenKind::Eof {
                if depth > 0 {
                    return Err(syntax(token, "unbalanced '('"));
                }
                break;
            }
            // Once the tail begins, everything up to EOF belongs to it
            if next == Some(Segment::Tail) {
                query.tail = Some(text[token.span.start..].trim().to_string());
                break;
            }
            current = next.map(|segment| (segment, i));
        }

        Ok(query)
    }

    fn close_segment(&mut self, segment: Segment, text: &str, tokens: &[Token], start: usize, end: usize) -> RoleResult<()> {
        let slice = text[tokens[start].span.start..tokens[end].span.start].trim();
        match segment {
            Segment::Join => {
                if self.where_clause.is_some() {
                    return Err(syntax(&tokens[start], "JOIN after WHERE"));
                }
                self.joins.push(slice.to_string());
            }
            Segment::Where => {
                if self.where_clause.is_some() {
                    return Err(syntax(&tokens[start], "duplicate WHERE clause"));
                }
                let body = text[tokens[start].span.end..tokens[end].span.start].trim();
                if body.is_empty() {
                    return Err(syntax(&tokens[start], "empty WHERE clause"));
                }
                self.where_clause = Some(body.to_string());
            }
            Segment::Tail => self.tail = Some(slice.to_string()),
        }
        Ok(())
    }

    /// Append a join fragment
    pub fn add_join(&mut self, join: &str) {
        self.joins.push(join.trim().to_string());
    }

    /// AND a condition onto the where clause
    pub fn add_condition(&mut self, condition: &str) {
        self.conditions.push(condition.trim().to_string());
    }

    /// Conditions added by augmentation
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    /// Effective where expression, including added conditions
    pub fn where_expression(&self) -> Option<String> {
        let mut parts = Vec::with_capacity(self.conditions.len() + 1);
        if let Some(original) = &self.where_clause {
            if self.conditions.is_empty() {
                return Some(original.clone());
            }
            parts.push(format!("({})", original));
        }
        parts.extend(self.conditions.iter().map(|c| format!("({})", c)));
        if parts.is_empty() { None } else { Some(parts.join(" and ")) }
    }
}

impl fmt::Display for JpqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select {} from {} {}", self.select, self.entity, self.alias)?;
        for join in &self.joins {
            write!(f, " {}", join)?;
        }
        if let Some(where_expression) = self.where_expression() {
            write!(f, " where {}", where_expression)?;
        }
        if let Some(tail) = &self.tail {
            write!(f, " {}", tail)?;
        }
        Ok(())
    }
}

/// A query together with the values of the parameters introduced by policies
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedQuery {
    pub query: JpqlQuery,
    pub parameters: BTreeMap<String, Value>,
}

impl AugmentedQuery {
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn text(&self) -> String {
        self.query.to_string()
    }
}

/// Replace the `{E}` placeholder with the query's root alias
pub fn substitute_alias(fragment: &str, alias: &str) -> String {
    fragment.replace(ENTITY_ALIAS_PLACEHOLDER, alias)
}

/// Rename named parameters. Only parameter tokens are touched, never string literals.
pub fn rename_parameters(fragment: &str, renames: &HashMap<String, String>) -> RoleResult<String> {
    let mut out = String::with_capacity(fragment.len());
    let mut last = 0;
    for token in tokenize(fragment)? {
        if let TokenKind::Parameter(name) = &token.kind {
            if let Some(fresh) = renames.get(name) {
                out.push_str(&fragment[last..token.span.start]);
                out.push(':');
                out.push_str(fresh);
                last = token.span.end;
            }
        }
    }
    out.push_str(&fragment[last..]);
    Ok(out)
}

fn top_level_position(tokens: &[Token], from: usize, predicate: impl Fn(&Token) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(from) {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.saturating_sub(1),
            _ if depth == 0 && predicate(token) => return Some(i),
            _ => {}
        }
    }
    None
}

fn follows_join_modifier(tokens: &[Token], i: usize) -> bool {
    i > 0 && matches!(tokens[i - 1].kind, TokenKind::Keyword(Keyword::Left | Keyword::Inner | Keyword::Outer))
}

fn syntax(token: &Token, message: &str) -> RoleError {
    RoleError::QuerySyntax {
        offset: token.span.start,
        message: message.to_string(),
    }
}

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

//! Query lexical analyzer
//!
//! Tokenizes JPQL queries, policy fragments and predicate conditions.
//! Keywords are case-insensitive. Spans are byte offsets into the source so
//! that clauses can be sliced back out verbatim.

use std::iter::Peekable;
use std::str::CharIndices;

use super::ENTITY_ALIAS_PLACEHOLDER;
use crate::error::{RoleError, RoleResult};

/// A token with its byte span in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Byte range `[start, end)` in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Keyword(Keyword),
    StringLiteral(String),
    NumberLiteral(f64),
    /// Named parameter, without the leading colon
    Parameter(String),
    Operator(Operator),
    LeftParen,
    RightParen,
    Comma,
    Dot,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    Distinct,
    From,
    As,
    Join,
    Left,
    Inner,
    Outer,
    Fetch,
    Where,
    Group,
    Order,
    By,
    Having,
    And,
    Or,
    Not,
    Is,
    Null,
    In,
    Like,
    True,
    False,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Keyword> {
        let keyword = match word.to_ascii_lowercase().as_str() {
            "select" => Keyword::Select,
            "distinct" => Keyword::Distinct,
            "from" => Keyword::From,
            "as" => Keyword::As,
            "join" => Keyword::Join,
            "left" => Keyword::Left,
            "inner" => Keyword::Inner,
            "outer" => Keyword::Outer,
            "fetch" => Keyword::Fetch,
            "where" => Keyword::Where,
            "group" => Keyword::Group,
            "order" => Keyword::Order,
            "by" => Keyword::By,
            "having" => Keyword::Having,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "is" => Keyword::Is,
            "null" => Keyword::Null,
            "in" => Keyword::In,
            "like" => Keyword::Like,
            "true" => Keyword::True,
            "false" => Keyword::False,
            _ => return None,
        };
        Some(keyword)
    }
}

impl Token {
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}

/// Tokenize the entire input. The last token is always `Eof`.
pub fn tokenize(input: &str) -> RoleResult<Vec<Token>> {
    let mut lexer = Lexer {
        input,
        chars: input.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

/// Names of all parameters referenced in the input, in order of appearance
pub fn parameter_names(input: &str) -> RoleResult<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for token in tokenize(input)? {
        if let TokenKind::Parameter(name) = token.kind {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Ok(names)
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn next_token(&mut self) -> RoleResult<Token> {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }

        let Some((start, ch)) = self.chars.next() else {
            let end = self.input.len();
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span { start: end, end },
            });
        };

        let kind = match ch {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Operator(Operator::Plus),
            '-' => TokenKind::Operator(Operator::Minus),
            '*' => TokenKind::Operator(Operator::Star),
            '/' => TokenKind::Operator(Operator::Slash),
            '=' => TokenKind::Operator(Operator::Equal),
            '!' => {
                if self.eat('=') {
                    TokenKind::Operator(Operator::NotEqual)
                } else {
                    return Err(syntax(start, "expected '=' after '!'"));
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Operator(Operator::LessEqual)
                } else if self.eat('>') {
                    TokenKind::Operator(Operator::NotEqual)
                } else {
                    TokenKind::Operator(Operator::Less)
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Operator(Operator::GreaterEqual)
                } else {
                    TokenKind::Operator(Operator::Greater)
                }
            }
            '\'' => self.scan_string(start)?,
            '{' => {
                // `{E}` stands for the root alias and lexes as an identifier
                if self.eat('E') && self.eat('}') {
                    TokenKind::Identifier(ENTITY_ALIAS_PLACEHOLDER.to_string())
                } else {
                    return Err(syntax(start, "expected '{E}' entity placeholder"));
                }
            }
            ':' => {
                let name = self.scan_word();
                if name.is_empty() {
                    return Err(syntax(start, "expected parameter name after ':'"));
                }
                TokenKind::Parameter(name)
            }
            c if c.is_ascii_digit() => self.scan_number(start, c)?,
            c if is_identifier_start(c) => {
                let mut word = c.to_string();
                word.push_str(&self.scan_word());
                match Keyword::lookup(&word) {
                    Some(keyword) => TokenKind::Keyword(keyword),
                    None => TokenKind::Identifier(word),
                }
            }
            other => return Err(syntax(start, &format!("unexpected character '{}'", other))),
        };

        let end = self.chars.peek().map_or(self.input.len(), |(offset, _)| *offset);
        Ok(Token {
            kind,
            span: Span { start, end },
        })
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some((_, c)) if *c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn scan_word(&mut self) -> String {
        let mut word = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if is_identifier_part(*c) {
                word.push(*c);
                self.chars.next();
            } else {
                break;
            }
        }
        word
    }

    /// Single-quoted string; a doubled quote is an escaped quote
    fn scan_string(&mut self, start: usize) -> RoleResult<TokenKind> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\'')) => {
                    if self.eat('\'') {
                        value.push('\'');
                    } else {
                        return Ok(TokenKind::StringLiteral(value));
                    }
                }
                Some((_, c)) => value.push(c),
                None => return Err(syntax(start, "unterminated string literal")),
            }
        }
    }

    fn scan_number(&mut self, start: usize, first: char) -> RoleResult<TokenKind> {
        let mut text = first.to_string();
        let mut seen_dot = false;
        while let Some((_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(*c);
            } else if *c == '.' && !seen_dot {
                seen_dot = true;
                text.push('.');
            } else {
                break;
            }
            self.chars.next();
        }
        text.parse::<f64>()
            .map(TokenKind::NumberLiteral)
            .map_err(|_| syntax(start, &format!("invalid number '{}'", text)))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn syntax(offset: usize, message: &str) -> RoleError {
    RoleError::QuerySyntax {
        offset,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_condition_tokens() {
        assert_eq!(
            kinds("e.status <> 'it''s' AND e.total >= 10.5"),
            vec![
                TokenKind::Identifier("e".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("status".to_string()),
                TokenKind::Operator(Operator::NotEqual),
                TokenKind::StringLiteral("it's".to_string()),
                TokenKind::Keyword(Keyword::And),
                TokenKind::Identifier("e".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("total".to_string()),
                TokenKind::Operator(Operator::GreaterEqual),
                TokenKind::NumberLiteral(10.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_slice_source() {
        let input = "select e from sales_Order e";
        let tokens = tokenize(input).unwrap();
        let entity = &tokens[3];
        assert_eq!(&input[entity.span.start..entity.span.end], "sales_Order");
    }

    #[test]
    fn test_parameters_deduplicated() {
        let names = parameter_names("e.owner = :current_user_username or e.region = :region or e.manager = :current_user_username").unwrap();
        assert_eq!(names, vec!["current_user_username".to_string(), "region".to_string()]);
    }

    #[test]
    fn test_errors_carry_offset() {
        match tokenize("e.name = 'open") {
            Err(RoleError::QuerySyntax { offset, .. }) => assert_eq!(offset, 9),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(tokenize("e.a = #").is_err());
        assert!(tokenize("e.a = :").is_err());
        assert!(tokenize("{X}.a = 1").is_err());
        assert!(tokenize("{E.a = 1").is_err());
    }

    #[test]
    fn test_entity_placeholder_is_identifier() {
        assert_eq!(
            kinds("{E}.region = :region"),
            vec![
                TokenKind::Identifier("{E}".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("region".to_string()),
                TokenKind::Operator(Operator::Equal),
                TokenKind::Parameter("region".to_string()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(parameter_names("{E}.owner.login = :current_user_username").unwrap(), vec!["current_user_username".to_string()]);
    }
}

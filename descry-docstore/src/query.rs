//! Boolean query builder and parser.
//!
//! Batching logic builds [`Query`] values; stores receive the rendered text.
//! The textual syntax is the common search-engine one:
//!
//! ```text
//! set_id_s:faces AND (uuid_s:a1 OR uuid_s:b2)
//! set_id_s:faces AND descriptor_bin:*
//! ```
//!
//! - `field:value` matches a field equal to `value`
//! - `field:*` matches any document carrying `field`
//! - `AND` binds tighter than `OR`; juxtaposed clauses are ANDed
//! - special characters in values are backslash-escaped

use std::fmt;

use descry_core::StoreError;

/// Characters escaped inside rendered values.
const SPECIAL: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&',
    '/',
];

/// Boolean query over document fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Field equals value.
    Term { field: String, value: String },
    /// Field is present (`field:*`).
    Any { field: String },
    /// All sub-queries match.
    And(Vec<Query>),
    /// At least one sub-query matches.
    Or(Vec<Query>),
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl ToString) -> Self {
        Query::Term {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn any(field: impl Into<String>) -> Self {
        Query::Any {
            field: field.into(),
        }
    }

    pub fn and(clauses: impl IntoIterator<Item = Query>) -> Self {
        Query::And(clauses.into_iter().collect())
    }

    pub fn or(clauses: impl IntoIterator<Item = Query>) -> Self {
        Query::Or(clauses.into_iter().collect())
    }

    /// Number of leaf clauses, the unit stores limit.
    pub fn clause_count(&self) -> usize {
        match self {
            Query::Term { .. } | Query::Any { .. } => 1,
            Query::And(children) | Query::Or(children) => {
                children.iter().map(Query::clause_count).sum()
            }
        }
    }

    /// Parse the textual syntax back into a query.
    pub fn parse(text: &str) -> Result<Query, StoreError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            text,
            tokens,
            pos: 0,
        };
        let query = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(query)
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::And(children) | Query::Or(children) if children.len() > 1 => {
                write!(f, "({})", self)
            }
            _ => write!(f, "{}", self),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term { field, value } => write!(f, "{}:{}", field, escape(value)),
            Query::Any { field } => write!(f, "{}:*", field),
            Query::And(children) | Query::Or(children) => {
                if children.is_empty() {
                    return f.write_str("()");
                }
                let joiner = if matches!(self, Query::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    child.fmt_child(f)?;
                }
                Ok(())
            }
        }
    }
}

/// Backslash-escape special characters and whitespace.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if SPECIAL.contains(&c) || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// PARSER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Clause(Query),
}

fn invalid(text: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidQuery {
        query: text.to_string(),
        reason: reason.into(),
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, StoreError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' {
            chars.next();
            tokens.push(Token::Open);
            continue;
        }
        if c == ')' {
            chars.next();
            tokens.push(Token::Close);
            continue;
        }

        // A bare word: keyword or field:value clause.
        let mut field = String::new();
        let mut value = String::new();
        let mut seen_colon = false;
        let mut value_escaped = false;
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' {
                break;
            }
            chars.next();
            let (ch, escaped) = if c == '\\' {
                match chars.next() {
                    Some(next) => (next, true),
                    None => return Err(invalid(text, "dangling escape")),
                }
            } else {
                (c, false)
            };
            if ch == ':' && !escaped && !seen_colon {
                seen_colon = true;
            } else if seen_colon {
                value_escaped |= escaped;
                value.push(ch);
            } else {
                field.push(ch);
            }
        }

        let token = if !seen_colon {
            match field.as_str() {
                "AND" | "&&" => Token::And,
                "OR" | "||" => Token::Or,
                word => {
                    return Err(invalid(
                        text,
                        format!("expected field:value, got '{}'", word),
                    ))
                }
            }
        } else if field.is_empty() {
            return Err(invalid(text, "empty field name"));
        } else if value.is_empty() {
            return Err(invalid(text, format!("empty value for field '{}'", field)));
        } else if value == "*" && !value_escaped {
            Token::Clause(Query::Any { field })
        } else {
            Token::Clause(Query::Term { field, value })
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser<'t> {
    text: &'t str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> StoreError {
        invalid(self.text, format!("{} at token {}", reason, self.pos))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self) -> Result<Query, StoreError> {
        let mut clauses = vec![self.and_expr()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            clauses.push(self.and_expr()?);
        }
        Ok(collapse(clauses, Query::Or))
    }

    fn and_expr(&mut self) -> Result<Query, StoreError> {
        let mut clauses = vec![self.unary()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    clauses.push(self.unary()?);
                }
                Some(Token::Open) | Some(Token::Clause(_)) => clauses.push(self.unary()?),
                _ => break,
            }
        }
        Ok(collapse(clauses, Query::And))
    }

    fn unary(&mut self) -> Result<Query, StoreError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.expr()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Clause(query)) => {
                self.pos += 1;
                Ok(query)
            }
            Some(_) => Err(self.error("unexpected operator")),
            None => Err(self.error("unexpected end of query")),
        }
    }
}

fn collapse(mut clauses: Vec<Query>, group: fn(Vec<Query>) -> Query) -> Query {
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        group(clauses)
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! SCIM filter syntax parser (RFC 7644 Section 3.4.2.2).
//!
//! The input is split into tokens first and then parsed by recursive descent
//! into a [`FilterExpr`] tree. Evaluation is left to the resource provider.

use crate::error::{ScimError, ScimResult};

/// SCIM filter comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Present (has value)
    Pr,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
}

impl CompareOp {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "co" => Some(CompareOp::Co),
            "sw" => Some(CompareOp::Sw),
            "ew" => Some(CompareOp::Ew),
            "pr" => Some(CompareOp::Pr),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            _ => None,
        }
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Comparison value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Quoted JSON string.
    String(String),
    /// `true` or `false`.
    Boolean(bool),
    /// Numeric literal, kept as written.
    Number(String),
    /// `null`.
    Null,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Comparison expression: attribute op value
    Compare {
        attribute: String,
        op: CompareOp,
        value: Option<FilterValue>,
    },
    /// Complex attribute filter: attribute[filter]
    ValuePath {
        attribute: String,
        filter: Box<FilterExpr>,
    },
    /// Logical expression: left AND/OR right
    Logical {
        left: Box<FilterExpr>,
        op: LogicalOp,
        right: Box<FilterExpr>,
    },
    /// Negation: NOT expression
    Not(Box<FilterExpr>),
    /// Grouped expression: (expression)
    Group(Box<FilterExpr>),
}

impl FilterExpr {
    /// Split a top-level disjunction into its alternatives.
    ///
    /// `a or (b or c)` yields `[a, (b or c)]`; a filter without a top-level
    /// `or` yields itself.
    #[must_use]
    pub fn into_alternatives(self) -> Vec<FilterExpr> {
        match self {
            FilterExpr::Logical {
                left,
                op: LogicalOp::Or,
                right,
            } => {
                let mut alternatives = left.into_alternatives();
                alternatives.extend(right.into_alternatives());
                alternatives
            }
            other => vec![other],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    OpenBracket,
    CloseBracket,
    Word(String),
    Quoted(String),
}

fn tokenize(input: &str) -> ScimResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '[' | ']' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::Open,
                    ')' => Token::Close,
                    '[' => Token::OpenBracket,
                    _ => Token::CloseBracket,
                });
            }
            '"' => {
                chars.next();
                let mut end = None;
                let mut escaped = false;
                for (i, c) in chars.by_ref() {
                    match c {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => {
                            end = Some(i);
                            break;
                        }
                        _ => {}
                    }
                }
                let end =
                    end.ok_or_else(|| ScimError::InvalidFilter("Unterminated string".to_string()))?;
                let literal: String = serde_json::from_str(&input[start..=end]).map_err(|e| {
                    ScimError::InvalidFilter(format!("Invalid string at position {start}: {e}"))
                })?;
                tokens.push(Token::Quoted(literal));
            }
            _ => {
                let mut end = input.len();
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"') {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                tokens.push(Token::Word(input[start..end].to_string()));
            }
        }
    }

    Ok(tokens)
}

/// SCIM filter parser.
pub struct FilterParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl FilterParser {
    /// Tokenize `input` and prepare a parser over it.
    pub fn new(input: &str) -> ScimResult<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    /// Parse the filter expression.
    pub fn parse(&mut self) -> ScimResult<FilterExpr> {
        if self.tokens.is_empty() {
            return Err(ScimError::InvalidFilter("Empty filter".to_string()));
        }
        let expr = self.parse_or()?;
        if let Some(token) = self.tokens.get(self.pos) {
            return Err(ScimError::InvalidFilter(format!(
                "Unexpected token {token:?} at position {}",
                self.pos
            )));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> ScimResult<FilterExpr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = FilterExpr::Logical {
                left: Box::new(left),
                op: LogicalOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ScimResult<FilterExpr> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("and") {
            let right = self.parse_unary()?;
            left = FilterExpr::Logical {
                left: Box::new(left),
                op: LogicalOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ScimResult<FilterExpr> {
        if self.eat_keyword("not") {
            self.expect(&Token::Open, "Expected '(' after 'not'")?;
            let inner = self.parse_or()?;
            self.expect(&Token::Close, "Expected ')' to close 'not' expression")?;
            return Ok(FilterExpr::Not(Box::new(inner)));
        }

        if self.eat(&Token::Open) {
            let inner = self.parse_or()?;
            self.expect(&Token::Close, "Expected ')' to close grouped expression")?;
            return Ok(FilterExpr::Group(Box::new(inner)));
        }

        self.parse_attr_expr()
    }

    fn parse_attr_expr(&mut self) -> ScimResult<FilterExpr> {
        let attribute = match self.next() {
            Some(Token::Word(word)) if is_attribute_path(&word) => word,
            other => {
                return Err(ScimError::InvalidFilter(format!(
                    "Expected attribute name, found {other:?}"
                )))
            }
        };

        if self.eat(&Token::OpenBracket) {
            let filter = self.parse_or()?;
            self.expect(&Token::CloseBracket, "Expected ']' to close value filter")?;
            return Ok(FilterExpr::ValuePath {
                attribute,
                filter: Box::new(filter),
            });
        }

        let op = match self.next() {
            Some(Token::Word(word)) => CompareOp::parse(&word)
                .ok_or_else(|| ScimError::InvalidFilter(format!("Unknown operator: {word}")))?,
            _ => return Err(ScimError::InvalidFilter("Expected operator".to_string())),
        };

        // 'pr' operator has no value
        if op == CompareOp::Pr {
            return Ok(FilterExpr::Compare {
                attribute,
                op,
                value: None,
            });
        }

        let value = match self.next() {
            Some(Token::Quoted(s)) => FilterValue::String(s),
            Some(Token::Word(word)) => parse_literal(&word)?,
            _ => return Err(ScimError::InvalidFilter("Expected value".to_string())),
        };

        Ok(FilterExpr::Compare {
            attribute,
            op,
            value: Some(value),
        })
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.tokens.get(self.pos) == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.tokens.get(self.pos) {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, expected: &Token, message: &str) -> ScimResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(ScimError::InvalidFilter(message.to_string()))
        }
    }
}

fn is_attribute_path(word: &str) -> bool {
    word.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '$')
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':' | '$'))
}

fn parse_literal(word: &str) -> ScimResult<FilterValue> {
    match word.to_ascii_lowercase().as_str() {
        "true" => Ok(FilterValue::Boolean(true)),
        "false" => Ok(FilterValue::Boolean(false)),
        "null" => Ok(FilterValue::Null),
        _ if word.parse::<f64>().is_ok() => Ok(FilterValue::Number(word.to_string())),
        _ => Err(ScimError::InvalidFilter(format!("Invalid value: {word}"))),
    }
}

/// Parse a SCIM filter string.
pub fn parse_filter(filter: &str) -> ScimResult<FilterExpr> {
    FilterParser::new(filter)?.parse()
}

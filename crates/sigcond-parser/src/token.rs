//! Condition tokenizer.
//!
//! Splits a condition string into typed [`Token`]s by trying an ordered list
//! of lexical rules against the remaining input. The first rule that matches
//! a prefix wins, so rule order (not match length) decides how ambiguous
//! input is classified: `1 of` before plain identifiers, aggregation keywords
//! before identifiers, `<=` before `<`.
//!
//! ```
//! use sigcond_parser::token::{TokenKind, tokenize};
//!
//! let tokens = tokenize("selection and not filter").unwrap();
//! let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(
//!     kinds,
//!     [TokenKind::Identifier, TokenKind::And, TokenKind::Not, TokenKind::Identifier]
//! );
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{ConditionError, Result};

// =============================================================================
// Token types
// =============================================================================

/// Lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    And,
    Or,
    Not,
    Identifier,
    LParen,
    RParen,
    Pipe,
    /// `1 of`
    One,
    /// `all of`
    All,
    /// `count`, `min`, `max`, `avg` or `sum`
    AggFunc,
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    By,
    Near,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Pipe => "PIPE",
            TokenKind::One => "ONE",
            TokenKind::All => "ALL",
            TokenKind::AggFunc => "AGG_FUNC",
            TokenKind::Eq => "EQ",
            TokenKind::Lt => "LT",
            TokenKind::Lte => "LTE",
            TokenKind::Gt => "GT",
            TokenKind::Gte => "GTE",
            TokenKind::By => "BY",
            TokenKind::Near => "NEAR",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single token of a condition expression.
///
/// `position` is the 1-based character offset of the token's first character
/// in the original condition string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    /// Match against the token category only.
    pub fn is_kind(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Match against the literal source text only.
    pub fn has_text(&self, text: &str) -> bool {
        self.text == text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}('{}')@{}", self.kind, self.text, self.position)
    }
}

// =============================================================================
// Lexical rules
// =============================================================================

struct LexRule {
    /// `None` for input that is consumed without producing a token.
    kind: Option<TokenKind>,
    pattern: Regex,
    /// Reserved word: rejected when the match runs into a wildcard, so
    /// `count*` stays one identifier.
    keyword: bool,
}

impl LexRule {
    fn match_prefix<'a>(&self, rest: &'a str) -> Option<&'a str> {
        let m = self.pattern.find(rest)?;
        if self.keyword && rest[m.end()..].starts_with('*') {
            return None;
        }
        Some(m.as_str())
    }
}

/// Lexical rules in priority order. Every pattern is anchored at the start of
/// the remaining input; patterns ending in `\b` are reserved words.
static LEX_RULES: LazyLock<Vec<LexRule>> = LazyLock::new(|| {
    [
        (Some(TokenKind::One), r"(?i)^1\s+of\b"),
        (Some(TokenKind::All), r"(?i)^all\s+of\b"),
        (None, r"^\s+"),
        (Some(TokenKind::AggFunc), r"(?i)^(?:count|min|max|avg|sum)\b"),
        (Some(TokenKind::Near), r"(?i)^near\b"),
        (Some(TokenKind::By), r"(?i)^by\b"),
        (Some(TokenKind::Eq), r"^==?"),
        (Some(TokenKind::Lte), r"^<="),
        (Some(TokenKind::Lt), r"^<"),
        (Some(TokenKind::Gte), r"^>="),
        (Some(TokenKind::Gt), r"^>"),
        (Some(TokenKind::Pipe), r"^\|"),
        (Some(TokenKind::And), r"(?i)^and\b"),
        (Some(TokenKind::Or), r"(?i)^or\b"),
        (Some(TokenKind::Not), r"(?i)^not\b"),
        (Some(TokenKind::Identifier), r"^[\w*]+"),
        (Some(TokenKind::LParen), r"^\("),
        (Some(TokenKind::RParen), r"^\)"),
    ]
    .into_iter()
    .map(|(kind, pattern)| LexRule {
        kind,
        pattern: Regex::new(pattern).expect("lexical rule patterns are valid"),
        keyword: pattern.ends_with(r"\b"),
    })
    .collect()
});

// =============================================================================
// Public API
// =============================================================================

/// Tokenize a condition string.
///
/// Whitespace (including newlines) separates tokens and is dropped. Fails
/// with [`ConditionError::Lexical`] carrying the unconsumed remainder when
/// no rule matches at the current position.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = input;
    let mut position = 1;

    while !rest.is_empty() {
        let Some((rule, matched)) = LEX_RULES
            .iter()
            .find_map(|rule| rule.match_prefix(rest).map(|m| (rule, m)))
        else {
            return Err(ConditionError::Lexical {
                position,
                remainder: rest.to_string(),
            });
        };

        if let Some(kind) = rule.kind {
            tokens.push(Token::new(kind, matched, position));
        }
        position += matched.chars().count();
        rest = &rest[matched.len()..];
    }

    Ok(tokens)
}

// =============================================================================
// Tests
// =============================================================================

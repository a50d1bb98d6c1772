//! Token types

use serde::{Deserialize, Serialize};

use crate::error::Span;

/// Words that drive clause structure. Everything else that looks like a word
/// is an [`TokenKind::Identifier`], including function names; whether those
/// count as columns is decided later by the configured keyword set.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "ALL", "AND", "APPLY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CONNECT", "CROSS", "DELETE",
    "DESC", "DISTINCT", "ELSE", "END", "EXCEPT", "EXISTS", "FETCH", "FOR", "FROM", "FULL",
    "GROUP", "HAVING", "IN", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LATERAL",
    "LEFT", "LIKE", "LIMIT", "MERGE", "MINUS", "NATURAL", "NOT", "NULL", "OFFSET", "ON", "OR",
    "ORDER", "OUTER", "OVER", "PARTITION", "PIVOT", "PRIOR", "RECURSIVE", "RETURNING", "RIGHT",
    "SELECT", "SET", "START", "THEN", "UNION", "UNIQUE", "UNPIVOT", "UPDATE", "USING", "VALUES",
    "WHEN", "WHERE", "WINDOW", "WITH",
];

/// Returns true if `word` (already uppercased) is a structural keyword
pub fn is_structural_keyword(word: &str) -> bool {
    STRUCTURAL_KEYWORDS.binary_search(&word).is_ok()
}

/// Kind of a lexical token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    String,
    Dot,
    Star,
    Comma,
    LParen,
    RParen,
    Comment,
    Punct,
}

/// A token in the query token stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Canonical text: uppercased words, `''` for string literals,
    /// raw content for comments
    pub text: String,
    /// Location of the token in the original source
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    /// True for the keyword `kw` (uppercase)
    pub fn is_keyword(&self, kw: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == kw
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True for `+` (used to spot the Oracle outer-join marker `(+)`)
    pub fn is_plus(&self) -> bool {
        self.kind == TokenKind::Punct && self.text == "+"
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self.kind, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table_sorted() {
        let mut sorted = STRUCTURAL_KEYWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STRUCTURAL_KEYWORDS);
    }

    #[test]
    fn test_is_structural_keyword() {
        assert!(is_structural_keyword("FROM"));
        assert!(is_structural_keyword("MINUS"));
        assert!(!is_structural_keyword("COUNT"));
        assert!(!is_structural_keyword("from"));
    }
}

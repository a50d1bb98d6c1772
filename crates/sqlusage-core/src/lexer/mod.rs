//! Lexical normalizer
//!
//! A single forward scan turns raw query text into a typed token stream.
//! Comments and string literals become their own tokens so that later stages
//! never mistake their content for identifiers. Words are case-folded to
//! uppercase; each token keeps its span so diagnostics can quote the original
//! spelling.
//!
//! Scanning never fails: an unterminated comment, literal or quoted identifier
//! swallows the rest of the input and is reported as malformed.

mod token;

pub use token::{is_structural_keyword, Token, TokenKind};

use crate::error::Span;

/// Output of [`tokenize`]
#[derive(Debug, Clone, Default)]
pub struct Tokenized {
    pub tokens: Vec<Token>,
    /// Spans of unterminated constructs
    pub malformed: Vec<Malformed>,
}

/// An unterminated construct found while scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Malformed {
    pub construct: &'static str,
    pub span: Span,
}

/// Tokenize raw SQL text, comments included
pub fn tokenize(sql: &str) -> Tokenized {
    TokenizerState::new(sql).tokenize()
}

/// Query text after comment/string/whitespace normalization
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    source: String,
    tokens: Vec<Token>,
    malformed: Vec<Malformed>,
}

impl NormalizedQuery {
    pub fn new(sql: &str) -> Self {
        let Tokenized { tokens, malformed } = tokenize(sql);
        let tokens = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .collect();
        Self {
            source: sql.to_string(),
            tokens,
            malformed,
        }
    }

    /// Token stream without comments
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn malformed(&self) -> &[Malformed] {
        &self.malformed
    }

    /// Original spelling of the text under `span`
    pub fn original(&self, span: Span) -> &str {
        let end = (span.offset + span.length).min(self.source.len());
        self.source.get(span.offset..end).unwrap_or_default()
    }

    /// Canonical single-line text: uppercase, single spaces, `''` for literals
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut prev: Option<&Token> = None;
        for token in &self.tokens {
            if let Some(p) = prev {
                if p.kind != TokenKind::Dot && token.kind != TokenKind::Dot {
                    out.push(' ');
                }
            }
            out.push_str(&token.text);
            prev = Some(token);
        }
        out
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '#')
}

struct TokenizerState<'a> {
    sql: &'a str,
    chars: Vec<(usize, char)>,
    start: usize,
    current: usize,
    start_line: usize,
    start_column: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    malformed: Vec<Malformed>,
}

impl<'a> TokenizerState<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            chars: sql.char_indices().collect(),
            start: 0,
            current: 0,
            start_line: 1,
            start_column: 1,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            malformed: Vec::new(),
        }
    }

    fn tokenize(mut self) -> Tokenized {
        while !self.is_at_end() {
            if self.peek().is_whitespace() {
                self.advance();
                continue;
            }
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token();
        }
        Tokenized {
            tokens: self.tokens,
            malformed: self.malformed,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    fn peek_at(&self, ahead: usize) -> char {
        self.chars
            .get(self.current + ahead)
            .map(|(_, c)| *c)
            .unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn byte_offset(&self, index: usize) -> usize {
        self.chars
            .get(index)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.sql.len())
    }

    fn current_span(&self) -> Span {
        let start = self.byte_offset(self.start);
        Span::new(
            start,
            self.byte_offset(self.current) - start,
            self.start_line,
            self.start_column,
        )
    }

    fn lexeme(&self, from: usize, to: usize) -> &'a str {
        &self.sql[self.byte_offset(from)..self.byte_offset(to)]
    }

    fn add_token(&mut self, kind: TokenKind, text: impl Into<String>) {
        let span = self.current_span();
        self.tokens.push(Token::new(kind, text, span));
    }

    fn mark_malformed(&mut self, construct: &'static str) {
        let span = self.current_span();
        tracing::debug!(construct, line = span.line, column = span.column, "unterminated construct");
        self.malformed.push(Malformed { construct, span });
    }

    fn scan_token(&mut self) {
        let c = self.peek();
        match c {
            '-' if self.peek_next() == '-' => self.scan_line_comment(),
            '/' if self.peek_next() == '*' => self.scan_block_comment(),
            '\'' => self.scan_string(),
            '"' => self.scan_quoted_identifier(),
            '.' => {
                self.advance();
                self.add_token(TokenKind::Dot, ".");
            }
            '*' => {
                self.advance();
                self.add_token(TokenKind::Star, "*");
            }
            ',' => {
                self.advance();
                self.add_token(TokenKind::Comma, ",");
            }
            '(' => {
                self.advance();
                self.add_token(TokenKind::LParen, "(");
            }
            ')' => {
                self.advance();
                self.add_token(TokenKind::RParen, ")");
            }
            ':' if is_ident_start(self.peek_next()) => self.scan_bind_variable(),
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_ident_start(c) => self.scan_identifier_or_keyword(),
            c => {
                self.advance();
                self.add_token(TokenKind::Punct, c.to_string());
            }
        }
    }

    fn scan_line_comment(&mut self) {
        self.advance(); // -
        self.advance(); // -
        let content_start = self.current;
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
        let content = self.lexeme(content_start, self.current).trim().to_string();
        self.add_token(TokenKind::Comment, content);
    }

    fn scan_block_comment(&mut self) {
        self.advance(); // /
        self.advance(); // *
        let content_start = self.current;
        while !self.is_at_end() {
            if self.peek() == '*' && self.peek_next() == '/' {
                let content = self.lexeme(content_start, self.current).trim().to_string();
                self.advance();
                self.advance();
                self.add_token(TokenKind::Comment, content);
                return;
            }
            self.advance();
        }
        self.mark_malformed("block comment");
        let content = self.lexeme(content_start, self.current).trim().to_string();
        self.add_token(TokenKind::Comment, content);
    }

    /// Scan a `'...'` literal; the opening quote has not been consumed
    fn scan_string(&mut self) {
        self.advance(); // Opening quote
        while !self.is_at_end() {
            if self.peek() == '\'' {
                if self.peek_next() == '\'' {
                    // Escaped quote
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    self.add_token(TokenKind::String, "''");
                    return;
                }
            } else {
                self.advance();
            }
        }
        self.mark_malformed("string literal");
        self.add_token(TokenKind::String, "''");
    }

    /// Oracle alternative quoting: `q'[...]'`, `q'{...}'`, `q'!...!'`;
    /// the `q` has been consumed, the quote has not
    fn scan_q_string(&mut self) {
        self.advance(); // Opening quote
        let open = self.advance();
        let close = match open {
            '[' => ']',
            '{' => '}',
            '(' => ')',
            '<' => '>',
            other => other,
        };
        while !self.is_at_end() {
            if self.peek() == close && self.peek_next() == '\'' {
                self.advance();
                self.advance();
                self.add_token(TokenKind::String, "''");
                return;
            }
            self.advance();
        }
        self.mark_malformed("string literal");
        self.add_token(TokenKind::String, "''");
    }

    fn scan_quoted_identifier(&mut self) {
        self.advance(); // Opening quote
        let mut name = String::new();
        while !self.is_at_end() {
            let c = self.advance();
            if c == '"' {
                if self.peek() == '"' {
                    self.advance();
                    name.push('"');
                } else {
                    self.add_token(TokenKind::Identifier, name.to_uppercase());
                    return;
                }
            } else {
                name.push(c);
            }
        }
        self.mark_malformed("quoted identifier");
        self.add_token(TokenKind::Identifier, name.to_uppercase());
    }

    fn scan_bind_variable(&mut self) {
        self.advance(); // :
        while is_ident_char(self.peek()) {
            self.advance();
        }
        let text = self.lexeme(self.start, self.current).to_uppercase();
        self.add_token(TokenKind::Punct, text);
    }

    fn scan_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        if matches!(self.peek(), 'e' | 'E') {
            let signed = matches!(self.peek_next(), '+' | '-');
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_ascii_digit() {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }
        let text = self.lexeme(self.start, self.current).to_string();
        self.add_token(TokenKind::Number, text);
    }

    fn scan_identifier_or_keyword(&mut self) {
        let first = self.advance();
        if self.peek() == '\'' {
            // Literal prefixes: N'...' (national), Q'...' (alternative quoting)
            match first {
                'n' | 'N' => return self.scan_string(),
                'q' | 'Q' => return self.scan_q_string(),
                _ => {}
            }
        }
        while is_ident_char(self.peek()) {
            self.advance();
        }
        let word = self.lexeme(self.start, self.current).to_uppercase();
        let kind = if is_structural_keyword(&word) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        self.add_token(kind, word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql).tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_select() {
        let tokens = tokenize("select a.b, * from t").tokens;
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["SELECT", "A", ".", "B", ",", "*", "FROM", "T"]);
        assert_eq!(
            kinds("select a.b, * from t"),
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Star,
                TokenKind::Keyword,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_comments_are_tokens() {
        let tokenized = tokenize("SELECT 1 -- FROM fake_table\n/* FROM other */ FROM t");
        let comments: Vec<&str> = tokenized
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Comment)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(comments, vec!["FROM fake_table", "FROM other"]);
        assert!(tokenized.malformed.is_empty());
    }

    #[test]
    fn test_string_literal_replaced() {
        let query = NormalizedQuery::new("select 'it''s FROM fake_table' from dual");
        assert_eq!(query.text(), "SELECT '' FROM DUAL");
    }

    #[test]
    fn test_q_quote_and_national_literals() {
        let query = NormalizedQuery::new("select q'[it's]', N'x' , nvl(a, 0) from t");
        assert_eq!(query.text(), "SELECT '' , '' , NVL ( A , 0 ) FROM T");
    }

    #[test]
    fn test_whitespace_collapsed() {
        let query = NormalizedQuery::new("SELECT\n\t a . b\r\n   FROM    t");
        assert_eq!(query.text(), "SELECT A.B FROM T");
    }

    #[test]
    fn test_unterminated_block_comment() {
        let query = NormalizedQuery::new("SELECT a FROM t /* FROM fake");
        assert_eq!(query.text(), "SELECT A FROM T");
        assert_eq!(query.malformed().len(), 1);
        assert_eq!(query.malformed()[0].construct, "block comment");
    }

    #[test]
    fn test_unterminated_string() {
        let query = NormalizedQuery::new("SELECT a FROM t WHERE x = 'abc FROM fake");
        assert_eq!(query.text(), "SELECT A FROM T WHERE X = ''");
        assert_eq!(query.malformed()[0].construct, "string literal");
    }

    #[test]
    fn test_quoted_identifier() {
        let tokens = tokenize("SELECT \"Order Id\" FROM \"orders\"").tokens;
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "ORDER ID");
        assert_eq!(tokens[3].text, "ORDERS");
    }

    #[test]
    fn test_bind_variable_is_single_token() {
        let tokens = tokenize("WHERE id = :emp_id").tokens;
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[3].kind, TokenKind::Punct);
        assert_eq!(tokens[3].text, ":EMP_ID");
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("1 2.50 3e10 4E-2").tokens;
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "2.50", "3e10", "4E-2"]);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Number));
    }

    #[test]
    fn test_identifier_with_oracle_chars() {
        let tokens = tokenize("v$session sys#tab").tokens;
        assert_eq!(tokens[0].text, "V$SESSION");
        assert_eq!(tokens[1].text, "SYS#TAB");
    }

    #[test]
    fn test_span_and_original_text() {
        let query = NormalizedQuery::new("select\n  Cust_Name from t");
        let token = &query.tokens()[1];
        assert_eq!(token.text, "CUST_NAME");
        assert_eq!(token.span.line, 2);
        assert_eq!(token.span.column, 3);
        assert_eq!(query.original(token.span), "Cust_Name");
    }

    #[test]
    fn test_multibyte_offsets() {
        let query = NormalizedQuery::new("SELECT 'héllo', naïve FROM t");
        let token = &query.tokens()[3];
        assert_eq!(token.text, "NAÏVE");
        assert_eq!(query.original(token.span), "naïve");
    }
}

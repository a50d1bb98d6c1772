//! CTE detection
//!
//! Finds `WITH [RECURSIVE] name [(cols)] AS (...) [, name AS (...)]*` at any
//! statement or sub-statement level. Names are collected query-wide: a CTE
//! defined in one subquery also shadows a catalog table of the same name
//! elsewhere in the same query.

use crate::error::Span;
use crate::lexer::{Token, TokenKind};

use super::scope::{matching_paren, Scopes};

/// A name defined in a WITH clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CteDefinition {
    pub name: String,
    pub scope_id: usize,
    pub span: Span,
}

/// All CTE names defined in one query
#[derive(Debug, Clone, Default)]
pub struct CteSet {
    definitions: Vec<CteDefinition>,
}

impl CteSet {
    pub fn contains(&self, name: &str) -> bool {
        self.definitions
            .iter()
            .any(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    fn push(&mut self, definition: CteDefinition) {
        if !self.contains(&definition.name) {
            self.definitions.push(definition);
        }
    }
}

/// Collect CTE names, claiming the name and column-list tokens so they are
/// never read as column references
pub fn detect_ctes(tokens: &[Token], scopes: &Scopes, claimed: &mut [bool]) -> CteSet {
    let mut ctes = CteSet::default();

    for (i, token) in tokens.iter().enumerate() {
        if !token.is_keyword("WITH") {
            continue;
        }
        // START WITH belongs to a hierarchical query
        if i > 0 && tokens[i - 1].is_keyword("START") {
            continue;
        }

        let mut cursor = i + 1;
        if tokens.get(cursor).is_some_and(|t| t.is_keyword("RECURSIVE")) {
            cursor += 1;
        }

        while let Some(name) = tokens.get(cursor).filter(|t| t.is_identifier()) {
            let name_index = cursor;
            cursor += 1;

            // Optional column list
            let mut column_list = None;
            if tokens.get(cursor).is_some_and(|t| t.is(TokenKind::LParen)) {
                let close = matching_paren(tokens, cursor);
                column_list = Some((cursor + 1, close));
                cursor = close + 1;
            }

            let has_body = tokens.get(cursor).is_some_and(|t| t.is_keyword("AS"))
                && tokens.get(cursor + 1).is_some_and(|t| t.is(TokenKind::LParen));
            if !has_body {
                break;
            }

            claimed[name_index] = true;
            if let Some((from, to)) = column_list {
                for flag in claimed.iter_mut().take(to).skip(from) {
                    *flag = true;
                }
            }
            tracing::trace!(name = %name.text, "CTE definition");
            ctes.push(CteDefinition {
                name: name.text.clone(),
                scope_id: scopes.scope_of(i),
                span: name.span,
            });

            let body_close = matching_paren(tokens, cursor + 1);
            if tokens
                .get(body_close + 1)
                .is_some_and(|t| t.is(TokenKind::Comma))
            {
                cursor = body_close + 2;
            } else {
                break;
            }
        }
    }

    ctes
}

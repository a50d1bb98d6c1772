//! Query scopes
//!
//! Scope 0 is the top-level statement. Every `(` directly followed by
//! `SELECT` or `WITH` opens a nested scope that ends at its matching `)`.

use crate::lexer::{Token, TokenKind};

/// Scope assignment for a token stream
#[derive(Debug, Clone)]
pub struct Scopes {
    token_scope: Vec<usize>,
    parents: Vec<Option<usize>>,
}

impl Scopes {
    pub fn build(tokens: &[Token]) -> Self {
        let mut token_scope = Vec::with_capacity(tokens.len());
        let mut parents = vec![None];
        // One entry per open paren: the scope to restore if it opened one
        let mut stack: Vec<Option<usize>> = Vec::new();
        let mut current = 0;

        for (i, token) in tokens.iter().enumerate() {
            token_scope.push(current);
            match token.kind {
                TokenKind::LParen => {
                    if opens_subquery(tokens, i) {
                        let id = parents.len();
                        parents.push(Some(current));
                        stack.push(Some(current));
                        current = id;
                    } else {
                        stack.push(None);
                    }
                }
                TokenKind::RParen => {
                    if let Some(Some(outer)) = stack.pop() {
                        current = outer;
                        token_scope[i] = outer;
                    }
                }
                _ => {}
            }
        }

        Self {
            token_scope,
            parents,
        }
    }

    /// Scope id of the token at `index`
    pub fn scope_of(&self, index: usize) -> usize {
        self.token_scope.get(index).copied().unwrap_or(0)
    }

    /// Enclosing scope, `None` for the top level
    pub fn parent(&self, scope: usize) -> Option<usize> {
        self.parents.get(scope).copied().flatten()
    }

    /// `scope` followed by each enclosing scope out to the top level
    pub fn chain(&self, scope: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(scope), |&s| self.parent(s))
    }

    /// Number of scopes, top level included
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Whether the `(` at `open` is directly followed by `SELECT` or `WITH`
pub fn opens_subquery(tokens: &[Token], open: usize) -> bool {
    tokens
        .get(open + 1)
        .is_some_and(|next| next.is_keyword("SELECT") || next.is_keyword("WITH"))
}

/// Index of the `)` matching the `(` at `open`, or `tokens.len()` when the
/// paren is never closed
pub fn matching_paren(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

/// Name of the function whose argument list encloses `index`, if any.
/// `EXTRACT(YEAR FROM d)` encloses its `FROM` in `EXTRACT`; a subquery
/// argument such as `ANY (SELECT ...)` is not a function call.
pub fn enclosing_function(tokens: &[Token], index: usize) -> Option<&str> {
    let mut depth = 0usize;
    for i in (0..index).rev() {
        match tokens[i].kind {
            TokenKind::RParen => depth += 1,
            TokenKind::LParen if depth == 0 => {
                if opens_subquery(tokens, i) {
                    return None;
                }
                return i
                    .checked_sub(1)
                    .map(|prev| &tokens[prev])
                    .filter(|prev| prev.is_identifier())
                    .map(|prev| prev.text.as_str());
            }
            TokenKind::LParen => depth -= 1,
            _ => {}
        }
    }
    None
}

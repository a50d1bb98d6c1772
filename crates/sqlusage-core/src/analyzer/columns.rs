//! Column reference extraction

use serde::{Deserialize, Serialize};

use crate::dialect::KeywordSet;
use crate::error::Span;
use crate::lexer::{Token, TokenKind};

use super::scope::Scopes;

/// Clause a column reference appears in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Clause {
    Select,
    From,
    JoinCondition,
    /// `JOIN ... USING (cols)`: each column exists on both joined sides
    JoinUsing,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Other,
}

/// A qualified or unqualified column reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReference {
    /// Dotted prefix as written (`O`, `HR.EMPLOYEES`), uppercased
    pub qualifier: Option<String>,
    /// Bare column name, or `*`
    pub column: String,
    pub is_wildcard: bool,
    pub scope_id: usize,
    pub clause: Clause,
    pub span: Span,
}

impl Clause {
    /// `ON` predicates and `USING` lists
    pub fn is_join_predicate(self) -> bool {
        matches!(self, Clause::JoinCondition | Clause::JoinUsing)
    }
}

impl ColumnReference {
    /// Rightmost qualifier segment: the alias or table name to resolve
    pub fn qualifier_table(&self) -> Option<&str> {
        self.qualifier
            .as_deref()
            .map(|q| q.rsplit('.').next().unwrap_or(q))
    }

    /// `QUALIFIER.COLUMN`, or `COLUMN` when unqualified
    pub fn display_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}.{}", q, self.column),
            None => self.column.clone(),
        }
    }
}

/// Result of column extraction
#[derive(Debug, Clone, Default)]
pub struct ColumnExtraction {
    pub references: Vec<ColumnReference>,
    /// Column aliases defined in select lists (`expr AS name`, `expr name`)
    pub select_aliases: Vec<String>,
}

/// Extract column references from every token not claimed by an earlier stage
pub fn extract_columns(
    tokens: &[Token],
    scopes: &Scopes,
    claimed: &[bool],
    keywords: &KeywordSet,
) -> ColumnExtraction {
    let mut result = ColumnExtraction::default();
    let mut clause = Clause::Other;
    let mut clause_stack: Vec<Clause> = Vec::new();
    let is = |i: usize, kind: TokenKind| tokens.get(i).is_some_and(|t| t.kind == kind);
    let is_claimed = |i: usize| claimed.get(i).copied().unwrap_or(false);

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Keyword => {
                clause = next_clause(tokens, i, clause);
                i += 1;
            }
            TokenKind::LParen => {
                clause_stack.push(clause);
                i += 1;
            }
            TokenKind::RParen => {
                if let Some(outer) = clause_stack.pop() {
                    clause = outer;
                }
                i += 1;
            }
            TokenKind::Star => {
                if clause == Clause::Select && is_select_list_star(tokens, i) {
                    result.references.push(ColumnReference {
                        qualifier: None,
                        column: "*".to_string(),
                        is_wildcard: true,
                        scope_id: scopes.scope_of(i),
                        clause,
                        span: token.span,
                    });
                }
                i += 1;
            }
            TokenKind::Identifier => {
                // ident(.ident)*[.*]
                let start = i;
                let mut end = i;
                let mut is_wildcard = false;
                while is(end + 1, TokenKind::Dot) {
                    if is(end + 2, TokenKind::Identifier) {
                        end += 2;
                    } else if is(end + 2, TokenKind::Star) {
                        end += 2;
                        is_wildcard = true;
                        break;
                    } else {
                        break;
                    }
                }
                let next = end + 1;
                i = next;

                if (start..=end).any(is_claimed) {
                    continue;
                }
                if is(next, TokenKind::LParen) && !is_outer_join_marker(tokens, next) {
                    tracing::trace!(name = %token.text, "function call");
                    continue;
                }
                if !is_wildcard && start == end {
                    if let Some(aliased) = alias_position(tokens, start, clause) {
                        if aliased == AliasKind::Select {
                            result.select_aliases.push(token.text.clone());
                        }
                        continue;
                    }
                }

                let segments: Vec<&str> = (start..=end)
                    .step_by(2)
                    .map(|k| tokens[k].text.as_str())
                    .collect();
                let (qualifier, column) = if is_wildcard {
                    (Some(segments.join(".")), "*".to_string())
                } else {
                    let (last, prefix) = segments.split_last().unwrap_or((&"", &[]));
                    let qualifier = (!prefix.is_empty()).then(|| prefix.join("."));
                    (qualifier, last.to_string())
                };
                if !is_wildcard && keywords.contains(&column) {
                    continue;
                }

                result.references.push(ColumnReference {
                    qualifier,
                    column,
                    is_wildcard,
                    scope_id: scopes.scope_of(start),
                    clause,
                    span: tokens[start].span.to(tokens[end].span),
                });
            }
            _ => i += 1,
        }
    }

    tracing::debug!(
        references = result.references.len(),
        select_aliases = result.select_aliases.len(),
        "extracted column references"
    );
    result
}

/// Clause after keyword `tokens[i]`
fn next_clause(tokens: &[Token], i: usize, current: Clause) -> Clause {
    let followed_by_by = tokens.get(i + 1).is_some_and(|t| t.is_keyword("BY"));
    match tokens[i].text.as_str() {
        "SELECT" => Clause::Select,
        "FROM" | "JOIN" | "APPLY" => Clause::From,
        "ON" => Clause::JoinCondition,
        "USING" => Clause::JoinUsing,
        "WHERE" | "CONNECT" | "START" => Clause::Where,
        "GROUP" if followed_by_by => Clause::GroupBy,
        "ORDER" if followed_by_by => Clause::OrderBy,
        "HAVING" => Clause::Having,
        "SET" | "VALUES" | "UNION" | "INTERSECT" | "MINUS" | "EXCEPT" | "RETURNING" => {
            Clause::Other
        }
        _ => current,
    }
}

/// `*` directly in a select list: `SELECT *`, `SELECT DISTINCT *`, `SELECT a, *`
fn is_select_list_star(tokens: &[Token], i: usize) -> bool {
    let Some(prev) = i.checked_sub(1).map(|p| &tokens[p]) else {
        return false;
    };
    if ["SELECT", "DISTINCT", "ALL", "UNIQUE"]
        .iter()
        .any(|kw| prev.is_keyword(kw))
    {
        return true;
    }
    prev.kind == TokenKind::Comma
        && tokens
            .get(i + 1)
            .is_some_and(|next| next.kind == TokenKind::Comma || next.is_keyword("FROM"))
}

/// `(+)` after a column in an Oracle outer-join predicate
fn is_outer_join_marker(tokens: &[Token], open: usize) -> bool {
    tokens.get(open + 1).is_some_and(Token::is_plus)
        && tokens
            .get(open + 2)
            .is_some_and(|t| t.kind == TokenKind::RParen)
}

#[derive(Debug, PartialEq, Eq)]
enum AliasKind {
    /// Names a select-list expression; may be referenced later
    Select,
    /// Any other name after AS (e.g. the type in `CAST(x AS NUMBER)`)
    Other,
}

/// Whether the single identifier at `i` names something rather than
/// referencing a column
fn alias_position(tokens: &[Token], i: usize, clause: Clause) -> Option<AliasKind> {
    let prev = i.checked_sub(1).map(|p| &tokens[p])?;
    let kind = if clause == Clause::Select {
        AliasKind::Select
    } else {
        AliasKind::Other
    };
    if prev.is_keyword("AS") {
        return Some(kind);
    }
    if clause != Clause::Select {
        return None;
    }
    let ends_expression = matches!(
        prev.kind,
        TokenKind::Identifier | TokenKind::Number | TokenKind::String | TokenKind::RParen
    ) || prev.is_keyword("END");
    ends_expression.then_some(AliasKind::Select)
}

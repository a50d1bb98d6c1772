//! Table/alias extraction
//!
//! Scans the positions that introduce a table reference (FROM lists, JOIN,
//! DML targets) and records one [`TableBinding`] per reference. A
//! parenthesized subquery in table position is flattened: the table its own
//! `FROM` reads (through any nested derived tables) is bound under the
//! subquery's alias.

use crate::dialect::SqlDialect;
use crate::error::Span;
use crate::lexer::{Token, TokenKind};

use super::cte::CteSet;
use super::scope::{enclosing_function, matching_paren, opens_subquery, Scopes};

/// A table referenced by the query, with its alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    /// Rightmost segment of the (possibly dotted) table name, uppercased
    pub table: String,
    pub alias: Option<String>,
    pub scope_id: usize,
    /// Span of the table name in the source (the subquery's base table for
    /// derived bindings)
    pub span: Span,
    /// Bound through a subquery in table position
    pub derived: bool,
}

/// A CTE read in table position (`FROM my_cte c`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CteReference {
    pub name: String,
    pub alias: Option<String>,
    pub scope_id: usize,
}

impl CteReference {
    /// Whether `qualifier` names this reference
    pub fn answers_to(&self, qualifier: &str) -> bool {
        self.alias.as_deref() == Some(qualifier) || self.name == qualifier
    }
}

/// Result of table extraction
#[derive(Debug, Clone, Default)]
pub struct TableExtraction {
    /// Bindings in source order, CTE references and pseudo-tables excluded
    pub bindings: Vec<TableBinding>,
    pub cte_references: Vec<CteReference>,
}

/// Extract table bindings, claiming every table-name, alias and db-link token
pub fn extract_tables(
    tokens: &[Token],
    scopes: &Scopes,
    ctes: &CteSet,
    dialect: SqlDialect,
    claimed: &mut [bool],
) -> TableExtraction {
    let mut extractor = TableExtractor {
        tokens,
        scopes,
        ctes,
        dialect,
        claimed,
        result: TableExtraction::default(),
    };
    extractor.run();
    extractor.result
}

struct TableExtractor<'a, 'c> {
    tokens: &'a [Token],
    scopes: &'a Scopes,
    ctes: &'a CteSet,
    dialect: SqlDialect,
    claimed: &'c mut [bool],
    result: TableExtraction,
}

/// What introduced a table reference
#[derive(Clone, Copy)]
enum Introducer {
    /// FROM: a comma continues the list
    List,
    /// JOIN / APPLY
    Single,
    /// DML target: a following `(` is a column list, not a function call
    Target,
}

impl<'a, 'c> TableExtractor<'a, 'c> {
    fn run(&mut self) {
        for i in 0..self.tokens.len() {
            let Some(introducer) = self.introducer_at(i) else {
                continue;
            };
            let mut cursor = i + 1;
            while let Some(after) = self.table_reference(cursor, introducer) {
                let continues = matches!(introducer, Introducer::List)
                    && self.is(after, TokenKind::Comma);
                if !continues {
                    break;
                }
                cursor = after + 1;
            }
        }
    }

    fn introducer_at(&self, i: usize) -> Option<Introducer> {
        let token = &self.tokens[i];
        if token.kind != TokenKind::Keyword {
            return None;
        }
        let prev = i.checked_sub(1).map(|p| &self.tokens[p]);
        let prev_is = |kw: &str| prev.is_some_and(|p| p.is_keyword(kw));

        match token.text.as_str() {
            // EXTRACT(YEAR FROM d), TRIM(x FROM y) are not table positions
            "FROM" if enclosing_function(self.tokens, i).is_none() => Some(Introducer::List),
            "JOIN" | "APPLY" => Some(Introducer::Single),
            "UPDATE" if !prev_is("FOR") => Some(Introducer::Target),
            "INTO" if prev_is("INSERT") || prev_is("MERGE") || prev_is("ALL") => {
                Some(Introducer::Target)
            }
            "DELETE" if self.is_identifier(i + 1) => Some(Introducer::Target),
            // MERGE INTO t USING src; JOIN ... USING (cols) is a column list
            "USING" if self.follows_merge_target(i) => Some(Introducer::Single),
            _ => None,
        }
    }

    fn follows_merge_target(&self, using: usize) -> bool {
        self.tokens[..using]
            .iter()
            .rev()
            .find(|t| t.kind == TokenKind::Keyword && t.text != "INTO")
            .is_some_and(|t| t.text == "MERGE")
    }

    /// Parse one table reference at `start`; returns the index just past it
    fn table_reference(&mut self, start: usize, introducer: Introducer) -> Option<usize> {
        let token = self.tokens.get(start)?;
        match (token.kind, introducer) {
            (TokenKind::LParen, Introducer::Target) => None,
            (TokenKind::LParen, _) => Some(self.parenthesized_reference(start)),
            (TokenKind::Identifier, _) => Some(self.named_reference(start, introducer)),
            _ => None,
        }
    }

    fn named_reference(&mut self, start: usize, introducer: Introducer) -> usize {
        let name_end = self.dotted_name_end(start);
        self.claim(start..=name_end);
        let name = self.tokens[name_end].text.clone();
        let mut cursor = name_end + 1;

        // Table function source: TABLE(...), XMLTABLE(...)
        if self.is(cursor, TokenKind::LParen) && !matches!(introducer, Introducer::Target) {
            let close = matching_paren(self.tokens, cursor);
            let (_, after) = self.alias_at(close + 1);
            return after;
        }

        // Database link: name@link[.domain]
        if self.is_punct(cursor, "@") && self.is_identifier(cursor + 1) {
            let link_end = self.dotted_name_end(cursor + 1);
            self.claim(cursor..=link_end);
            cursor = link_end + 1;
        }

        let (alias, after) = self.alias_at(cursor);

        if self.ctes.contains(&name) {
            tracing::trace!(name = %name, "table reference is a CTE");
            self.result.cte_references.push(CteReference {
                name,
                alias,
                scope_id: self.scopes.scope_of(start),
            });
            return after;
        }
        if self.dialect.is_pseudo_table(&name) {
            return after;
        }

        self.result.bindings.push(TableBinding {
            table: name,
            alias,
            scope_id: self.scopes.scope_of(start),
            span: self.tokens[name_end].span,
            derived: false,
        });
        after
    }

    fn parenthesized_reference(&mut self, open: usize) -> usize {
        let close = matching_paren(self.tokens, open);
        let (alias, after) = self.alias_at(close + 1);

        if !opens_subquery(self.tokens, open) {
            // Parenthesized join: FROM (a JOIN b ON ...)
            self.table_reference(open + 1, Introducer::Single);
            return after;
        }

        let Some(base) = self.derived_base(open, close) else {
            return after;
        };
        let base_token = &self.tokens[base];
        if self.ctes.contains(&base_token.text) {
            self.result.cte_references.push(CteReference {
                name: base_token.text.clone(),
                alias,
                scope_id: self.scopes.scope_of(open),
            });
            return after;
        }
        if self.dialect.is_pseudo_table(&base_token.text) {
            return after;
        }

        tracing::trace!(table = %base_token.text, alias = ?alias, "derived table binding");
        self.result.bindings.push(TableBinding {
            table: base_token.text.clone(),
            alias,
            scope_id: self.scopes.scope_of(open),
            span: base_token.span,
            derived: true,
        });
        after
    }

    /// Index of the table-name token a derived table reads from: the
    /// subquery's own top-level `FROM`, followed through nested derived
    /// tables. Subqueries in its select list or WHERE clause are ignored.
    fn derived_base(&self, open: usize, close: usize) -> Option<usize> {
        let scope = self.scopes.scope_of(open + 1);
        let from = (open + 1..close.min(self.tokens.len())).find(|&i| {
            self.tokens[i].is_keyword("FROM")
                && self.scopes.scope_of(i) == scope
                && enclosing_function(self.tokens, i).is_none()
        })?;

        let source = from + 1;
        if self.is_identifier(source) {
            return Some(self.dotted_name_end(source));
        }
        if !self.is(source, TokenKind::LParen) {
            return None;
        }
        if opens_subquery(self.tokens, source) {
            self.derived_base(source, matching_paren(self.tokens, source))
        } else if self.is_identifier(source + 1) {
            // FROM (a JOIN b ON ...): the first joined table
            Some(self.dotted_name_end(source + 1))
        } else {
            None
        }
    }

    /// Optional `[AS] alias` at `at`; returns the alias and the index past it
    fn alias_at(&mut self, at: usize) -> (Option<String>, usize) {
        let alias_index = if self.is_keyword(at, "AS") && self.is_identifier(at + 1) {
            at + 1
        } else if self.is_identifier(at) {
            at
        } else {
            return (None, at);
        };
        self.claimed[alias_index] = true;
        (
            Some(self.tokens[alias_index].text.clone()),
            alias_index + 1,
        )
    }

    /// Last index of `ident(.ident)*` starting at `start`
    fn dotted_name_end(&self, start: usize) -> usize {
        let mut end = start;
        while self.is(end + 1, TokenKind::Dot) && self.is_identifier(end + 2) {
            end += 2;
        }
        end
    }

    fn claim(&mut self, range: std::ops::RangeInclusive<usize>) {
        for i in range {
            if let Some(flag) = self.claimed.get_mut(i) {
                *flag = true;
            }
        }
    }

    fn is(&self, i: usize, kind: TokenKind) -> bool {
        self.tokens.get(i).is_some_and(|t| t.kind == kind)
    }

    fn is_identifier(&self, i: usize) -> bool {
        self.is(i, TokenKind::Identifier)
    }

    fn is_keyword(&self, i: usize, kw: &str) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_keyword(kw))
    }

    fn is_punct(&self, i: usize, text: &str) -> bool {
        self.tokens
            .get(i)
            .is_some_and(|t| t.kind == TokenKind::Punct && t.text == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::cte::detect_ctes;
    use crate::lexer::NormalizedQuery;
    use pretty_assertions::assert_eq;

    fn bindings(sql: &str) -> Vec<(String, Option<String>, bool)> {
        extraction(sql)
            .bindings
            .into_iter()
            .map(|b| (b.table, b.alias, b.derived))
            .collect()
    }

    fn extraction(sql: &str) -> TableExtraction {
        let query = NormalizedQuery::new(sql);
        let tokens = query.tokens();
        let scopes = Scopes::build(tokens);
        let mut claimed = vec![false; tokens.len()];
        let ctes = detect_ctes(tokens, &scopes, &mut claimed);
        extract_tables(tokens, &scopes, &ctes, SqlDialect::Oracle, &mut claimed)
    }

    fn b(table: &str, alias: Option<&str>, derived: bool) -> (String, Option<String>, bool) {
        (table.to_string(), alias.map(str::to_string), derived)
    }

    #[test]
    fn test_from_and_join_with_aliases() {
        assert_eq!(
            bindings(
                "SELECT * FROM orders o JOIN customers AS c ON o.cust_id = c.id \
                 LEFT OUTER JOIN hr.regions r ON r.id = c.region_id"
            ),
            vec![
                b("ORDERS", Some("O"), false),
                b("CUSTOMERS", Some("C"), false),
                b("REGIONS", Some("R"), false),
            ]
        );
    }

    #[test]
    fn test_comma_separated_from_list() {
        assert_eq!(
            bindings("SELECT id FROM employees, departments d, locations WHERE 1 = 1"),
            vec![
                b("EMPLOYEES", None, false),
                b("DEPARTMENTS", Some("D"), false),
                b("LOCATIONS", None, false),
            ]
        );
    }

    #[test]
    fn test_self_join_keeps_both_aliases() {
        assert_eq!(
            bindings("SELECT o1.id FROM orders o1 JOIN orders o2 ON o1.id = o2.parent_id"),
            vec![b("ORDERS", Some("O1"), false), b("ORDERS", Some("O2"), false)]
        );
    }

    #[test]
    fn test_nested_derived_tables_flatten() {
        let result = bindings(
            "SELECT x.id FROM (SELECT id FROM (SELECT id FROM orders) inner_q) x",
        );
        assert_eq!(
            result,
            vec![
                b("ORDERS", Some("X"), true),
                b("ORDERS", Some("INNER_Q"), true),
                b("ORDERS", None, false),
            ]
        );
    }

    #[test]
    fn test_derived_table_ignores_filter_subqueries() {
        let result = bindings(
            "SELECT x.total FROM (SELECT o.id, o.total FROM orders o \
             WHERE o.cust_id IN (SELECT c.id FROM customers c)) x",
        );
        assert_eq!(
            result,
            vec![
                b("ORDERS", Some("X"), true),
                b("ORDERS", Some("O"), false),
                b("CUSTOMERS", Some("C"), false),
            ]
        );
    }

    #[test]
    fn test_subquery_arguments_bind_their_tables() {
        assert_eq!(
            bindings(
                "SELECT o.id FROM orders o \
                 WHERE o.cust_id = ANY (SELECT c.id FROM customers c WHERE c.region = 'EU')"
            ),
            vec![b("ORDERS", Some("O"), false), b("CUSTOMERS", Some("C"), false)]
        );
    }

    #[test]
    fn test_cte_references_are_discarded() {
        let extraction = extraction(
            "WITH orders AS (SELECT * FROM archive) SELECT o.id FROM orders o JOIN items i ON 1 = 1",
        );
        let tables: Vec<&str> = extraction
            .bindings
            .iter()
            .map(|b| b.table.as_str())
            .collect();
        assert_eq!(tables, vec!["ARCHIVE", "ITEMS"]);
        assert_eq!(
            extraction.cte_references,
            vec![CteReference {
                name: "ORDERS".to_string(),
                alias: Some("O".to_string()),
                scope_id: 0,
            }]
        );
    }

    #[test]
    fn test_dual_and_extract_are_not_tables() {
        assert_eq!(
            bindings("SELECT EXTRACT(YEAR FROM hire_date) FROM dual"),
            Vec::<(String, Option<String>, bool)>::new()
        );
    }

    #[test]
    fn test_dml_targets() {
        assert_eq!(
            bindings("UPDATE orders SET total = 0 WHERE id IN (SELECT order_id FROM items)"),
            vec![b("ORDERS", None, false), b("ITEMS", None, false)]
        );
        assert_eq!(
            bindings("INSERT INTO audit_log (id) SELECT id FROM orders"),
            vec![b("AUDIT_LOG", None, false), b("ORDERS", None, false)]
        );
        assert_eq!(
            bindings("SELECT id FROM orders FOR UPDATE"),
            vec![b("ORDERS", None, false)]
        );
        assert_eq!(
            bindings(
                "MERGE INTO orders o USING staging s ON (o.id = s.id) \
                 WHEN MATCHED THEN UPDATE SET o.total = s.total"
            ),
            vec![b("ORDERS", Some("O"), false), b("STAGING", Some("S"), false)]
        );
        assert_eq!(
            bindings("SELECT o.id FROM orders o JOIN items i USING (id)"),
            vec![b("ORDERS", Some("O"), false), b("ITEMS", Some("I"), false)]
        );
    }

    #[test]
    fn test_db_link_and_table_function() {
        assert_eq!(
            bindings("SELECT * FROM orders@remote.world o, TABLE(split(o.tags)) t"),
            vec![b("ORDERS", Some("O"), false)]
        );
    }

    #[test]
    fn test_parenthesized_join() {
        assert_eq!(
            bindings("SELECT * FROM (orders o JOIN items i ON o.id = i.order_id)"),
            vec![b("ORDERS", Some("O"), false), b("ITEMS", Some("I"), false)]
        );
    }

    #[test]
    fn test_scope_ids() {
        let extraction = extraction("SELECT * FROM a WHERE id IN (SELECT id FROM b)");
        let scopes: Vec<usize> = extraction.bindings.iter().map(|b| b.scope_id).collect();
        assert_eq!(scopes, vec![0, 1]);
    }
}

//! SQL analyzer module
//!
//! Runs the resolution pipeline over one query: tokenize, detect CTEs,
//! extract table bindings, extract column references, resolve against the
//! catalog.

mod columns;
mod config;
mod cte;
mod resolver;
mod scope;
mod tables;

use std::collections::HashMap;

use crate::error::{Diagnostic, DiagnosticKind, InputError};
use crate::lexer::NormalizedQuery;
use crate::schema::Catalog;
use crate::usage::UsageResult;

pub use columns::{extract_columns, Clause, ColumnExtraction, ColumnReference};
pub use config::{AmbiguityPolicy, AnalyzerConfig, JoinPredicatePolicy};
pub use cte::{detect_ctes, CteDefinition, CteSet};
pub use resolver::ReferenceResolver;
pub use scope::Scopes;
pub use tables::{extract_tables, CteReference, TableBinding, TableExtraction};

/// SQL Analyzer - resolves queries against a shared, read-only catalog.
///
/// An `Analyzer` holds no per-query state, so one instance can serve any
/// number of threads.
#[derive(Debug, Clone)]
pub struct Analyzer<'a> {
    catalog: &'a Catalog,
    config: AnalyzerConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self::with_config(catalog, AnalyzerConfig::default())
    }

    pub fn with_config(catalog: &'a Catalog, config: AnalyzerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    /// Resolve a query into table/column usage plus diagnostics
    pub fn resolve(&self, sql: &str) -> Result<UsageResult, InputError> {
        if sql.trim().is_empty() {
            return Err(InputError::EmptyQuery);
        }
        if self.catalog.is_empty() {
            return Err(InputError::EmptyCatalog);
        }

        let query = NormalizedQuery::new(sql);
        let extraction = Extraction::run(&query, &self.config);

        let resolver = ReferenceResolver::new(self.catalog, &self.config, &query, &extraction.scopes);
        let mut result = resolver.resolve(&extraction.tables, &extraction.columns);

        let mut warnings: Vec<Diagnostic> = query
            .malformed()
            .iter()
            .map(|m| {
                Diagnostic::warning(
                    DiagnosticKind::MalformedInput,
                    query.original(m.span),
                    format!("Unterminated {}; the rest of the query is ignored", m.construct),
                )
                .with_span(m.span)
            })
            .collect();
        warnings.append(&mut result.warnings);
        result.warnings = warnings;

        tracing::debug!(
            tables = result.table_count(),
            columns = result.column_count(),
            warnings = result.warnings.len(),
            "resolved query"
        );
        Ok(result)
    }

    /// Occurrences of each extracted column reference, keyed by
    /// `QUALIFIER.COLUMN` (or `COLUMN`), most frequent first.
    /// References are not checked against the catalog.
    pub fn count_references(&self, sql: &str) -> Vec<(String, usize)> {
        let query = NormalizedQuery::new(sql);
        let extraction = Extraction::run(&query, &self.config);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for reference in &extraction.columns.references {
            *counts.entry(reference.display_name()).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

/// Resolve `sql` against `catalog` with the default configuration
pub fn resolve(sql: &str, catalog: &Catalog) -> Result<UsageResult, InputError> {
    Analyzer::new(catalog).resolve(sql)
}

/// Output of the extraction stages for one query
struct Extraction {
    scopes: Scopes,
    tables: TableExtraction,
    columns: ColumnExtraction,
}

impl Extraction {
    fn run(query: &NormalizedQuery, config: &AnalyzerConfig) -> Self {
        let tokens = query.tokens();
        let scopes = Scopes::build(tokens);
        let mut claimed = vec![false; tokens.len()];

        let ctes = detect_ctes(tokens, &scopes, &mut claimed);
        let tables = extract_tables(tokens, &scopes, &ctes, config.dialect, &mut claimed);
        let columns = extract_columns(tokens, &scopes, &claimed, &config.keywords);

        tracing::debug!(
            tokens = tokens.len(),
            scopes = scopes.len(),
            ctes = ?ctes.names().collect::<Vec<_>>(),
            bindings = tables.bindings.len(),
            references = columns.references.len(),
            "extracted query structure"
        );

        Self {
            scopes,
            tables,
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::schema::TableDef;
    use pretty_assertions::assert_eq;

    fn setup_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_table(TableDef::new("orders").with_columns(["id", "cust_id", "total", "status"]));
        catalog.add_table(TableDef::new("customers").with_columns(["id", "name", "region"]));
        catalog
    }

    fn codes(result: &UsageResult) -> Vec<&'static str> {
        result.warnings.iter().map(Diagnostic::code).collect()
    }

    #[test]
    fn test_valid_select() {
        let catalog = setup_catalog();
        let result = Analyzer::new(&catalog)
            .resolve("SELECT o.id, o.total FROM orders o")
            .unwrap();

        assert!(result.warnings.is_empty());
        assert_eq!(result.table_count(), 1);
        assert!(result.contains("ORDERS", "ID"));
        assert!(result.contains("ORDERS", "TOTAL"));
    }

    #[test]
    fn test_table_not_in_catalog() {
        let catalog = setup_catalog();
        let result = resolve("SELECT x.a FROM mystery x", &catalog).unwrap();

        assert!(result.tables.is_empty());
        assert_eq!(codes(&result), vec!["W0001", "W0002"]);
        assert_eq!(result.warnings[0].token, "mystery");
    }

    #[test]
    fn test_unknown_column_with_suggestion() {
        let catalog = setup_catalog();
        let result = resolve("SELECT c.nmae FROM customers c", &catalog).unwrap();

        assert_eq!(codes(&result), vec!["W0003"]);
        assert_eq!(result.warnings[0].help.as_deref(), Some("Did you mean 'NAME'?"));
        assert_eq!(result.warnings[0].table.as_deref(), Some("CUSTOMERS"));
        assert!(result.columns("customers").unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_unqualified_column() {
        let catalog = setup_catalog();
        let result = resolve("SELECT nothing_here FROM orders", &catalog).unwrap();
        assert_eq!(codes(&result), vec!["W0004"]);
        assert_eq!(result.warnings[0].token, "nothing_here");
    }

    #[test]
    fn test_malformed_input_is_reported_first() {
        let catalog = setup_catalog();
        let result = resolve("SELECT id FROM orders WHERE status = 'open", &catalog).unwrap();

        assert_eq!(result.warnings[0].kind, DiagnosticKind::MalformedInput);
        assert_eq!(result.warnings[0].severity, Severity::Warning);
        assert!(result.contains("orders", "id"));
    }

    #[test]
    fn test_input_errors() {
        let catalog = setup_catalog();
        assert_eq!(resolve("  \n ", &catalog), Err(InputError::EmptyQuery));
        assert_eq!(
            resolve("SELECT 1 FROM dual", &Catalog::new()),
            Err(InputError::EmptyCatalog)
        );
    }

    #[test]
    fn test_order_by_select_alias() {
        let catalog = setup_catalog();
        let result = resolve(
            "SELECT total AS id_total FROM orders ORDER BY id_total",
            &catalog,
        )
        .unwrap();
        assert!(result.warnings.is_empty());
        assert_eq!(result.columns("orders").unwrap().len(), 1);
    }

    #[test]
    fn test_count_references() {
        let catalog = setup_catalog();
        let counts = Analyzer::new(&catalog).count_references(
            "SELECT o.id, name FROM orders o JOIN customers c ON o.cust_id = c.id WHERE o.id > 1",
        );
        assert_eq!(
            counts,
            vec![
                ("O.ID".to_string(), 2),
                ("C.ID".to_string(), 1),
                ("NAME".to_string(), 1),
                ("O.CUST_ID".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_shared_across_threads() {
        let catalog = setup_catalog();
        let analyzer = &Analyzer::new(&catalog);
        let queries = [
            "SELECT o.id FROM orders o",
            "SELECT name FROM customers",
            "SELECT * FROM orders",
        ];

        let results: Vec<UsageResult> = std::thread::scope(|s| {
            let handles: Vec<_> = queries
                .iter()
                .map(|sql| s.spawn(move || analyzer.resolve(sql).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (sql, result) in queries.iter().zip(&results) {
            assert_eq!(result, &analyzer.resolve(sql).unwrap());
        }
        assert_eq!(results[2].column_count(), 4);
    }
}

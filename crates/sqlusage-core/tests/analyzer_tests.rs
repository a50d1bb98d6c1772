// Integration tests for SQL usage resolution
use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use sqlusage_core::analyzer::{AmbiguityPolicy, Analyzer, AnalyzerConfig, JoinPredicatePolicy};
use sqlusage_core::error::{DiagnosticKind, InputError, Severity};
use sqlusage_core::schema::{Catalog, CatalogBuilder};
use sqlusage_core::usage::UsageResult;
use sqlusage_core::SqlDialect;

fn setup_catalog() -> Catalog {
    let schema_sql = r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                email TEXT
            );

            CREATE TABLE orders (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                cust_id INTEGER,
                total DECIMAL(10, 2),
                status VARCHAR(20)
            );

            CREATE TABLE customers (
                id INTEGER PRIMARY KEY,
                name VARCHAR(100),
                region VARCHAR(20)
            );

            CREATE TABLE employees (id INTEGER, name VARCHAR(100), dept_id INTEGER);
            CREATE TABLE departments (id INTEGER, name VARCHAR(100));
        "#;

    let mut builder = CatalogBuilder::new();
    builder.parse_ddl(schema_sql);
    let (catalog, diagnostics) = builder.build();
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    catalog
}

fn set(columns: &[&str]) -> BTreeSet<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

fn kinds(result: &UsageResult) -> Vec<DiagnosticKind> {
    result.warnings.iter().map(|d| d.kind).collect()
}

fn resolve(catalog: &Catalog, sql: &str) -> UsageResult {
    Analyzer::new(catalog).resolve(sql).unwrap()
}

#[test]
fn test_cte_never_resolves_to_catalog_table() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "WITH orders AS (SELECT id, name FROM users) SELECT o.id, name FROM orders o",
    );

    assert!(result.columns("ORDERS").is_none());
    assert_eq!(result.columns("USERS"), Some(&set(&["ID", "NAME"])));
    assert_eq!(
        kinds(&result),
        vec![DiagnosticKind::CteColumn, DiagnosticKind::CteColumn]
    );
    assert!(result.warnings.iter().all(|d| d.severity == Severity::Info));
    assert!(!result.has_warnings());
}

#[test]
fn test_qualified_wildcard_expands_full_column_list() {
    let catalog = setup_catalog();
    let result = resolve(&catalog, "SELECT o.*, c.name FROM orders o JOIN customers c ON 1 = 1");

    let expected: BTreeSet<String> = catalog
        .get_table("orders")
        .unwrap()
        .columns()
        .iter()
        .cloned()
        .collect();
    assert_eq!(result.columns("ORDERS"), Some(&expected));
    assert_eq!(result.columns("CUSTOMERS"), Some(&set(&["NAME"])));
}

#[test]
fn test_unqualified_wildcard_expands_scope() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT * FROM users u JOIN orders o ON u.id = o.user_id",
    );

    assert_eq!(result.column_count(), 3 + 5);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_resolution_is_deterministic() {
    let catalog = setup_catalog();
    let sql = "SELECT id, name, o.total FROM employees e, departments d, orders o \
               WHERE e.dept_id = d.id AND o.missing = 1";
    let analyzer = Analyzer::new(&catalog);

    let first = analyzer.resolve(sql).unwrap();
    let second = analyzer.resolve(sql).unwrap();
    assert_eq!(first, second);
    assert!(!first.warnings.is_empty());
}

#[test]
fn test_no_invented_columns() {
    let catalog = setup_catalog();
    let queries = [
        "SELECT u.*, o.nothing, ghost FROM users u, orders o",
        "SELECT id, email FROM users WHERE name LIKE 'x%' ORDER BY 2",
        "SELECT c.region, COUNT(*) FROM customers c GROUP BY c.region HAVING COUNT(*) > 1",
    ];

    for sql in queries {
        let result = resolve(&catalog, sql);
        for (table, columns) in &result.tables {
            let def = catalog.get_table(table).unwrap();
            for column in columns {
                assert!(def.column_exists(column), "{}.{} in {}", table, column, sql);
            }
        }
    }
}

#[test]
fn test_self_join_unions_columns() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT o1.id, o2.total FROM orders o1 JOIN orders o2 ON o1.id = o2.id",
    );

    assert_eq!(result.table_count(), 1);
    assert_eq!(result.columns("ORDERS"), Some(&set(&["ID", "TOTAL"])));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_ambiguous_column_fans_out() {
    let catalog = Catalog::from_map([
        ("EMPLOYEES", vec!["ID", "NAME"]),
        ("DEPARTMENTS", vec!["ID", "NAME"]),
    ]);
    let result = resolve(&catalog, "SELECT id FROM employees, departments");

    assert_eq!(result.columns("EMPLOYEES"), Some(&set(&["ID"])));
    assert_eq!(result.columns("DEPARTMENTS"), Some(&set(&["ID"])));
    assert_eq!(kinds(&result), vec![DiagnosticKind::AmbiguousColumn]);
    assert_eq!(
        result.warnings[0].help.as_deref(),
        Some("Qualify the column with a table name: EMPLOYEES.ID")
    );
}

#[test]
fn test_ambiguity_policies() {
    let catalog = Catalog::from_map([
        ("EMPLOYEES", vec!["ID", "NAME"]),
        ("DEPARTMENTS", vec!["ID", "NAME"]),
    ]);
    let sql = "SELECT id FROM employees, departments";

    let config = AnalyzerConfig::default().with_ambiguity(AmbiguityPolicy::FirstMatch);
    let result = Analyzer::with_config(&catalog, config).resolve(sql).unwrap();
    assert_eq!(result.columns("EMPLOYEES"), Some(&set(&["ID"])));
    assert_eq!(result.columns("DEPARTMENTS"), Some(&set(&[])));
    assert_eq!(kinds(&result), vec![DiagnosticKind::AmbiguousColumn]);

    let config = AnalyzerConfig::default().with_ambiguity(AmbiguityPolicy::Reject);
    let result = Analyzer::with_config(&catalog, config).resolve(sql).unwrap();
    assert_eq!(result.column_count(), 0);
    assert_eq!(result.table_count(), 2);
    assert_eq!(kinds(&result), vec![DiagnosticKind::AmbiguousColumn]);
}

#[test]
fn test_comment_and_literal_immunity() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT id -- FROM fake_table\n FROM users /* JOIN fake_table f */ \
         WHERE name = 'FROM fake_table' OR email = 'it''s'",
    );

    assert_eq!(result.table_count(), 1);
    assert_eq!(result.columns("USERS"), Some(&set(&["EMAIL", "ID", "NAME"])));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_join_only_table_includes_predicate_columns() {
    let catalog = setup_catalog();
    let sql = "SELECT o.total FROM orders o JOIN customers c ON o.cust_id = c.id";

    let result = resolve(&catalog, sql);
    assert_eq!(result.columns("CUSTOMERS"), Some(&set(&["ID"])));
    assert_eq!(result.columns("ORDERS"), Some(&set(&["CUST_ID", "TOTAL"])));

    let config = AnalyzerConfig::default().with_join_predicates(JoinPredicatePolicy::Exclude);
    let result = Analyzer::with_config(&catalog, config).resolve(sql).unwrap();
    assert_eq!(result.columns("CUSTOMERS"), Some(&set(&[])));
    assert_eq!(result.columns("ORDERS"), Some(&set(&["TOTAL"])));
}

#[test]
fn test_subquery_in_where() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT u.name FROM users u WHERE u.id IN (SELECT user_id FROM orders WHERE total > 100)",
    );

    assert_eq!(result.columns("USERS"), Some(&set(&["ID", "NAME"])));
    assert_eq!(result.columns("ORDERS"), Some(&set(&["TOTAL", "USER_ID"])));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_correlated_subquery() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT u.name FROM users u \
         WHERE EXISTS (SELECT 1 FROM orders o WHERE o.user_id = u.id AND status = 'open')",
    );

    assert_eq!(result.columns("USERS"), Some(&set(&["ID", "NAME"])));
    assert_eq!(result.columns("ORDERS"), Some(&set(&["STATUS", "USER_ID"])));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_derived_table_binds_through_alias() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT t.total FROM (SELECT total, status FROM orders WHERE status = 'X') t",
    );

    assert_eq!(result.columns("ORDERS"), Some(&set(&["STATUS", "TOTAL"])));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_quantified_subquery_binds_its_table() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT o.id FROM orders o \
         WHERE o.cust_id = ANY (SELECT c.id FROM customers c WHERE c.region = 'EU')",
    );

    assert_eq!(result.columns("ORDERS"), Some(&set(&["CUST_ID", "ID"])));
    assert_eq!(result.columns("CUSTOMERS"), Some(&set(&["ID", "REGION"])));
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn test_derived_table_alias_ignores_filter_subquery() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT x.total FROM (SELECT o.id, o.total FROM orders o \
         WHERE o.cust_id IN (SELECT c.id FROM customers c)) x",
    );

    assert_eq!(result.columns("ORDERS"), Some(&set(&["CUST_ID", "ID", "TOTAL"])));
    assert_eq!(result.columns("CUSTOMERS"), Some(&set(&["ID"])));
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn test_using_columns_attach_to_both_sides() {
    let catalog = setup_catalog();
    let sql = "SELECT o.total FROM orders o JOIN customers c USING (id)";

    for policy in [
        AmbiguityPolicy::FanOut,
        AmbiguityPolicy::FirstMatch,
        AmbiguityPolicy::Reject,
    ] {
        let config = AnalyzerConfig::default().with_ambiguity(policy);
        let result = Analyzer::with_config(&catalog, config).resolve(sql).unwrap();
        assert_eq!(result.columns("ORDERS"), Some(&set(&["ID", "TOTAL"])));
        assert_eq!(result.columns("CUSTOMERS"), Some(&set(&["ID"])));
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    let config = AnalyzerConfig::default().with_join_predicates(JoinPredicatePolicy::Exclude);
    let result = Analyzer::with_config(&catalog, config).resolve(sql).unwrap();
    assert_eq!(result.columns("ORDERS"), Some(&set(&["TOTAL"])));
    assert_eq!(result.columns("CUSTOMERS"), Some(&set(&[])));
}

#[test]
fn test_dml_statements() {
    let catalog = setup_catalog();

    let result = resolve(&catalog, "UPDATE orders SET status = 'closed' WHERE id = 1");
    assert_eq!(result.columns("ORDERS"), Some(&set(&["ID", "STATUS"])));

    let result = resolve(
        &catalog,
        "INSERT INTO orders (user_id, total) VALUES (:uid, 0)",
    );
    assert_eq!(result.columns("ORDERS"), Some(&set(&["TOTAL", "USER_ID"])));
    assert!(result.warnings.is_empty());

    let result = resolve(&catalog, "DELETE FROM customers WHERE region = 'EU'");
    assert_eq!(result.columns("CUSTOMERS"), Some(&set(&["REGION"])));
}

#[test]
fn test_oracle_constructs() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT e.name, d.name, NVL(e.dept_id, 0) FROM employees e, departments d \
         WHERE e.dept_id = d.id(+) AND ROWNUM <= 10",
    );

    assert_eq!(result.columns("EMPLOYEES"), Some(&set(&["DEPT_ID", "NAME"])));
    assert_eq!(result.columns("DEPARTMENTS"), Some(&set(&["ID", "NAME"])));
    assert!(result.warnings.is_empty());

    let result = resolve(&catalog, "SELECT SYSDATE FROM dual");
    assert_eq!(result.table_count(), 0);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_schema_qualified_names() {
    let catalog = setup_catalog();
    let result = resolve(&catalog, "SELECT hr.employees.name FROM hr.employees");

    assert_eq!(result.columns("EMPLOYEES"), Some(&set(&["NAME"])));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_unresolved_references_warn() {
    let catalog = setup_catalog();
    let result = resolve(
        &catalog,
        "SELECT z.id, u.nope, ghost FROM users u JOIN audit a ON a.user_id = u.id",
    );

    assert_eq!(
        kinds(&result),
        vec![
            DiagnosticKind::UnresolvedTable,
            DiagnosticKind::UnresolvedQualifier,
            DiagnosticKind::UnknownColumn,
            DiagnosticKind::UnresolvedColumn,
            DiagnosticKind::UnresolvedQualifier,
        ]
    );
    assert_eq!(result.warnings[0].table.as_deref(), Some("AUDIT"));
    assert_eq!(result.columns("USERS"), Some(&set(&["ID"])));
    assert!(result.has_warnings());
}

#[test]
fn test_keyword_set_is_configurable() {
    let catalog = Catalog::from_map([("grades", vec!["student", "level"])]);
    let sql = "SELECT student, level FROM grades";

    let result = resolve(&catalog, sql);
    assert_eq!(result.columns("GRADES"), Some(&set(&["STUDENT"])));

    let mut keywords = SqlDialect::Oracle.default_keywords();
    keywords.remove("level");
    let config = AnalyzerConfig::default().with_keywords(keywords);
    let result = Analyzer::with_config(&catalog, config).resolve(sql).unwrap();
    assert_eq!(result.columns("GRADES"), Some(&set(&["LEVEL", "STUDENT"])));

    let config = AnalyzerConfig::for_dialect(SqlDialect::Ansi);
    let result = Analyzer::with_config(&catalog, config).resolve(sql).unwrap();
    assert_eq!(result.columns("GRADES"), Some(&set(&["LEVEL", "STUDENT"])));
}

#[test]
fn test_row_catalog_matches_ddl_catalog() {
    let mut builder = CatalogBuilder::new();
    builder.parse_rows("table,column\nusers,id\nusers,name\nusers,email\n");
    let (rows_catalog, _) = builder.build();

    let sql = "SELECT u.id, email FROM users u";
    let from_rows = resolve(&rows_catalog, sql);
    let from_ddl = resolve(&setup_catalog(), sql);
    assert_eq!(from_rows, from_ddl);
}

#[test]
fn test_input_errors() {
    let catalog = setup_catalog();
    let analyzer = Analyzer::new(&catalog);
    assert_eq!(analyzer.resolve(""), Err(InputError::EmptyQuery));
    assert_eq!(
        InputError::EmptyCatalog.to_string(),
        "catalog contains no tables"
    );
}

#[test]
fn test_diagnostic_spans_point_at_original_text() {
    let catalog = setup_catalog();
    let sql = "SELECT u.id,\n       U.Emial FROM users u";
    let result = resolve(&catalog, sql);

    let warning = &result.warnings[0];
    assert_eq!(warning.kind, DiagnosticKind::UnknownColumn);
    assert_eq!(warning.token, "U.Emial");
    let span = warning.span.unwrap();
    assert_eq!(&sql[span.offset..span.offset + span.length], "U.Emial");
    assert_eq!((span.line, span.column), (2, 8));
    assert_eq!(warning.help.as_deref(), Some("Did you mean 'EMAIL'?"));
}

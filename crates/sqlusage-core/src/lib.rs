//! sqlusage-core: SQL table and column usage resolution
//!
//! This library determines which catalog tables a raw SQL query references
//! and which of their columns it uses, without parsing the query into a full
//! AST or connecting to a database.

pub mod analyzer;
pub mod dialect;
pub mod error;
pub mod lexer;
pub mod schema;
pub mod usage;

pub use analyzer::{resolve, AmbiguityPolicy, Analyzer, AnalyzerConfig, JoinPredicatePolicy};
pub use dialect::{KeywordSet, SqlDialect};
pub use error::{Diagnostic, DiagnosticKind, InputError, Severity, Span};
pub use lexer::{NormalizedQuery, Token, TokenKind};
pub use schema::{Catalog, CatalogBuilder, TableDef};
pub use usage::{UsageBuilder, UsageResult};

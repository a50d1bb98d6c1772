//! Error and diagnostic types

use serde::{Deserialize, Serialize};

/// Source location span in the original query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset from start of source
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
}

impl Span {
    pub fn new(offset: usize, length: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            length,
            line,
            column,
        }
    }

    /// Smallest span covering both `self` and `other`
    pub fn to(self, other: Span) -> Self {
        let end = (other.offset + other.length).max(self.offset + self.length);
        Self {
            offset: self.offset,
            length: end - self.offset,
            line: self.line,
            column: self.column,
        }
    }
}

/// Fatal input errors. Everything else degrades to a [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum InputError {
    #[error("query text is empty")]
    #[diagnostic(
        code(sqlusage::empty_query),
        help("Provide a SQL query with at least one statement")
    )]
    EmptyQuery,

    #[error("catalog contains no tables")]
    #[diagnostic(
        code(sqlusage::empty_catalog),
        help("Load at least one table with its column list before resolving")
    )]
    EmptyCatalog,
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A non-fatal finding produced while resolving a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    /// Offending token, in its original spelling
    pub token: String,
    /// Table the finding relates to, if known
    pub table: Option<String>,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn warning(
        kind: DiagnosticKind,
        token: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            token: token.into(),
            table: None,
            span: None,
            help: None,
        }
    }

    pub fn info(kind: DiagnosticKind, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            ..Self::warning(kind, token, message)
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Get the diagnostic code string (e.g., "W0001")
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Types of diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// W0001: Table reference not present in the catalog
    UnresolvedTable,
    /// W0002: Qualifier matches no bound alias or table
    UnresolvedQualifier,
    /// W0003: Qualified column absent from the table's catalog entry
    UnknownColumn,
    /// W0004: Unqualified column found in no bound table
    UnresolvedColumn,
    /// W0005: Unqualified column found in more than one bound table
    AmbiguousColumn,
    /// W0006: Unterminated comment or string literal
    MalformedInput,
    /// I0001: Column of a CTE rather than a catalog table
    CteColumn,
    /// W0007: Catalog source entry skipped while building the catalog
    CatalogSource,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedTable => "W0001",
            DiagnosticKind::UnresolvedQualifier => "W0002",
            DiagnosticKind::UnknownColumn => "W0003",
            DiagnosticKind::UnresolvedColumn => "W0004",
            DiagnosticKind::AmbiguousColumn => "W0005",
            DiagnosticKind::MalformedInput => "W0006",
            DiagnosticKind::CteColumn => "I0001",
            DiagnosticKind::CatalogSource => "W0007",
        }
    }

    /// Short kebab-case rule name shown next to the code
    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedTable => "unresolved-table",
            DiagnosticKind::UnresolvedQualifier => "unresolved-table-qualifier",
            DiagnosticKind::UnknownColumn => "unknown-column",
            DiagnosticKind::UnresolvedColumn => "unresolved-column",
            DiagnosticKind::AmbiguousColumn => "ambiguous-unqualified-column",
            DiagnosticKind::MalformedInput => "malformed-input",
            DiagnosticKind::CteColumn => "cte-column",
            DiagnosticKind::CatalogSource => "catalog-source",
        }
    }
}

//! Usage report

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, Severity};

/// Tables referenced by one query and the catalog columns used from each
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageResult {
    pub tables: BTreeMap<String, BTreeSet<String>>,
    pub warnings: Vec<Diagnostic>,
}

impl UsageResult {
    /// Columns used from `table`, or `None` if the table was not referenced
    pub fn columns(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.tables
            .get(table)
            .or_else(|| self.tables.get(&table.to_uppercase()))
    }

    pub fn contains(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .is_some_and(|cols| cols.contains(&column.to_uppercase()))
    }

    /// Long-form `(table, column)` pairs in sorted order. A table with no
    /// used columns yields a single row with an empty column.
    pub fn rows(&self) -> Vec<(&str, &str)> {
        self.tables
            .iter()
            .flat_map(|(table, columns)| {
                let rows: Vec<(&str, &str)> = if columns.is_empty() {
                    vec![(table.as_str(), "")]
                } else {
                    columns
                        .iter()
                        .map(|c| (table.as_str(), c.as_str()))
                        .collect()
                };
                rows
            })
            .collect()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Total number of (table, column) pairs
    pub fn column_count(&self) -> usize {
        self.tables.values().map(BTreeSet::len).sum()
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings
            .iter()
            .any(|d| matches!(d.severity, Severity::Warning | Severity::Error))
    }
}

/// Accumulates table → column usage
#[derive(Debug, Clone, Default)]
pub struct UsageBuilder {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl UsageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `table` is referenced, with or without columns
    pub fn touch(&mut self, table: &str) -> &mut Self {
        self.tables.entry(table.to_uppercase()).or_default();
        self
    }

    pub fn insert(&mut self, table: &str, column: &str) -> &mut Self {
        self.tables
            .entry(table.to_uppercase())
            .or_default()
            .insert(column.to_uppercase());
        self
    }

    /// Union another builder into this one
    pub fn merge(&mut self, other: UsageBuilder) -> &mut Self {
        for (table, columns) in other.tables {
            self.tables.entry(table).or_default().extend(columns);
        }
        self
    }

    pub fn build(self, warnings: Vec<Diagnostic>) -> UsageResult {
        UsageResult {
            tables: self.tables,
            warnings,
        }
    }
}

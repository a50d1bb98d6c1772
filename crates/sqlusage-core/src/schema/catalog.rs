//! Schema catalog - stores table names and their column lists

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Schema catalog - every known table with its ordered column list.
///
/// Names are canonicalized to uppercase, so lookups are case-insensitive.
/// Serializes as a plain `{ "TABLE": ["COL", ...] }` map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "IndexMap<String, Vec<String>>",
    into = "IndexMap<String, Vec<String>>"
)]
pub struct Catalog {
    tables: IndexMap<String, TableDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a table → columns map
    pub fn from_map<T, C, I>(map: I) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let mut catalog = Self::new();
        for (table, columns) in map {
            let mut def = TableDef::new(table.as_ref());
            for column in columns {
                def.add_column(column.as_ref());
            }
            catalog.add_table(def);
        }
        catalog
    }

    /// Add a table; columns of an existing table with the same name are merged
    pub fn add_table(&mut self, table: TableDef) {
        match self.tables.get_mut(&table.name) {
            Some(existing) => {
                for column in table.columns {
                    existing.add_column(&column);
                }
            }
            None => {
                self.tables.insert(table.name.clone(), table);
            }
        }
    }

    /// Look up a table by name (case-insensitive)
    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.tables
            .get(name)
            .or_else(|| self.tables.get(&name.to_uppercase()))
    }

    pub(crate) fn get_table_mut(&mut self, name: &str) -> Option<&mut TableDef> {
        self.tables.get_mut(&name.to_uppercase())
    }

    /// Check if a table exists
    pub fn table_exists(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Get all table names in insertion order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl From<IndexMap<String, Vec<String>>> for Catalog {
    fn from(map: IndexMap<String, Vec<String>>) -> Self {
        Self::from_map(map)
    }
}

impl From<Catalog> for IndexMap<String, Vec<String>> {
    fn from(catalog: Catalog) -> Self {
        catalog
            .tables
            .into_iter()
            .map(|(name, table)| (name, table.columns))
            .collect()
    }
}

/// Table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    columns: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_uppercase(),
            columns: Vec::new(),
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for column in columns {
            self.add_column(column.as_ref());
        }
        self
    }

    /// Append a column. Returns false for blanks and duplicates.
    pub fn add_column(&mut self, name: &str) -> bool {
        let name = name.trim().to_uppercase();
        if name.is_empty() || self.columns.contains(&name) {
            return false;
        }
        self.columns.push(name);
        true
    }

    /// Get a column by name, returning its canonical spelling
    pub fn get_column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Check if a column exists
    pub fn column_exists(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Columns in catalog order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

//! Reference resolver - matches column references against bound catalog tables

use indexmap::IndexMap;

use crate::error::{Diagnostic, DiagnosticKind};
use crate::lexer::NormalizedQuery;
use crate::schema::{Catalog, TableDef};
use crate::usage::{UsageBuilder, UsageResult};

use super::columns::{Clause, ColumnExtraction, ColumnReference};
use super::config::{AmbiguityPolicy, AnalyzerConfig, JoinPredicatePolicy};
use super::scope::Scopes;
use super::tables::{TableBinding, TableExtraction};

/// Resolves one query's references into a [`UsageResult`]
pub struct ReferenceResolver<'a> {
    catalog: &'a Catalog,
    config: &'a AnalyzerConfig,
    query: &'a NormalizedQuery,
    scopes: &'a Scopes,
    /// Bindings whose table is in the catalog
    bound: Vec<&'a TableBinding>,
    /// Alias (or bare table name when unaliased) -> indices into `bound`
    aliases: IndexMap<String, Vec<usize>>,
    /// Alias or name -> table, for bindings the catalog does not know
    unknown: IndexMap<String, String>,
    usage: UsageBuilder,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(
        catalog: &'a Catalog,
        config: &'a AnalyzerConfig,
        query: &'a NormalizedQuery,
        scopes: &'a Scopes,
    ) -> Self {
        Self {
            catalog,
            config,
            query,
            scopes,
            bound: Vec::new(),
            aliases: IndexMap::new(),
            unknown: IndexMap::new(),
            usage: UsageBuilder::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Resolve all references, consuming the resolver
    pub fn resolve(mut self, tables: &'a TableExtraction, columns: &ColumnExtraction) -> UsageResult {
        self.bind_tables(tables);
        for reference in &columns.references {
            if reference.clause.is_join_predicate()
                && self.config.join_predicates == JoinPredicatePolicy::Exclude
            {
                tracing::trace!(column = %reference.display_name(), "join predicate column skipped");
                continue;
            }
            match (&reference.qualifier, reference.is_wildcard) {
                (Some(_), _) => self.resolve_qualified(reference, tables),
                (None, true) => self.expand_scope_wildcard(reference),
                (None, false) => self.resolve_unqualified(reference, tables, columns),
            }
        }
        self.usage.build(self.diagnostics)
    }

    /// Keep catalog tables, warn about the rest, and index aliases
    fn bind_tables(&mut self, tables: &'a TableExtraction) {
        for binding in &tables.bindings {
            let key = binding.alias.clone().unwrap_or_else(|| binding.table.clone());
            match self.catalog.get_table(&binding.table) {
                Some(def) => {
                    self.usage.touch(&def.name);
                    self.aliases.entry(key).or_default().push(self.bound.len());
                    self.bound.push(binding);
                }
                None => {
                    self.unknown.insert(key, binding.table.clone());
                    self.diagnostics.push(
                        Diagnostic::warning(
                            DiagnosticKind::UnresolvedTable,
                            self.query.original(binding.span),
                            format!("Table '{}' not found in catalog", binding.table),
                        )
                        .with_table(binding.table.clone())
                        .with_span(binding.span),
                    );
                }
            }
        }
        tracing::debug!(
            bound = self.bound.len(),
            unresolved = self.unknown.len(),
            "bound tables"
        );
    }

    fn resolve_qualified(&mut self, reference: &ColumnReference, tables: &TableExtraction) {
        let qualifier = reference.qualifier_table().unwrap_or_default();

        let Some(binding) = self.lookup_qualifier(qualifier, reference.scope_id) else {
            self.unresolved_qualifier(reference, qualifier, tables);
            return;
        };
        let Some(table) = self.catalog.get_table(&binding.table) else {
            return;
        };

        if reference.is_wildcard {
            for column in table.columns() {
                self.usage.insert(&table.name, column);
            }
            return;
        }

        match table.get_column(&reference.column) {
            Some(column) => {
                self.usage.insert(&table.name, column);
            }
            None => {
                let mut diagnostic = Diagnostic::warning(
                    DiagnosticKind::UnknownColumn,
                    self.query.original(reference.span),
                    format!(
                        "Column '{}' not found in table '{}'",
                        reference.column, table.name
                    ),
                )
                .with_table(table.name.clone())
                .with_span(reference.span);
                if let Some(similar) = find_similar_column(table, &reference.column) {
                    diagnostic = diagnostic.with_help(format!("Did you mean '{}'?", similar));
                }
                self.diagnostics.push(diagnostic);
            }
        }
    }

    fn unresolved_qualifier(
        &mut self,
        reference: &ColumnReference,
        qualifier: &str,
        tables: &TableExtraction,
    ) {
        let token = self.query.original(reference.span);

        if let Some(cte) = tables
            .cte_references
            .iter()
            .find(|cte| cte.answers_to(qualifier))
        {
            tracing::trace!(column = %reference.display_name(), cte = %cte.name, "CTE column");
            self.diagnostics.push(
                Diagnostic::info(
                    DiagnosticKind::CteColumn,
                    token,
                    format!(
                        "Column '{}' belongs to CTE '{}', not a catalog table",
                        reference.column, cte.name
                    ),
                )
                .with_span(reference.span),
            );
            return;
        }

        let message = match self.unknown.get(qualifier) {
            Some(table) => format!(
                "Qualifier '{}' refers to table '{}', which is not in the catalog",
                qualifier, table
            ),
            None => format!(
                "Qualifier '{}' does not match any table or alias in the query",
                qualifier
            ),
        };
        self.diagnostics.push(
            Diagnostic::warning(DiagnosticKind::UnresolvedQualifier, token, message)
                .with_span(reference.span),
        );
    }

    /// Unqualified `*`: every catalog table bound in the reference's scope
    fn expand_scope_wildcard(&mut self, reference: &ColumnReference) {
        let tables: Vec<&'a str> = self
            .bound
            .iter()
            .copied()
            .filter(|b| b.scope_id == reference.scope_id)
            .map(|b| b.table.as_str())
            .collect();

        if tables.is_empty() {
            self.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::UnresolvedColumn,
                    "*",
                    "'*' has no catalog table to expand over",
                )
                .with_span(reference.span),
            );
            return;
        }

        for name in tables {
            if let Some(table) = self.catalog.get_table(name) {
                for column in table.columns() {
                    self.usage.insert(&table.name, column);
                }
            }
        }
    }

    fn resolve_unqualified(
        &mut self,
        reference: &ColumnReference,
        tables: &TableExtraction,
        columns: &ColumnExtraction,
    ) {
        let is_select_alias = columns.select_aliases.contains(&reference.column);
        if is_select_alias && reference.clause == Clause::OrderBy {
            tracing::trace!(column = %reference.column, "select alias");
            return;
        }

        let matches = self.candidates(reference);
        match matches.as_slice() {
            [] => self.unresolved_column(reference, tables, is_select_alias),
            [table] => {
                self.insert_column(table, &reference.column);
            }
            // USING (col) names a column both joined tables carry
            [..] if reference.clause == Clause::JoinUsing => {
                for table in &matches {
                    self.insert_column(table, &reference.column);
                }
            }
            [first, ..] => {
                let names: Vec<&str> = matches.iter().map(|t| t.name.as_str()).collect();
                let receivers: &[&TableDef] = match self.config.ambiguity {
                    AmbiguityPolicy::FanOut => &matches,
                    AmbiguityPolicy::FirstMatch => &matches[..1],
                    AmbiguityPolicy::Reject => &[],
                };
                for table in receivers {
                    self.insert_column(table, &reference.column);
                }
                self.diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::AmbiguousColumn,
                        self.query.original(reference.span),
                        format!(
                            "Column '{}' is ambiguous: found in {}",
                            reference.column,
                            names.join(", ")
                        ),
                    )
                    .with_span(reference.span)
                    .with_help(format!(
                        "Qualify the column with a table name: {}.{}",
                        first.name, reference.column
                    )),
                );
            }
        }
    }

    fn unresolved_column(
        &mut self,
        reference: &ColumnReference,
        tables: &TableExtraction,
        is_select_alias: bool,
    ) {
        if is_select_alias {
            tracing::trace!(column = %reference.column, "select alias");
            return;
        }

        let token = self.query.original(reference.span);
        let chain: Vec<usize> = self.scopes.chain(reference.scope_id).collect();
        if let Some(cte) = tables
            .cte_references
            .iter()
            .find(|cte| chain.contains(&cte.scope_id))
        {
            self.diagnostics.push(
                Diagnostic::info(
                    DiagnosticKind::CteColumn,
                    token,
                    format!(
                        "Column '{}' is assumed to come from CTE '{}'",
                        reference.column, cte.name
                    ),
                )
                .with_span(reference.span),
            );
            return;
        }

        self.diagnostics.push(
            Diagnostic::warning(
                DiagnosticKind::UnresolvedColumn,
                token,
                format!(
                    "Column '{}' not found in any table bound in the query",
                    reference.column
                ),
            )
            .with_span(reference.span),
        );
    }

    /// Distinct catalog tables defining the reference's column, from the
    /// innermost scope that has any
    fn candidates(&self, reference: &ColumnReference) -> Vec<&'a TableDef> {
        for scope in self.scopes.chain(reference.scope_id) {
            let mut found: Vec<&'a TableDef> = Vec::new();
            for binding in self.bound.iter().filter(|b| b.scope_id == scope) {
                let Some(table) = self.catalog.get_table(&binding.table) else {
                    continue;
                };
                let is_new = !found.iter().any(|t| t.name == table.name);
                if is_new && table.column_exists(&reference.column) {
                    found.push(table);
                }
            }
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Binding a qualifier names: aliases first, then bare table names.
    /// Among several, the last one in the innermost enclosing scope wins.
    fn lookup_qualifier(&self, qualifier: &str, scope: usize) -> Option<&'a TableBinding> {
        let indices: Vec<usize> = match self.aliases.get(qualifier) {
            Some(indices) => indices.clone(),
            None => self
                .bound
                .iter()
                .enumerate()
                .filter(|(_, b)| b.table == qualifier)
                .map(|(i, _)| i)
                .collect(),
        };
        let last = *indices.last()?;

        let in_scope = self.scopes.chain(scope).find_map(|s| {
            indices
                .iter()
                .rev()
                .find(|&&i| self.bound[i].scope_id == s)
                .copied()
        });
        Some(self.bound[in_scope.unwrap_or(last)])
    }

    fn insert_column(&mut self, table: &TableDef, column: &str) {
        if let Some(canonical) = table.get_column(column) {
            self.usage.insert(&table.name, canonical);
        }
    }
}

/// Closest column name within edit distance 3, for suggestions
fn find_similar_column<'t>(table: &'t TableDef, name: &str) -> Option<&'t str> {
    let name = name.to_uppercase();
    table
        .columns()
        .iter()
        .map(|column| (levenshtein_distance(&name, column), column))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, column)| column.as_str())
}

/// Edit distance between two strings, two-row dynamic programming
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("NAME", "NAME"), 0);
        assert_eq!(levenshtein_distance("NMAE", "NAME"), 2);
    }

    #[test]
    fn test_find_similar_column() {
        let table = TableDef::new("users").with_columns(["id", "email", "created_at"]);
        assert_eq!(find_similar_column(&table, "emial"), Some("EMAIL"));
        assert_eq!(find_similar_column(&table, "created"), Some("CREATED_AT"));
        assert_eq!(find_similar_column(&table, "zzzzzzzz"), None);
    }
}

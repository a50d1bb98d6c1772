//! Catalog builder - collects tables from row lists and DDL scripts

use sqlparser::ast::{AlterTableOperation, CreateTable, ObjectName, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::schema::{Catalog, TableDef};

/// Header cells recognized (case-insensitively) in a row file
const TABLE_HEADERS: &[&str] = &["TABLE", "TABLE_NAME", "TABLENAME"];
const COLUMN_HEADERS: &[&str] = &["COLUMN", "COLUMN_NAME", "COLUMNNAME"];

/// Element keywords inside a CREATE TABLE body that do not start a column
const CONSTRAINT_WORDS: &[&str] = &["CONSTRAINT", "PRIMARY", "FOREIGN", "CHECK", "PERIOD"];

/// Builder for constructing a Catalog from row lists and SQL schema definitions
pub struct CatalogBuilder {
    catalog: Catalog,
    diagnostics: Vec<Diagnostic>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Add long-form `(table, column)` pairs. Rows with a blank cell are skipped.
    pub fn add_rows<I, T, C>(&mut self, rows: I) -> &mut Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: AsRef<str>,
    {
        for (table, column) in rows {
            let (table, column) = (table.as_ref().trim(), column.as_ref().trim());
            if table.is_empty() || column.is_empty() {
                continue;
            }
            self.catalog
                .add_table(TableDef::new(table).with_columns([column]));
        }
        self
    }

    /// Parse delimited `TABLE,COLUMN` lines. Tab, semicolon and comma
    /// delimiters are accepted; a leading header row is skipped.
    pub fn parse_rows(&mut self, text: &str) -> &mut Self {
        let mut offset = 0;
        for (index, line) in text.lines().enumerate() {
            let line_offset = offset;
            offset += line.len() + 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let cells: Vec<&str> = trimmed
                .split(row_delimiter(trimmed))
                .map(|cell| cell.trim().trim_matches('"').trim())
                .collect();

            match cells.as_slice() {
                [table, column, ..] if !table.is_empty() && !column.is_empty() => {
                    if index == 0 && is_header(table, column) {
                        continue;
                    }
                    self.add_rows([(table, column)]);
                }
                _ => {
                    self.diagnostics.push(
                        Diagnostic::warning(
                            DiagnosticKind::CatalogSource,
                            trimmed,
                            format!("line {}: expected a TABLE,COLUMN pair", index + 1),
                        )
                        .with_span(Span::new(line_offset, line.len(), index + 1, 1)),
                    );
                }
            }
        }
        self
    }

    /// Parse SQL schema definitions (CREATE TABLE, ALTER TABLE ... ADD COLUMN)
    pub fn parse_ddl(&mut self, sql: &str) -> &mut Self {
        let dialect = GenericDialect {};

        // Try parsing the entire script first (fast path)
        match Parser::parse_sql(&dialect, sql) {
            Ok(statements) => {
                for stmt in &statements {
                    self.process_statement(stmt);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "schema script did not parse as a whole");
                self.parse_statements_individually(sql);
            }
        }
        self
    }

    /// Parse statements one at a time so unsupported syntax (packages,
    /// storage clauses, grants) only costs the statement it appears in
    fn parse_statements_individually(&mut self, sql: &str) {
        let dialect = GenericDialect {};

        for (start, end) in split_statements(sql) {
            let text = sql[start..end].trim();
            if text.is_empty() {
                continue;
            }

            match Parser::parse_sql(&dialect, text) {
                Ok(stmts) => {
                    for stmt in &stmts {
                        self.process_statement(stmt);
                    }
                }
                Err(e) => self.recover_statement(sql, start, end, &e.to_string()),
            }
        }
    }

    /// Salvage the column list of a CREATE TABLE that sqlparser rejected
    fn recover_statement(&mut self, sql: &str, start: usize, end: usize, error: &str) {
        let tokenized = tokenize(&sql[start..end]);
        let tokens: Vec<Token> = tokenized
            .tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .collect();

        let is_create_table = tokens.first().is_some_and(|t| t.text == "CREATE")
            && tokens.iter().take(4).any(|t| t.text == "TABLE");
        if !is_create_table {
            tracing::trace!(error, "skipping unsupported schema statement");
            return;
        }

        let span = tokens.first().map(|t| {
            let offset = start + t.span.offset;
            let before = &sql[..offset];
            let line = before.matches('\n').count() + 1;
            let column = before.len() - before.rfind('\n').map_or(0, |nl| nl + 1) + 1;
            Span::new(offset, t.span.length, line, column)
        });
        let statement_head = tokens
            .iter()
            .take(4)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let diagnostic = match recover_create_table(&tokens) {
            Some(table) => {
                let message = format!(
                    "CREATE TABLE {} was recovered heuristically ({} columns)",
                    table.name,
                    table.columns().len()
                );
                let name = table.name.clone();
                self.catalog.add_table(table);
                Diagnostic::warning(DiagnosticKind::CatalogSource, statement_head, message)
                    .with_table(name)
            }
            None => Diagnostic::warning(
                DiagnosticKind::CatalogSource,
                statement_head,
                format!("CREATE TABLE statement could not be parsed: {}", error),
            ),
        };
        self.diagnostics.push(match span {
            Some(span) => diagnostic.with_span(span),
            None => diagnostic,
        });
    }

    /// Process a single SQL statement
    fn process_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::CreateTable(create) => self.process_create_table(create),
            Statement::AlterTable {
                name, operations, ..
            } => self.process_alter_table(name, operations),
            _ => {}
        }
    }

    fn process_create_table(&mut self, create: &CreateTable) {
        let table = TableDef::new(object_table_name(&create.name))
            .with_columns(create.columns.iter().map(|c| c.name.value.as_str()));
        tracing::trace!(table = %table.name, columns = table.columns().len(), "CREATE TABLE");
        self.catalog.add_table(table);
    }

    fn process_alter_table(&mut self, name: &ObjectName, operations: &[AlterTableOperation]) {
        let table_name = object_table_name(name);

        let Some(table) = self.catalog.get_table_mut(&table_name) else {
            self.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::CatalogSource,
                    table_name.clone(),
                    format!(
                        "ALTER TABLE references table '{}' which was not found in schema",
                        table_name
                    ),
                )
                .with_table(table_name.to_uppercase())
                .with_help("Ensure the CREATE TABLE statement appears before ALTER TABLE"),
            );
            return;
        };

        for operation in operations {
            if let AlterTableOperation::AddColumn { column_def, .. } = operation {
                table.add_column(&column_def.name.value);
            }
        }
    }

    /// Consume the builder and return the catalog
    pub fn build(self) -> (Catalog, Vec<Diagnostic>) {
        (self.catalog, self.diagnostics)
    }

    /// Get a reference to the current catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Rightmost segment of a possibly schema-qualified name
fn object_table_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_else(|| name.to_string())
}

fn row_delimiter(line: &str) -> char {
    if line.contains('\t') {
        '\t'
    } else if line.contains(';') && !line.contains(',') {
        ';'
    } else {
        ','
    }
}

fn is_header(table: &str, column: &str) -> bool {
    let matches = |cell: &str, names: &[&str]| names.iter().any(|n| n.eq_ignore_ascii_case(cell));
    matches(table, TABLE_HEADERS) && matches(column, COLUMN_HEADERS)
}

/// Byte ranges of the `;`-separated statements in a script. Semicolons
/// inside comments and string literals do not split.
fn split_statements(sql: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for token in tokenize(sql).tokens {
        if token.kind == TokenKind::Punct && token.text == ";" {
            ranges.push((start, token.span.offset));
            start = token.span.offset + token.span.length;
        }
    }
    if !sql[start..].trim().is_empty() {
        ranges.push((start, sql.len()));
    }
    ranges
}

/// Table name and leading column identifiers of `CREATE ... TABLE name ( ... )`
fn recover_create_table(tokens: &[Token]) -> Option<TableDef> {
    let table_kw = tokens.iter().position(|t| t.text == "TABLE")?;

    let mut cursor = table_kw + 1;
    let mut name = tokens.get(cursor).filter(|t| t.is_identifier())?;
    while tokens.get(cursor + 1).is_some_and(|t| t.is(TokenKind::Dot))
        && tokens.get(cursor + 2).is_some_and(Token::is_identifier)
    {
        cursor += 2;
        name = &tokens[cursor];
    }
    cursor += 1;
    if !tokens.get(cursor).is_some_and(|t| t.is(TokenKind::LParen)) {
        return None;
    }

    let mut table = TableDef::new(&name.text);
    let mut depth = 0usize;
    let mut element_start = true;
    for token in &tokens[cursor..] {
        match token.kind {
            TokenKind::LParen => {
                depth += 1;
                element_start = depth == 1;
                continue;
            }
            TokenKind::RParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            TokenKind::Comma if depth == 1 => {
                element_start = true;
                continue;
            }
            TokenKind::Identifier if depth == 1 && element_start => {
                if !CONSTRAINT_WORDS.contains(&token.text.as_str()) {
                    table.add_column(&token.text);
                }
            }
            _ => {}
        }
        element_start = false;
    }

    (!table.columns().is_empty()).then_some(table)
}

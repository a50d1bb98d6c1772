//! Output formatting

use miette::{IntoDiagnostic, Result};
use sqlusage_core::{Diagnostic, Severity, UsageResult};

use crate::args::OutputFormat;

/// Output formatter for one input file
pub struct OutputFormatter {
    format: OutputFormat,
    file_name: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, file_name: String) -> Self {
        Self { format, file_name }
    }

    /// Print a usage report in the configured format. CSV is written once
    /// for all files by [`print_csv`].
    pub fn print_usage(&self, result: &UsageResult, source: &str, quiet: bool) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if !quiet {
                    self.print_human_usage(result);
                }
                self.print_human(&result.warnings, source);
            }
            OutputFormat::Json => self.print_json(result)?,
            OutputFormat::Csv => self.print_human(&result.warnings, source),
        }
        Ok(())
    }

    /// Print diagnostics in the configured format
    pub fn print_diagnostics(&self, diagnostics: &[Diagnostic], source: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "file": self.file_name,
                    "diagnostics": diagnostics.iter().map(diagnostic_json).collect::<Vec<_>>()
                });
                println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
            }
            OutputFormat::Human | OutputFormat::Csv => self.print_human(diagnostics, source),
        }
        Ok(())
    }

    fn print_human_usage(&self, result: &UsageResult) {
        println!("\x1b[1m{}\x1b[0m", self.file_name);
        if result.tables.is_empty() {
            println!("  (no catalog tables referenced)");
        }
        for (table, columns) in &result.tables {
            if columns.is_empty() {
                println!("  \x1b[36m{}\x1b[0m: \x1b[2m(no columns)\x1b[0m", table);
            } else {
                let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                println!("  \x1b[36m{}\x1b[0m: {}", table, columns.join(", "));
            }
        }
    }

    fn print_human(&self, diagnostics: &[Diagnostic], source: &str) {
        for diag in diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "\x1b[31merror\x1b[0m",
                Severity::Warning => "\x1b[33mwarning\x1b[0m",
                Severity::Info => "\x1b[34minfo\x1b[0m",
            };

            eprintln!(
                "{}[{}]: {} \x1b[2m({})\x1b[0m",
                severity_str,
                diag.code(),
                diag.message,
                diag.kind.name()
            );

            if let Some(span) = &diag.span {
                eprintln!("  --> {}:{}:{}", self.file_name, span.line, span.column);

                if let Some(source_line) = get_source_line(source, span.line) {
                    eprintln!("   |");
                    eprintln!("{:>3} | {}", span.line, source_line);

                    let padding = " ".repeat(span.column.saturating_sub(1));
                    let remaining = source_line
                        .chars()
                        .count()
                        .saturating_sub(span.column.saturating_sub(1));
                    let underline = "^".repeat(span.length.min(remaining).max(1));
                    eprintln!("   | {}{}", padding, underline);
                }
            }

            if let Some(help) = &diag.help {
                eprintln!("   = help: {}", help);
            }

            eprintln!();
        }
    }

    fn print_json(&self, result: &UsageResult) -> Result<()> {
        let output = serde_json::json!({
            "file": self.file_name,
            "tables": result.tables,
            "diagnostics": result.warnings.iter().map(diagnostic_json).collect::<Vec<_>>()
        });
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
        Ok(())
    }
}

fn diagnostic_json(diag: &Diagnostic) -> serde_json::Value {
    serde_json::json!({
        "code": diag.code(),
        "name": diag.kind.name(),
        "severity": diag.severity,
        "message": diag.message,
        "token": diag.token,
        "table": diag.table,
        "span": diag.span,
        "help": diag.help,
    })
}

/// Print the long-form `TableName,ColumnName` report
pub fn print_csv(result: &UsageResult) {
    print!("{}", render_csv(result));
}

fn render_csv(result: &UsageResult) -> String {
    let mut out = String::from("TableName,ColumnName\n");
    for (table, column) in result.rows() {
        out.push_str(&csv_field(table));
        out.push(',');
        out.push_str(&csv_field(column));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Get a specific line from source (1-indexed)
fn get_source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlusage_core::UsageBuilder;

    #[test]
    fn test_render_csv() {
        let mut builder = UsageBuilder::new();
        builder
            .insert("ORDERS", "TOTAL")
            .insert("ORDERS", "ID")
            .touch("CUSTOMERS");
        let result = builder.build(Vec::new());

        assert_eq!(
            render_csv(&result),
            "TableName,ColumnName\nCUSTOMERS,\nORDERS,ID\nORDERS,TOTAL\n"
        );
    }

    #[test]
    fn test_diagnostic_json_carries_code_and_name() {
        use sqlusage_core::DiagnosticKind;

        let diag = Diagnostic::warning(
            DiagnosticKind::UnknownColumn,
            "o.totl",
            "Column 'TOTL' not found",
        )
        .with_table("ORDERS");
        let value = diagnostic_json(&diag);

        assert_eq!(value["code"], "W0003");
        assert_eq!(value["name"], "unknown-column");
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["table"], "ORDERS");
        assert!(value["span"].is_null());
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("PLAIN"), "PLAIN");
        assert_eq!(csv_field("A,B"), "\"A,B\"");
        assert_eq!(csv_field("SAY \"HI\""), "\"SAY \"\"HI\"\"\"");
    }

    #[test]
    fn test_get_source_line() {
        let source = "SELECT 1\nFROM dual\n";
        assert_eq!(get_source_line(source, 2), Some("FROM dual"));
        assert_eq!(get_source_line(source, 5), None);
    }
}

//! sqlusage CLI - SQL table and column usage reporting

mod args;
mod config;
mod loader;
mod output;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use sqlusage_core::lexer::tokenize;
use sqlusage_core::{
    Analyzer, AnalyzerConfig, Catalog, InputError, Severity, SqlDialect, UsageBuilder,
    UsageResult,
};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command, OutputFormat};
use crate::config::{Config, Overrides};
use crate::loader::{expand_patterns, load_catalog};
use crate::output::{print_csv, OutputFormatter};

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

/// `RUST_LOG` wins unless `-v` is given; the default level is warn
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<bool> {
    let quiet = args.quiet;
    match args.command {
        Command::Resolve {
            files,
            catalog,
            dialect,
            format,
            ambiguity,
            exclude_join_columns,
            disable,
            deny_warnings,
            config: config_path,
        } => {
            let config = match config_path {
                Some(path) => Config::from_file(&path)?,
                None => Config::find_and_load()?.unwrap_or_default(),
            };
            let config = config.merge_with_args(Overrides {
                catalog: &catalog,
                files: &files,
                dialect: dialect.as_deref(),
                format,
                ambiguity: ambiguity.map(Into::into),
                exclude_join_columns,
                disable: &disable,
            });
            run_resolve(&config, deny_warnings, quiet)
        }

        Command::Catalog { files } => {
            let (catalog, sources) = load_catalog(&files)?;
            for source in &sources {
                let formatter =
                    OutputFormatter::new(OutputFormat::Human, source.path.display().to_string());
                formatter.print_diagnostics(&source.diagnostics, &source.content)?;
            }

            println!("Catalog: {} table(s)", catalog.len());
            println!("==================");
            for table in catalog.tables() {
                println!("\n  Table: {} ({} columns)", table.name, table.columns().len());
                for column in table.columns() {
                    println!("    - {}", column);
                }
            }

            Ok(false)
        }

        Command::Count { file, dialect } => {
            let content = read_query(&file)?;
            let dialect: SqlDialect = dialect.parse().map_err(|e: String| miette::miette!(e))?;
            let catalog = Catalog::new();
            let analyzer = Analyzer::with_config(&catalog, AnalyzerConfig::for_dialect(dialect));

            for (name, count) in analyzer.count_references(&content) {
                println!("{:>6}  {}", count, name);
            }

            Ok(false)
        }

        Command::Tokens { file } => {
            let content = read_query(&file)?;
            let tokenized = tokenize(&content);

            for token in &tokenized.tokens {
                println!(
                    "{:>4}:{:<4} {:<10} {}",
                    token.span.line,
                    token.span.column,
                    format!("{:?}", token.kind),
                    token.text
                );
            }
            for malformed in &tokenized.malformed {
                eprintln!(
                    "unterminated {} at {}:{}",
                    malformed.construct, malformed.span.line, malformed.span.column
                );
            }

            Ok(!tokenized.malformed.is_empty())
        }
    }
}

fn run_resolve(config: &Config, deny_warnings: bool, quiet: bool) -> Result<bool> {
    let output_format = config.output_format()?;
    let analyzer_config = config.analyzer_config()?;

    // Build the catalog
    let catalog_files: Vec<PathBuf> = config.catalog.iter().map(PathBuf::from).collect();
    if catalog_files.is_empty() {
        miette::bail!("No catalog files specified. Use --catalog or configure in sqlusage.toml");
    }
    let (catalog, sources) = load_catalog(&catalog_files)?;

    let mut total_errors = 0;
    let mut total_warnings = 0;
    for source in &sources {
        let diagnostics: Vec<_> = source
            .diagnostics
            .iter()
            .filter(|d| config.is_enabled(d.code()))
            .cloned()
            .collect();
        total_warnings += diagnostics.len();
        if !diagnostics.is_empty() {
            let formatter =
                OutputFormatter::new(OutputFormat::Human, source.path.display().to_string());
            formatter.print_diagnostics(&diagnostics, &source.content)?;
        }
    }
    if catalog.is_empty() {
        return Err(InputError::EmptyCatalog.into());
    }

    // Collect query files
    let query_files = expand_patterns(&config.files)?;
    if query_files.is_empty() {
        miette::bail!("No query files specified. Use positional arguments or configure in sqlusage.toml");
    }
    let queries: Vec<(PathBuf, String)> = query_files
        .into_iter()
        .map(|path| read_query(&path).map(|sql| (path, sql)))
        .collect::<Result<_>>()?;

    // Resolve every file against the shared catalog
    let analyzer = Analyzer::with_config(&catalog, analyzer_config);
    let results = resolve_parallel(&analyzer, &queries);

    let mut combined = UsageBuilder::new();
    for ((path, sql), result) in queries.iter().zip(results) {
        let mut result = result
            .map_err(miette::Report::new)
            .wrap_err_with(|| format!("cannot resolve {}", path.display()))?;
        result.warnings.retain(|d| config.is_enabled(d.code()));

        for diag in &result.warnings {
            match diag.severity {
                Severity::Error => total_errors += 1,
                Severity::Warning => total_warnings += 1,
                Severity::Info => {}
            }
        }

        if output_format == OutputFormat::Csv {
            combined.merge(usage_of(&result));
        }
        OutputFormatter::new(output_format, path.display().to_string())
            .print_usage(&result, sql, quiet)?;
    }

    if output_format == OutputFormat::Csv {
        print_csv(&combined.build(Vec::new()));
    }

    if !quiet {
        eprintln!();
        eprintln!(
            "Resolved {} file(s) against {} catalog table(s): {} error(s), {} warning(s)",
            queries.len(),
            catalog.len(),
            total_errors,
            total_warnings
        );
    }

    Ok(total_errors > 0 || (deny_warnings && total_warnings > 0))
}

/// Resolve each query on a pool of scoped threads; results keep input order
fn resolve_parallel(
    analyzer: &Analyzer<'_>,
    queries: &[(PathBuf, String)],
) -> Vec<std::result::Result<UsageResult, InputError>> {
    if queries.is_empty() {
        return Vec::new();
    }
    let workers = std::thread::available_parallelism()
        .map_or(1, |n| n.get())
        .min(queries.len());
    let chunk_size = queries.len().div_ceil(workers);
    tracing::debug!(files = queries.len(), workers, "resolving queries");

    std::thread::scope(|s| {
        let handles: Vec<_> = queries
            .chunks(chunk_size)
            .map(|chunk| {
                s.spawn(move || {
                    chunk
                        .iter()
                        .map(|(_, sql)| analyzer.resolve(sql))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

fn usage_of(result: &UsageResult) -> UsageBuilder {
    let mut builder = UsageBuilder::new();
    for (table, columns) in &result.tables {
        builder.touch(table);
        for column in columns {
            builder.insert(table, column);
        }
    }
    builder
}

fn read_query(path: &PathBuf) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

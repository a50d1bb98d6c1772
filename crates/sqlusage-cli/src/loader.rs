//! Catalog and query file loading

use std::fs;
use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result, WrapErr};
use sqlusage_core::{Catalog, CatalogBuilder, Diagnostic};

/// Diagnostics raised while reading one catalog file
pub struct CatalogSource {
    pub path: PathBuf,
    pub content: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// How a catalog file is read, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CatalogFormat {
    Json,
    Toml,
    Ddl,
    Rows,
}

impl CatalogFormat {
    fn for_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Self::Json,
            Some("toml") => Self::Toml,
            Some("sql" | "ddl") => Self::Ddl,
            _ => Self::Rows,
        }
    }
}

/// Read and merge all catalog files
pub fn load_catalog(paths: &[PathBuf]) -> Result<(Catalog, Vec<CatalogSource>)> {
    let mut catalog = Catalog::new();
    let mut sources = Vec::new();

    for path in paths {
        let content = fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read catalog file {}", path.display()))?;
        let (file_catalog, diagnostics) = parse_catalog(path, &content)?;
        tracing::info!(
            path = %path.display(),
            tables = file_catalog.len(),
            "loaded catalog file"
        );

        for table in file_catalog.tables() {
            catalog.add_table(table.clone());
        }
        sources.push(CatalogSource {
            path: path.clone(),
            content,
            diagnostics,
        });
    }

    Ok((catalog, sources))
}

fn parse_catalog(path: &Path, content: &str) -> Result<(Catalog, Vec<Diagnostic>)> {
    match CatalogFormat::for_path(path) {
        CatalogFormat::Json => {
            let catalog: Catalog = serde_json::from_str(content)
                .into_diagnostic()
                .wrap_err_with(|| format!("invalid JSON catalog {}", path.display()))?;
            Ok((catalog, Vec::new()))
        }
        CatalogFormat::Toml => {
            let catalog: Catalog = toml::from_str(content)
                .into_diagnostic()
                .wrap_err_with(|| format!("invalid TOML catalog {}", path.display()))?;
            Ok((catalog, Vec::new()))
        }
        CatalogFormat::Ddl => {
            let mut builder = CatalogBuilder::new();
            builder.parse_ddl(content);
            Ok(builder.build())
        }
        CatalogFormat::Rows => {
            let mut builder = CatalogBuilder::new();
            builder.parse_rows(content);
            Ok(builder.build())
        }
    }
}

/// Expand glob patterns; plain paths pass through unchanged
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            let mut matched: Vec<PathBuf> = glob::glob(pattern)
                .into_diagnostic()?
                .flatten()
                .collect();
            matched.sort();
            if matched.is_empty() {
                tracing::warn!(pattern = %pattern, "pattern matched no files");
            }
            files.extend(matched);
        } else {
            files.push(PathBuf::from(pattern));
        }
    }
    Ok(files)
}

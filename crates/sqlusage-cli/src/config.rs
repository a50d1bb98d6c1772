//! Configuration file handling

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use sqlusage_core::{AmbiguityPolicy, AnalyzerConfig, JoinPredicatePolicy, SqlDialect};

use crate::args::OutputFormat;

pub const CONFIG_FILE_NAME: &str = "sqlusage.toml";

/// Configuration for sqlusage
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Catalog file paths
    #[serde(default)]
    pub catalog: Vec<String>,

    /// Query file patterns to resolve
    #[serde(default)]
    pub files: Vec<String>,

    /// SQL dialect ("oracle" or "ansi")
    #[serde(default)]
    pub dialect: Option<String>,

    /// Output format (human, json, csv)
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub ambiguity: Option<AmbiguityPolicy>,

    #[serde(default)]
    pub join_predicates: Option<JoinPredicatePolicy>,

    /// Words added to the dialect's keyword set
    #[serde(default)]
    pub extra_keywords: Vec<String>,

    /// Words removed from the dialect's keyword set, so they resolve as columns
    #[serde(default)]
    pub allow_keywords: Vec<String>,

    /// Diagnostic codes to suppress (e.g., ["W0004", "I0001"])
    #[serde(default)]
    pub disable: Vec<String>,
}

/// Command-line values that override the configuration file
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub catalog: &'a [PathBuf],
    pub files: &'a [PathBuf],
    pub dialect: Option<&'a str>,
    pub format: Option<OutputFormat>,
    pub ambiguity: Option<AmbiguityPolicy>,
    pub exclude_join_columns: bool,
    pub disable: &'a [String],
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        let config: Config = toml::from_str(&contents).into_diagnostic()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try to find and load sqlusage.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(Some(Self::from_file(&config_path)?));
            }

            // Try parent directory
            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Merge CLI arguments into configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_with_args(mut self, args: Overrides<'_>) -> Self {
        let to_strings = |paths: &[PathBuf]| -> Vec<String> {
            paths.iter().map(|p| p.display().to_string()).collect()
        };

        if !args.catalog.is_empty() {
            self.catalog = to_strings(args.catalog);
        }

        if !args.files.is_empty() {
            self.files = to_strings(args.files);
        }

        if let Some(dialect) = args.dialect {
            self.dialect = Some(dialect.to_string());
        }

        if let Some(fmt) = args.format {
            self.format = Some(format!("{:?}", fmt).to_lowercase());
        }

        if args.ambiguity.is_some() {
            self.ambiguity = args.ambiguity;
        }

        if args.exclude_join_columns {
            self.join_predicates = Some(JoinPredicatePolicy::Exclude);
        }

        if !args.disable.is_empty() {
            self.disable = args.disable.to_vec();
        }

        self
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        match &self.format {
            Some(fmt) => fmt.parse().map_err(|e: String| miette::miette!(e)),
            None => Ok(OutputFormat::default()),
        }
    }

    /// Analyzer settings: dialect defaults adjusted by the keyword lists and policies
    pub fn analyzer_config(&self) -> Result<AnalyzerConfig> {
        let dialect: SqlDialect = match &self.dialect {
            Some(name) => name.parse().map_err(|e: String| miette::miette!(e))?,
            None => SqlDialect::default(),
        };

        let mut keywords = dialect.default_keywords();
        keywords.extend(&self.extra_keywords);
        for word in &self.allow_keywords {
            keywords.remove(word);
        }

        Ok(AnalyzerConfig::for_dialect(dialect)
            .with_keywords(keywords)
            .with_ambiguity(self.ambiguity.unwrap_or_default())
            .with_join_predicates(self.join_predicates.unwrap_or_default()))
    }

    /// Whether diagnostics with `code` should be reported
    pub fn is_enabled(&self, code: &str) -> bool {
        !self.disable.iter().any(|d| d.eq_ignore_ascii_case(code))
    }
}

//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sqlusage_core::AmbiguityPolicy;

#[derive(Parser)]
#[command(name = "sqlusage")]
#[command(author, version, about = "Report which catalog tables and columns SQL queries use")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve table and column usage of SQL files against a catalog
    Resolve {
        /// SQL files to resolve (supports glob patterns)
        files: Vec<PathBuf>,

        /// Catalog files: .json/.toml maps, .sql/.ddl schemas, or TABLE,COLUMN rows
        #[arg(short, long = "catalog", value_name = "FILE")]
        catalog: Vec<PathBuf>,

        /// SQL dialect
        #[arg(short, long)]
        dialect: Option<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Where ambiguous unqualified columns are attached
        #[arg(long, value_enum)]
        ambiguity: Option<AmbiguityArg>,

        /// Do not count columns used only in JOIN ... ON/USING predicates
        #[arg(long)]
        exclude_join_columns: bool,

        /// Diagnostic codes to suppress (e.g. W0004)
        #[arg(long, value_name = "CODE")]
        disable: Vec<String>,

        /// Exit with status 1 when any warning remains
        #[arg(long)]
        deny_warnings: bool,

        /// Configuration file (defaults to the nearest sqlusage.toml)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Display the loaded catalog
    Catalog {
        /// Catalog files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Count column references in a SQL file (not checked against a catalog)
    Count {
        /// SQL file
        file: PathBuf,

        /// SQL dialect
        #[arg(short, long, default_value = "oracle")]
        dialect: String,
    },

    /// Dump the token stream of a SQL file (for debugging)
    Tokens {
        /// SQL file to tokenize
        file: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output
    Json,
    /// TableName,ColumnName rows
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum AmbiguityArg {
    FanOut,
    FirstMatch,
    Reject,
}

impl From<AmbiguityArg> for AmbiguityPolicy {
    fn from(arg: AmbiguityArg) -> Self {
        match arg {
            AmbiguityArg::FanOut => AmbiguityPolicy::FanOut,
            AmbiguityArg::FirstMatch => AmbiguityPolicy::FirstMatch,
            AmbiguityArg::Reject => AmbiguityPolicy::Reject,
        }
    }
}

//! Analyzer configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dialect::{KeywordSet, SqlDialect};

/// Where an unqualified column goes when several bound tables define it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Attach the column to every matching table
    #[default]
    FanOut,
    /// Attach the column to the first matching table in binding order
    FirstMatch,
    /// Attach the column to none of them
    Reject,
}

impl FromStr for AmbiguityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "fan-out" | "fanout" | "all" => Ok(Self::FanOut),
            "first-match" | "first" => Ok(Self::FirstMatch),
            "reject" | "none" => Ok(Self::Reject),
            _ => Err(format!("Unknown ambiguity policy: {}", s)),
        }
    }
}

impl fmt::Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FanOut => "fan-out",
            Self::FirstMatch => "first-match",
            Self::Reject => "reject",
        })
    }
}

/// Whether columns referenced in ON/USING predicates count as usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinPredicatePolicy {
    #[default]
    Include,
    Exclude,
}

impl FromStr for JoinPredicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "include" => Ok(Self::Include),
            "exclude" => Ok(Self::Exclude),
            _ => Err(format!("Unknown join predicate policy: {}", s)),
        }
    }
}

impl fmt::Display for JoinPredicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        })
    }
}

/// Settings for one [`Analyzer`](super::Analyzer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub dialect: SqlDialect,
    /// Words never treated as column references
    pub keywords: KeywordSet,
    pub ambiguity: AmbiguityPolicy,
    pub join_predicates: JoinPredicatePolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::for_dialect(SqlDialect::default())
    }
}

impl AnalyzerConfig {
    /// Defaults for `dialect`, including its keyword set
    pub fn for_dialect(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            keywords: dialect.default_keywords(),
            ambiguity: AmbiguityPolicy::default(),
            join_predicates: JoinPredicatePolicy::default(),
        }
    }

    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    pub fn with_join_predicates(mut self, join_predicates: JoinPredicatePolicy) -> Self {
        self.join_predicates = join_predicates;
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordSet) -> Self {
        self.keywords = keywords;
        self
    }
}

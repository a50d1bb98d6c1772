//! SQL dialect support
//!
//! A dialect decides which bare words are never column references (keywords,
//! built-in functions, pseudo-columns) and which table names are pseudo-tables.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Oracle,
    Ansi,
}

/// Words excluded from column extraction in every dialect
const COMMON_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS",
    "NATURAL", "ON", "USING", "AND", "OR", "NOT", "AS", "WITH", "RECURSIVE", "GROUP", "ORDER",
    "BY", "HAVING", "DISTINCT", "ALL", "ANY", "SOME", "UNION", "INTERSECT", "EXCEPT", "CASE",
    "WHEN", "THEN", "ELSE", "END", "IN", "EXISTS", "IS", "NULL", "LIKE", "BETWEEN", "ASC", "DESC",
    "NULLS", "FIRST", "LAST", "INSERT", "UPDATE", "DELETE", "MERGE", "MATCHED", "INTO", "VALUES",
    "SET", "CREATE", "ALTER", "DROP", "TABLE", "VIEW", "INDEX", "DATABASE", "SCHEMA", "OVER",
    "PARTITION", "ROWS", "RANGE", "UNBOUNDED", "PRECEDING", "FOLLOWING", "CURRENT", "ROW",
    "FETCH", "OFFSET", "LIMIT", "ONLY", "NEXT", "TRUE", "FALSE", "INTERVAL", "CAST", "EXTRACT",
    "COUNT", "SUM", "AVG", "MAX", "MIN", "COALESCE", "NULLIF", "UPPER", "LOWER", "TRIM",
    "LENGTH", "REPLACE", "ROUND", "ABS", "MOD", "FLOOR", "CEIL", "ROW_NUMBER", "RANK",
    "DENSE_RANK", "LAG", "LEAD", "CURRENT_DATE", "CURRENT_TIMESTAMP", "DATE", "TIMESTAMP",
    "YEAR", "MONTH", "DAY", "HOUR", "MINUTE", "SECOND",
];

/// Oracle keywords, functions and pseudo-columns
const ORACLE_KEYWORDS: &[&str] = &[
    "MINUS", "CONNECT", "START", "PRIOR", "LEVEL", "NOCYCLE", "ROWNUM", "ROWID", "SYSDATE",
    "SYSTIMESTAMP", "DUAL", "NEXTVAL", "CURRVAL", "DECODE", "NVL", "NVL2", "TO_DATE", "TO_CHAR",
    "TO_NUMBER", "TO_TIMESTAMP", "TRUNC", "SUBSTR", "INSTR", "LTRIM", "RTRIM", "LPAD", "RPAD",
    "ADD_MONTHS", "MONTHS_BETWEEN", "LAST_DAY", "LISTAGG", "WITHIN", "KEEP", "REGEXP_LIKE",
    "REGEXP_SUBSTR", "REGEXP_REPLACE", "PIVOT", "UNPIVOT", "SIBLINGS", "CONNECT_BY_ROOT",
    "SYS_CONNECT_BY_PATH",
];

/// Oracle pseudo-tables: never bound, never reported
const ORACLE_PSEUDO_TABLES: &[&str] = &["DUAL"];

impl SqlDialect {
    /// Default column-exclusion set for this dialect
    pub fn default_keywords(&self) -> KeywordSet {
        let mut set = KeywordSet::from_words(COMMON_KEYWORDS.iter().copied());
        if *self == SqlDialect::Oracle {
            set.extend(ORACLE_KEYWORDS.iter().copied());
        }
        set
    }

    /// Table names that never bind (e.g. `DUAL`)
    pub fn pseudo_tables(&self) -> &'static [&'static str] {
        match self {
            SqlDialect::Oracle => ORACLE_PSEUDO_TABLES,
            SqlDialect::Ansi => &[],
        }
    }

    pub fn is_pseudo_table(&self, name: &str) -> bool {
        self.pseudo_tables()
            .iter()
            .any(|t| t.eq_ignore_ascii_case(name))
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oracle" | "plsql" => Ok(SqlDialect::Oracle),
            "ansi" | "generic" | "standard" => Ok(SqlDialect::Ansi),
            _ => Err(format!(
                "Unknown dialect: '{}'. Supported dialects: oracle, ansi.",
                s
            )),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::Oracle => write!(f, "oracle"),
            SqlDialect::Ansi => write!(f, "ansi"),
        }
    }
}

/// Case-insensitive set of words that are never column references
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordSet {
    words: BTreeSet<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        set.extend(words);
        set
    }

    pub fn insert(&mut self, word: &str) -> bool {
        self.words.insert(word.to_ascii_uppercase())
    }

    pub fn remove(&mut self, word: &str) -> bool {
        self.words.remove(&word.to_ascii_uppercase())
    }

    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            self.insert(word.as_ref());
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_ascii_uppercase())
    }

    /// Iterate in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl From<Vec<String>> for KeywordSet {
    fn from(words: Vec<String>) -> Self {
        Self::from_words(words)
    }
}

impl From<KeywordSet> for Vec<String> {
    fn from(set: KeywordSet) -> Self {
        set.words.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("Oracle".parse::<SqlDialect>(), Ok(SqlDialect::Oracle));
        assert_eq!("generic".parse::<SqlDialect>(), Ok(SqlDialect::Ansi));
        assert!("sqlite".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_oracle_keywords_superset_of_ansi() {
        let oracle = SqlDialect::Oracle.default_keywords();
        let ansi = SqlDialect::Ansi.default_keywords();
        assert!(ansi.iter().all(|w| oracle.contains(w)));
        assert!(oracle.contains("nvl"));
        assert!(!ansi.contains("NVL"));
    }

    #[test]
    fn test_keyword_set_override() {
        let mut set = SqlDialect::Oracle.default_keywords();
        assert!(set.contains("LEVEL"));
        set.remove("level");
        set.insert("my_func");
        assert!(!set.contains("LEVEL"));
        assert!(set.contains("MY_FUNC"));
    }

    #[test]
    fn test_pseudo_tables() {
        assert!(SqlDialect::Oracle.is_pseudo_table("dual"));
        assert!(!SqlDialect::Ansi.is_pseudo_table("dual"));
    }
}

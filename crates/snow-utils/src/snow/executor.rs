//! The SQL executor seam used by every reconciler
//!
//! Reconcilers only see [`SqlExecutor`]. Production code uses
//! [`SnowCli`](super::SnowCli); tests use a recording fake.

use super::error::SqlError;
use serde_json::{Map, Value};
use std::future::Future;

/// One result row, keyed by column name
pub type Row = Map<String, Value>;

/// Whether a non-zero exit is an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Non-zero exit returns [`SqlError::Failed`]
    Strict,
    /// Non-zero exit is logged and treated as an empty result
    Lenient,
}

/// A PAT login attempt used to prove a token works
#[derive(Debug, Clone)]
pub struct LoginCheck<'a> {
    pub user: &'a str,
    pub account: &'a str,
    pub role: &'a str,
    pub token: &'a str,
}

/// Trait for running SQL against Snowflake.
pub trait SqlExecutor: Send + Sync {
    /// Run a single statement and return its rows
    ///
    /// Empty or non-JSON output yields no rows rather than an error.
    fn query(&self, sql: &str, check: Check) -> impl Future<Output = Result<Vec<Row>, SqlError>> + Send;

    /// Run a multi-statement script through standard input
    fn run_script(&self, script: &str, check: Check) -> impl Future<Output = Result<(), SqlError>> + Send;

    /// Account identifier of the active connection, if it can be determined
    fn current_account(&self) -> impl Future<Output = Result<Option<String>, SqlError>> + Send;

    /// Open a throwaway connection with a PAT and run a trivial query
    fn login(&self, login: &LoginCheck<'_>) -> impl Future<Output = Result<(), SqlError>> + Send;
}

/// Parse `snow ... --format json` output into rows
///
/// Returns an empty list for blank output, invalid JSON, or JSON that is not
/// an array of objects. A single object is treated as a one-row result.
pub fn parse_rows(stdout: &str) -> Vec<Row> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Ok(Value::Object(map)) => vec![map],
        _ => Vec::new(),
    }
}

/// Case-insensitive string lookup in a row
///
/// Column names come back upper- or lower-case depending on the statement.
pub fn row_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(column))
        .and_then(|(_, v)| v.as_str())
}

/// Case-insensitive value lookup in a row
pub fn row_value<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(column))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows_array() {
        let rows = parse_rows(r#"[{"name": "A", "n": 1}, {"name": "B", "n": 2}]"#);
        assert_eq!(rows.len(), 2);
        assert_eq!(row_str(&rows[1], "NAME"), Some("B"));
        assert_eq!(row_value(&rows[0], "n"), Some(&Value::from(1)));
    }

    #[test]
    fn test_parse_rows_tolerates_bad_output() {
        assert!(parse_rows("").is_empty());
        assert!(parse_rows("   \n").is_empty());
        assert!(parse_rows("not json").is_empty());
        assert!(parse_rows("[1, 2, 3]").is_empty());
    }

    #[test]
    fn test_parse_rows_single_object() {
        let rows = parse_rows(r#"{"Account": "ORG-ACCT"}"#);
        assert_eq!(rows.len(), 1);
        assert_eq!(row_str(&rows[0], "account"), Some("ORG-ACCT"));
    }
}

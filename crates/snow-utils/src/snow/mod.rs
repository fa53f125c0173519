//! Snowflake access through the `snow` CLI

pub mod cli;
pub mod dry_run;
pub mod error;
pub mod executor;

pub use cli::SnowCli;
pub use dry_run::DryRunExecutor;
pub use error::SqlError;
pub use executor::{Check, LoginCheck, Row, SqlExecutor, parse_rows, row_str, row_value};

/// Quote a string literal for SQL, doubling embedded single quotes
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a parenthesised list of quoted literals
pub fn quote_list<S: AsRef<str>>(values: &[S]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| quote(v.as_ref())).collect();
    format!("({})", quoted.join(", "))
}

//! Relational store access through stored procedures
//!
//! The ETL core only knows the [`StoreGateway`] trait: call a named procedure
//! with positional arguments, then commit or roll back. [`MySqlStore`] is the
//! production implementation.

mod mysql;

use anyhow::{Result, bail};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

pub use mysql::MySqlStore;

/// Positional procedure argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Null,
    Text(String),
    Int(i64),
}

/// One result set returned by a procedure call; cells are `None` for SQL NULL
pub type ResultSet = Vec<Vec<Option<String>>>;

/// Stored-procedure capability with explicit per-call transaction control
#[async_trait]
pub trait StoreGateway: Send {
    /// Invoke `name` with positional `params`, opening a transaction if none
    /// is active. Returns every result set the procedure produced.
    async fn call_procedure(&mut self, name: &str, params: &[Param]) -> Result<Vec<ResultSet>>;

    /// Commit the active transaction; no-op when none is open
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the active transaction; no-op when none is open
    async fn rollback(&mut self) -> Result<()>;

    /// Release the connection
    async fn close(&mut self) -> Result<()>;
}

static PROCEDURE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$")
        .expect("procedure name pattern is valid")
});

/// Procedure names are spliced into the `CALL` text, so only plain
/// (optionally schema-qualified) identifiers are accepted
pub fn validate_procedure_name(name: &str) -> Result<()> {
    if !PROCEDURE_NAME.is_match(name) {
        bail!("Invalid stored procedure name: '{}'", name);
    }
    Ok(())
}

/// `CALL name(?, ?, ...)` with one placeholder per argument
pub fn call_statement(name: &str, arg_count: usize) -> String {
    let placeholders = vec!["?"; arg_count].join(", ");
    format!("CALL {}({})", name, placeholders)
}

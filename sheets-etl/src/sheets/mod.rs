//! Google Sheets access
//!
//! The ETL core reads and appends cell ranges through [`SpreadsheetGateway`].
//! [`SheetsClient`] implements it against the Sheets v4 REST API.

mod auth;
mod client;

use anyhow::Result;
use async_trait::async_trait;

pub use auth::GoogleAuth;
pub use client::SheetsClient;

/// Rectangular cell-range capability. Rows may be ragged.
#[async_trait]
pub trait SpreadsheetGateway: Send + Sync {
    /// Read `range` from `document_id`. An empty range yields no rows.
    async fn read(&self, document_id: &str, range: &str) -> Result<Vec<Vec<String>>>;

    /// Append `rows` after the existing content of `range`
    async fn append(&self, document_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()>;
}

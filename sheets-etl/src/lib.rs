//! Periodic job moving form responses from Google Sheets into a relational
//! store.
//!
//! Each run reads the travel, building and incident source ranges, pads and
//! normalizes every row against the form's column schema, gives it a fresh
//! identity, and submits it either to a stored procedure or to a destination
//! sheet. Rows are committed one at a time; a failing row is rolled back and
//! logged without affecting the rest of the batch.

pub mod cli;
pub mod config;
pub mod etl;
pub mod sheets;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

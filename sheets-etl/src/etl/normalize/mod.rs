//! Cell-level normalization: row padding, field extraction, dates

mod date;
mod row;

pub use date::{CANONICAL_DATE_FORMAT, normalize_date};
pub use row::{ColumnIndex, NormalizedRow, normalize_row};

//! Row padding and header-based field extraction

use crate::etl::forms::FieldSpec;

/// A data row padded to at least the header's width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    cells: Vec<String>,
}

impl NormalizedRow {
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every cell is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(|s| s.as_str())
    }

    /// Value of the column named `field_name`, or `default` if the header
    /// has no such column. One-off form of [`ColumnIndex::values`].
    pub fn extract(
        &self,
        header: &[String],
        field_name: &str,
        default: Option<&str>,
    ) -> Option<String> {
        let position = header.iter().position(|h| h == field_name);
        self.extract_at(position, default.map(str::to_string))
    }

    /// Value at an already resolved column position; `None` means the
    /// header had no such column and `default` is returned
    pub fn extract_at(&self, position: Option<usize>, default: Option<String>) -> Option<String> {
        match position {
            Some(idx) => self.get(idx).map(str::to_string),
            None => default,
        }
    }
}

/// Pad `row` with empty cells up to `header.len()`. Longer rows are kept whole.
pub fn normalize_row(header: &[String], row: &[String]) -> NormalizedRow {
    let mut cells = row.to_vec();
    if cells.len() < header.len() {
        cells.resize(header.len(), String::new());
    }
    NormalizedRow { cells }
}

/// Column positions of a form's recognized fields, resolved once per header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    fields: &'static [FieldSpec],
    positions: Vec<Option<usize>>,
}

impl ColumnIndex {
    /// Resolve each field against the header. Duplicate column names
    /// resolve to the first occurrence.
    pub fn build(header: &[String], fields: &'static [FieldSpec]) -> Self {
        let positions = fields
            .iter()
            .map(|f| header.iter().position(|h| h == f.name))
            .collect();
        ColumnIndex { fields, positions }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn position(&self, field_name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == field_name)
            .and_then(|i| self.positions[i])
    }

    /// Recognized fields with no matching column
    pub fn missing(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .zip(&self.positions)
            .filter(|(_, pos)| pos.is_none())
            .map(|(f, _)| f.name)
            .collect()
    }

    /// Raw values for every recognized field, in schema order. Absent
    /// columns yield the field's default.
    pub fn values(&self, row: &NormalizedRow) -> Vec<Option<String>> {
        self.fields
            .iter()
            .zip(&self.positions)
            .map(|(field, pos)| row.extract_at(*pos, field.default_value()))
            .collect()
    }

    /// Cells no recognized field maps to, in sheet order. Includes cells
    /// past the end of the header.
    pub fn unmapped(&self, row: &NormalizedRow) -> Vec<String> {
        row.cells()
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.positions.contains(&Some(*idx)))
            .map(|(_, cell)| cell.clone())
            .collect()
    }
}

//! Form kinds, their recognized columns, and the records built from them

use uuid::Uuid;

use crate::store::Param;

/// How a recognized column is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, `""` when the column is missing
    Text,
    /// Date normalized to `YYYY-MM-DD`, null when missing or unparseable
    Date,
    /// Optional identifier, null when the column is missing
    OptionalId,
}

/// A recognized column of a form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Exact header text
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn text(name: &'static str) -> Self {
        FieldSpec { name, kind: FieldKind::Text }
    }

    const fn date(name: &'static str) -> Self {
        FieldSpec { name, kind: FieldKind::Date }
    }

    const fn optional_id(name: &'static str) -> Self {
        FieldSpec { name, kind: FieldKind::OptionalId }
    }

    /// Value used when the header has no column for this field
    pub fn default_value(&self) -> Option<String> {
        match self.kind {
            FieldKind::Text | FieldKind::Date => Some(String::new()),
            FieldKind::OptionalId => None,
        }
    }
}

const TRAVEL_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("Name"),
    FieldSpec::text("Email"),
    FieldSpec::text("Department"),
    FieldSpec::text("Destination"),
    FieldSpec::date("Start Date"),
    FieldSpec::date("End Date"),
    FieldSpec::text("Purpose"),
];

const BUILDING_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("Building Name"),
    FieldSpec::text("Address"),
    FieldSpec::text("Total Rooms"),
];

const INCIDENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::optional_id("CSA ID"),
    FieldSpec::text("Incident Type"),
    FieldSpec::text("Location"),
];

/// Kind of submitted form. Each kind has its own source, schema and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    Travel,
    Building,
    Incident,
}

impl FormKind {
    /// Processing order for a batch run
    pub const ALL: [FormKind; 3] = [FormKind::Travel, FormKind::Building, FormKind::Incident];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::Travel => "travel",
            FormKind::Building => "building",
            FormKind::Incident => "incident",
        }
    }

    /// Recognized columns, in the order they are submitted
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            FormKind::Travel => TRAVEL_FIELDS,
            FormKind::Building => BUILDING_FIELDS,
            FormKind::Incident => INCIDENT_FIELDS,
        }
    }

    /// Fields used to name a record in log lines, first non-empty wins
    fn label_fields(&self) -> &'static [&'static str] {
        match self {
            FormKind::Travel => &["Name"],
            FormKind::Building => &["Building Name"],
            FormKind::Incident => &["CSA ID", "Incident Type"],
        }
    }
}

impl std::fmt::Display for FormKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized form response, ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct FormRecord {
    /// Fresh per processing pass, never derived from row content
    pub id: Uuid,
    pub kind: FormKind,
    pub source_sheet_id: String,
    pub source_range: String,
    /// 1-based position among data rows, header excluded
    pub row_number: usize,
    /// Field values in `kind.fields()` order; `None` is null
    pub values: Vec<Option<String>>,
    /// Source cells outside the recognized columns, in sheet order
    pub extra_cells: Vec<String>,
}

impl FormRecord {
    /// Value of a recognized field by column name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.kind
            .fields()
            .iter()
            .position(|f| f.name == name)
            .and_then(|i| self.values.get(i))
            .and_then(|v| v.as_deref())
    }

    /// Human-readable name for log lines
    pub fn label(&self) -> String {
        self.kind
            .label_fields()
            .iter()
            .filter_map(|name| self.field(name))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("row {}", self.row_number))
    }

    /// Positional procedure arguments: identity, provenance, then fields
    pub fn procedure_params(&self) -> Vec<Param> {
        let mut params = Vec::with_capacity(4 + self.values.len());
        params.push(Param::Text(self.id.to_string()));
        params.push(Param::Text(self.source_sheet_id.clone()));
        params.push(Param::Text(self.source_range.clone()));
        params.push(Param::Int(self.row_number as i64));
        params.extend(self.values.iter().map(|v| match v {
            Some(s) => Param::Text(s.clone()),
            None => Param::Null,
        }));
        params
    }

    /// Destination sheet row: `procedure_params` order with nulls blank,
    /// followed by every unrecognized source cell so no column is lost
    pub fn sheet_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(4 + self.values.len() + self.extra_cells.len());
        row.push(self.id.to_string());
        row.push(self.source_sheet_id.clone());
        row.push(self.source_range.clone());
        row.push(self.row_number.to_string());
        row.extend(self.values.iter().map(|v| v.clone().unwrap_or_default()));
        row.extend(self.extra_cells.iter().cloned());
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(values: Vec<Option<&str>>) -> FormRecord {
        FormRecord {
            id: Uuid::new_v4(),
            kind: FormKind::Incident,
            source_sheet_id: "doc-1".to_string(),
            source_range: "Responses!A1:C".to_string(),
            row_number: 4,
            values: values.into_iter().map(|v| v.map(str::to_string)).collect(),
            extra_cells: Vec::new(),
        }
    }

    #[test]
    fn test_schemas() {
        let names: Vec<_> = FormKind::Travel.fields().iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec!["Name", "Email", "Department", "Destination", "Start Date", "End Date", "Purpose"]
        );
        assert_eq!(FormKind::Building.fields().len(), 3);
        assert_eq!(FormKind::Incident.fields()[0].kind, FieldKind::OptionalId);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(FieldSpec::text("x").default_value(), Some(String::new()));
        assert_eq!(FieldSpec::date("x").default_value(), Some(String::new()));
        assert_eq!(FieldSpec::optional_id("x").default_value(), None);
    }

    #[test]
    fn test_label_falls_back() {
        assert_eq!(incident(vec![Some("CSA-9"), Some("Fire"), Some("Lobby")]).label(), "CSA-9");
        assert_eq!(incident(vec![None, Some("Fire"), Some("Lobby")]).label(), "Fire");
        assert_eq!(incident(vec![Some(" "), Some(""), Some("Lobby")]).label(), "row 4");
    }

    #[test]
    fn test_procedure_params_carry_provenance() {
        let record = incident(vec![None, Some("Fire"), Some("Lobby")]);
        let params = record.procedure_params();

        assert_eq!(params.len(), 7);
        assert_eq!(params[0], Param::Text(record.id.to_string()));
        assert_eq!(params[1], Param::Text("doc-1".to_string()));
        assert_eq!(params[2], Param::Text("Responses!A1:C".to_string()));
        assert_eq!(params[3], Param::Int(4));
        assert_eq!(params[4], Param::Null);
        assert_eq!(params[5], Param::Text("Fire".to_string()));
    }

    #[test]
    fn test_sheet_row_blanks_nulls() {
        let record = incident(vec![None, Some("Fire"), Some("Lobby")]);
        let row = record.sheet_row();
        assert_eq!(row.len(), 7);
        assert_eq!(row[3], "4");
        assert_eq!(&row[4..], &["".to_string(), "Fire".to_string(), "Lobby".to_string()]);
    }

    #[test]
    fn test_sheet_row_keeps_extra_cells_last() {
        let mut record = incident(vec![Some("CSA-1"), Some("Fire"), Some("Lobby")]);
        record.extra_cells = vec!["9/1/2024 10:00".to_string(), "smoke seen".to_string()];

        let row = record.sheet_row();
        assert_eq!(row.len(), 9);
        assert_eq!(&row[4..7], &["CSA-1".to_string(), "Fire".to_string(), "Lobby".to_string()]);
        assert_eq!(&row[7..], &["9/1/2024 10:00".to_string(), "smoke seen".to_string()]);
        // Procedure arguments stay fixed-width
        assert_eq!(record.procedure_params().len(), 7);
    }

    #[test]
    fn test_kind_names_in_processing_order() {
        let names: Vec<String> = FormKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["travel", "building", "incident"]);
    }
}

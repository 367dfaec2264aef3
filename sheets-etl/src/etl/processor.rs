//! Per-form processing: read, normalize, submit, one row at a time
//!
//! Every data row ends in exactly one [`RowOutcome`]. A failing row is rolled
//! back and recorded; it never stops the rows after it.

use uuid::Uuid;

use super::forms::{FieldKind, FormKind, FormRecord};
use super::normalize::{ColumnIndex, NormalizedRow, normalize_date, normalize_row};
use crate::config::{Destination, FormConfig, FormTarget};
use crate::sheets::SpreadsheetGateway;
use crate::store::StoreGateway;

/// Why a single row was not committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// Step that failed, e.g. `procedure sp_insert_travel`
    pub context: String,
    pub message: String,
}

impl RowFailure {
    fn new(context: impl Into<String>, error: &anyhow::Error) -> Self {
        RowFailure {
            context: context.into(),
            message: format!("{:#}", error),
        }
    }
}

impl std::fmt::Display for RowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.message)
    }
}

/// Result of processing one data row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Submitted and committed
    Committed { record_id: Uuid, label: String },
    /// Built but not submitted (dry run)
    DryRun(FormRecord),
    /// Every cell blank; nothing submitted
    Skipped,
    /// Rolled back
    Failed(RowFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowResult {
    /// 1-based position among data rows
    pub row_number: usize,
    pub outcome: RowOutcome,
}

/// How a form kind's run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Every data row was attempted
    Completed,
    /// Source range empty or header-only
    NoData,
    /// Required configuration missing; nothing was read
    Misconfigured(String),
    /// Source range could not be read
    ReadFailed(String),
    /// Processing panicked part way through
    Aborted(String),
}

/// Outcome of one form kind's run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub kind: FormKind,
    pub status: ProcessStatus,
    pub rows: Vec<RowResult>,
}

impl ProcessReport {
    fn new(kind: FormKind, status: ProcessStatus) -> Self {
        ProcessReport {
            kind,
            status,
            rows: Vec::new(),
        }
    }

    pub fn aborted(kind: FormKind, message: impl Into<String>) -> Self {
        Self::new(kind, ProcessStatus::Aborted(message.into()))
    }

    fn count(&self, pred: impl Fn(&RowOutcome) -> bool) -> usize {
        self.rows.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn committed_count(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Committed { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Failed(_)))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Skipped))
    }

    pub fn dry_run_count(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::DryRun(_)))
    }

    /// Identities of committed records, in row order
    pub fn committed_ids(&self) -> Vec<Uuid> {
        self.rows
            .iter()
            .filter_map(|r| match &r.outcome {
                RowOutcome::Committed { record_id, .. } => Some(*record_id),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Normalize and log rows without submitting them
    pub dry_run: bool,
}

/// Moves one form kind's source rows into its destination
pub struct FormProcessor<'a> {
    kind: FormKind,
    config: &'a FormConfig,
    options: ProcessOptions,
}

impl<'a> FormProcessor<'a> {
    pub fn new(kind: FormKind, config: &'a FormConfig, options: ProcessOptions) -> Self {
        FormProcessor {
            kind,
            config,
            options,
        }
    }

    /// Process every data row of the configured source range.
    ///
    /// Rows whose cells are all blank are reported as [`RowOutcome::Skipped`]
    /// and never submitted; they still count towards row positions.
    pub async fn run<S>(
        &self,
        sheets: &dyn SpreadsheetGateway,
        mut store: Option<&mut S>,
    ) -> ProcessReport
    where
        S: StoreGateway + ?Sized,
    {
        let kind = self.kind;

        let target = match self.config.target() {
            Ok(target) => target,
            Err(e) => {
                log::error!("Skipping {} forms, configuration incomplete: {:#}", kind, e);
                return ProcessReport::new(kind, ProcessStatus::Misconfigured(format!("{:#}", e)));
            }
        };

        if matches!(target.destination, Destination::Procedure(_))
            && store.is_none()
            && !self.options.dry_run
        {
            log::error!("Skipping {} forms, no store connection for {}", kind, target.destination);
            return ProcessReport::new(
                kind,
                ProcessStatus::Misconfigured("no store connection".to_string()),
            );
        }

        let rows = match sheets
            .read(&target.source_sheet_id, &target.source_range)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Error reading {} data: {:#}", kind, e);
                return ProcessReport::new(kind, ProcessStatus::ReadFailed(format!("{:#}", e)));
            }
        };

        let (header, data) = match rows.split_first() {
            Some((header, data)) if !data.is_empty() => (header, data),
            _ => {
                log::info!("No {} data to process", kind);
                return ProcessReport::new(kind, ProcessStatus::NoData);
            }
        };

        let index = ColumnIndex::build(header, kind.fields());
        let missing = index.missing();
        if !missing.is_empty() {
            log::info!(
                "{} source has no column for {}; defaults will be used",
                kind,
                missing.join(", ")
            );
        }

        let mut report = ProcessReport::new(kind, ProcessStatus::Completed);
        for (i, raw) in data.iter().enumerate() {
            let row_number = i + 1;
            let row = normalize_row(header, raw);
            let outcome = self
                .process_row(&target, &index, &row, row_number, sheets, store.as_deref_mut())
                .await;
            report.rows.push(RowResult { row_number, outcome });
        }

        if self.options.dry_run {
            log::info!("Dry run: built {} {} records", report.dry_run_count(), kind);
        } else {
            log::info!(
                "Processed {} {} records: {} committed, {} failed, {} skipped",
                report.rows.len(),
                kind,
                report.committed_count(),
                report.failed_count(),
                report.skipped_count()
            );
        }

        report
    }

    async fn process_row<S>(
        &self,
        target: &FormTarget,
        index: &ColumnIndex,
        row: &NormalizedRow,
        row_number: usize,
        sheets: &dyn SpreadsheetGateway,
        store: Option<&mut S>,
    ) -> RowOutcome
    where
        S: StoreGateway + ?Sized,
    {
        if row.is_blank() {
            log::debug!("Skipping blank {} row {}", self.kind, row_number);
            return RowOutcome::Skipped;
        }

        let record = build_record(self.kind, target, index, row, row_number);
        let label = record.label();

        if self.options.dry_run {
            log::info!(
                "[dry run] {} row {} ({}) -> {:?}",
                self.kind,
                row_number,
                label,
                record.sheet_row()
            );
            return RowOutcome::DryRun(record);
        }

        match submit(&target.destination, &record, sheets, store).await {
            Ok(()) => {
                log::info!(
                    "Committed {} record for {} (row {}, id {})",
                    self.kind,
                    label,
                    row_number,
                    record.id
                );
                RowOutcome::Committed {
                    record_id: record.id,
                    label,
                }
            }
            Err(failure) => {
                log::error!(
                    "Error processing {} row {} ({}): {}",
                    self.kind,
                    row_number,
                    label,
                    failure
                );
                RowOutcome::Failed(failure)
            }
        }
    }
}

/// Extract the recognized fields of `row`, normalize its dates, and give it
/// a fresh identity
pub fn build_record(
    kind: FormKind,
    target: &FormTarget,
    index: &ColumnIndex,
    row: &NormalizedRow,
    row_number: usize,
) -> FormRecord {
    let values = kind
        .fields()
        .iter()
        .zip(index.values(row))
        .map(|(field, value)| match field.kind {
            FieldKind::Date => {
                let raw = value.unwrap_or_default();
                let date = normalize_date(&raw);
                if date.is_none() && !raw.trim().is_empty() {
                    log::info!(
                        "Unrecognized date '{}' in {} row {} field '{}'; stored as null",
                        raw,
                        kind,
                        row_number,
                        field.name
                    );
                }
                date
            }
            FieldKind::Text | FieldKind::OptionalId => value,
        })
        .collect();

    FormRecord {
        id: Uuid::new_v4(),
        kind,
        source_sheet_id: target.source_sheet_id.clone(),
        source_range: target.source_range.clone(),
        row_number,
        values,
        extra_cells: index.unmapped(row),
    }
}

/// Write one record and settle its transaction
async fn submit<S>(
    destination: &Destination,
    record: &FormRecord,
    sheets: &dyn SpreadsheetGateway,
    store: Option<&mut S>,
) -> Result<(), RowFailure>
where
    S: StoreGateway + ?Sized,
{
    match destination {
        Destination::Procedure(name) => {
            let store = match store {
                Some(store) => store,
                None => {
                    return Err(RowFailure::new(
                        format!("procedure {}", name),
                        &anyhow::anyhow!("no store connection"),
                    ));
                }
            };

            let params = record.procedure_params();
            match store.call_procedure(name, &params).await {
                Ok(result_sets) => {
                    if !result_sets.is_empty() {
                        log::debug!(
                            "Procedure {} returned {:?} for row {}",
                            name,
                            result_sets,
                            record.row_number
                        );
                    }
                }
                Err(e) => {
                    rollback(&mut *store).await;
                    return Err(RowFailure::new(format!("procedure {}", name), &e));
                }
            }

            if let Err(e) = store.commit().await {
                rollback(&mut *store).await;
                return Err(RowFailure::new("commit", &e));
            }
            Ok(())
        }
        Destination::Sheet { sheet_id, range } => sheets
            .append(sheet_id, range, &[record.sheet_row()])
            .await
            .map_err(|e| RowFailure::new(format!("append to {} in {}", range, sheet_id), &e)),
    }
}

async fn rollback<S>(store: &mut S)
where
    S: StoreGateway + ?Sized,
{
    if let Err(e) = store.rollback().await {
        log::warn!("Rollback failed: {:#}", e);
    }
}

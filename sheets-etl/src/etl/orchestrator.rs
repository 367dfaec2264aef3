//! Batch run over every form kind

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use uuid::Uuid;

use super::forms::FormKind;
use super::processor::{FormProcessor, ProcessOptions, ProcessReport, ProcessStatus};
use crate::config::Config;
use crate::sheets::SpreadsheetGateway;
use crate::store::StoreGateway;

/// Reports of every form kind in processing order
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub reports: Vec<ProcessReport>,
}

impl BatchReport {
    pub fn report(&self, kind: FormKind) -> Option<&ProcessReport> {
        self.reports.iter().find(|r| r.kind == kind)
    }

    pub fn committed_count(&self) -> usize {
        self.reports.iter().map(|r| r.committed_count()).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.reports.iter().map(|r| r.failed_count()).sum()
    }

    /// Form kinds that did not complete
    pub fn incomplete_kinds(&self) -> Vec<FormKind> {
        self.reports
            .iter()
            .filter(|r| {
                !matches!(r.status, ProcessStatus::Completed | ProcessStatus::NoData)
            })
            .map(|r| r.kind)
            .collect()
    }

    pub fn committed_ids(&self) -> Vec<Uuid> {
        self.reports.iter().flat_map(|r| r.committed_ids()).collect()
    }
}

/// Runs travel, building and incident processing in order, then releases
/// the store. Consumed by [`BatchOrchestrator::run`], so the store is closed
/// exactly once.
pub struct BatchOrchestrator<'a> {
    config: &'a Config,
    sheets: &'a dyn SpreadsheetGateway,
    store: Option<Box<dyn StoreGateway>>,
    options: ProcessOptions,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        config: &'a Config,
        sheets: &'a dyn SpreadsheetGateway,
        store: Option<Box<dyn StoreGateway>>,
    ) -> Self {
        BatchOrchestrator {
            config,
            sheets,
            store,
            options: ProcessOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run(mut self) -> BatchReport {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(FormKind::ALL.len());

        for kind in FormKind::ALL {
            let processor = FormProcessor::new(kind, self.config.forms.get(kind), self.options);
            let run = processor.run(self.sheets, self.store.as_deref_mut());

            let report = match AssertUnwindSafe(run).catch_unwind().await {
                Ok(report) => report,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    log::error!("Error processing {} data: {}", kind, message);
                    // A panic may leave a row's transaction open
                    if let Some(store) = self.store.as_deref_mut() {
                        if let Err(e) = store.rollback().await {
                            log::warn!("Rollback after {} failure failed: {:#}", kind, e);
                        }
                    }
                    ProcessReport::aborted(kind, message)
                }
            };
            reports.push(report);
        }

        if let Some(mut store) = self.store.take() {
            if let Err(e) = store.close().await {
                log::warn!("Failed to close store connection: {:#}", e);
            }
        }

        let report = BatchReport { reports };
        log::info!(
            "Completed processing all data in {:.1}s: {} committed, {} failed rows",
            started.elapsed().as_secs_f64(),
            report.committed_count(),
            report.failed_count()
        );
        let incomplete = report.incomplete_kinds();
        if !incomplete.is_empty() {
            let kinds: Vec<_> = incomplete.iter().map(|k| k.as_str()).collect();
            log::warn!("Form kinds not processed: {}", kinds.join(", "));
        }

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

//! Extract-transform-load pipeline for submitted forms

pub mod forms;
pub mod normalize;
pub mod orchestrator;
pub mod processor;

pub use forms::{FieldKind, FieldSpec, FormKind, FormRecord};
pub use orchestrator::{BatchOrchestrator, BatchReport};
pub use processor::{
    FormProcessor, ProcessOptions, ProcessReport, ProcessStatus, RowFailure, RowOutcome, RowResult,
};

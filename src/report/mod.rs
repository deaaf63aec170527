//! Findings sinks. These subscribe to the job event stream and persist
//! machine-readable records; rendering for humans happens elsewhere.

pub mod csv;
pub mod jsonl;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::events::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Jsonl,
    Csv,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Provenance fields stamped onto every record.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub run_id: String,
    pub tool_version: String,
    pub config_hash: String,
    pub source_path: String,
    pub source_sha256: String,
}

pub fn build_reporter(
    format: ReportFormat,
    ctx: ReportContext,
    run_output_dir: &Path,
) -> Result<Arc<dyn EventSink>, ReportError> {
    let report_dir = run_output_dir.join("report");
    std::fs::create_dir_all(&report_dir)?;
    match format {
        ReportFormat::Jsonl => Ok(Arc::new(jsonl::JsonlReporter::new(ctx, &report_dir)?)),
        ReportFormat::Csv => Ok(Arc::new(csv::CsvReporter::new(ctx, &report_dir)?)),
    }
}

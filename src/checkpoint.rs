use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scan::OpenCarve;

/// Persisted scan progress. Geometry fields let a resume detect that it is
/// being pointed at a different source or chunk size before any scanning
/// happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCheckpoint {
    pub run_id: String,
    pub chunk_size: u64,
    pub source_len: u64,
    /// First offset not yet scanned; resumption starts exactly here.
    pub next_offset: u64,
    pub artifacts_emitted: u64,
    pub open_carves: Vec<OpenCarve>,
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("checkpoint {path} is corrupt ({detail}); restart without --resume")]
    Corrupt { path: String, detail: String },
    #[error("checkpoint does not match this job: {0}")]
    Mismatch(String),
}

/// Write the checkpoint atomically: serialize to a sibling temp file, then
/// rename over the target. A crash mid-write leaves the previous checkpoint
/// intact.
pub fn save_checkpoint(path: &Path, state: &JobCheckpoint) -> Result<(), CheckpointError> {
    let json = serde_json::to_vec_pretty(state)?;
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "checkpoint".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_checkpoint(path: &Path) -> Result<JobCheckpoint, CheckpointError> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupt {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}

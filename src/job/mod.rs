//! Job controller: drives one pass of the chunk reader across every
//! interested scanner, owns all scan state, persists checkpoints, and
//! coordinates resumption and cancellation.

mod workers;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::bounded;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::checkpoint::{self, CheckpointError, JobCheckpoint};
use crate::chunk::ChunkReader;
use crate::config::ConfigError;
use crate::evidence::{EvidenceError, EvidenceSource};
use crate::events::{EventSink, JobEvent};
use crate::extract::Extractor;
use crate::ioc::IocMatcher;
use crate::registry::SignatureRegistry;
use crate::scan::CarveScanner;
use crate::strings::{StringEncoding, StringScanner};

const CHANNEL_CAPACITY_MULTIPLIER: usize = 4;
const MIN_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Init,
    Scanning,
    Finalizing,
    Done,
    Failed,
}

/// Final counts, reported even on partial completion.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub run_id: String,
    pub state: JobState,
    pub bytes_scanned: u64,
    pub chunks_processed: u64,
    pub artifacts_found: u64,
    pub artifacts_validated: u64,
    pub artifacts_truncated: u64,
    pub strings_found: u64,
    pub iocs_found: u64,
    pub extract_errors: u64,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("evidence error: {0}")]
    Evidence(#[from] EvidenceError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker channel closed unexpectedly")]
    ChannelClosed,
}

#[derive(Debug, Clone)]
pub struct StringOptions {
    pub encoding: StringEncoding,
    pub min_len: usize,
    pub max_len: usize,
}

#[derive(Debug, Clone)]
pub struct JobOptions {
    pub workers: usize,
    pub chunk_size: u64,
    pub strings: Option<StringOptions>,
    pub checkpoint: Option<PathBuf>,
    pub resume: bool,
}

#[derive(Default)]
pub(crate) struct JobCounters {
    pub artifacts_found: AtomicU64,
    pub artifacts_validated: AtomicU64,
    pub artifacts_truncated: AtomicU64,
    pub strings_found: AtomicU64,
    pub iocs_found: AtomicU64,
    pub extract_errors: AtomicU64,
}

pub struct JobController {
    registry: Arc<SignatureRegistry>,
    evidence: Arc<dyn EvidenceSource>,
    run_id: String,
    carve_root: PathBuf,
    options: JobOptions,
    sinks: Vec<Arc<dyn EventSink>>,
    cancel: Arc<AtomicBool>,
    state: JobState,
}

impl JobController {
    pub fn new(
        registry: Arc<SignatureRegistry>,
        evidence: Arc<dyn EvidenceSource>,
        run_id: String,
        carve_root: PathBuf,
        options: JobOptions,
        sinks: Vec<Arc<dyn EventSink>>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            registry,
            evidence,
            run_id,
            carve_root,
            options,
            sinks,
            cancel,
            state: JobState::Init,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run the job to completion, cancellation, or failure. On failure the
    /// last per-chunk checkpoint stays on disk; on success it is removed.
    pub fn run(mut self) -> Result<JobSummary, JobError> {
        let total = self.evidence.len();
        let (resume_offset, mut scanner, emitted_base) = self.init_scan_state(total)?;

        let channel_cap = self
            .options
            .workers
            .saturating_mul(CHANNEL_CAPACITY_MULTIPLIER)
            .max(MIN_CHANNEL_CAPACITY);
        let (extract_tx, extract_rx) = bounded(channel_cap);
        let (event_tx, event_rx) = bounded::<JobEvent>(channel_cap * 2);
        let counters = Arc::new(JobCounters::default());

        let event_handle = workers::spawn_event_thread(self.sinks.clone(), event_rx);
        let extractor = Arc::new(Extractor::new(
            self.registry.clone(),
            self.evidence.clone(),
            self.run_id.clone(),
            self.carve_root.clone(),
        ));
        let extract_handles = workers::spawn_extract_workers(
            self.options.workers,
            extractor,
            extract_rx,
            event_tx.clone(),
            counters.clone(),
        );

        let (string_tx, string_handle) = match &self.options.strings {
            Some(opts) => {
                let (tx, rx) = bounded::<Arc<crate::chunk::Chunk>>(channel_cap);
                let scanner = StringScanner::new(opts.encoding, opts.min_len, opts.max_len);
                let handle = workers::spawn_string_lane(
                    scanner,
                    IocMatcher::new(),
                    rx,
                    event_tx.clone(),
                    counters.clone(),
                );
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        self.transition(JobState::Scanning);
        let mut reader = ChunkReader::resume_at(
            self.evidence.as_ref(),
            self.options.chunk_size,
            self.registry.carry_len(),
            resume_offset,
        );

        let mut emitted = emitted_base;
        let mut bytes_scanned = resume_offset;
        let mut chunks_processed = 0u64;
        let mut cancelled = false;
        let mut scan_err: Option<JobError> = None;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            let chunk = match reader.next_chunk() {
                Ok(Some(chunk)) => Arc::new(chunk),
                Ok(None) => break,
                Err(err) => {
                    scan_err = Some(err.into());
                    break;
                }
            };

            let records = scanner.scan_chunk(&chunk);
            let mut send_failed = false;
            for record in records {
                emitted += 1;
                if extract_tx.send(record).is_err() {
                    send_failed = true;
                    break;
                }
            }
            if !send_failed {
                if let Some(tx) = &string_tx {
                    if tx.send(Arc::clone(&chunk)).is_err() {
                        send_failed = true;
                    }
                }
            }
            if send_failed {
                scan_err = Some(JobError::ChannelClosed);
                break;
            }

            bytes_scanned = chunk.primary_end();
            chunks_processed += 1;

            if let Some(path) = &self.options.checkpoint {
                let state = JobCheckpoint {
                    run_id: self.run_id.clone(),
                    chunk_size: self.options.chunk_size,
                    source_len: total,
                    next_offset: bytes_scanned,
                    artifacts_emitted: emitted,
                    open_carves: scanner.open_state(),
                };
                if let Err(err) = checkpoint::save_checkpoint(path, &state) {
                    scan_err = Some(err.into());
                    break;
                }
            }

            if event_tx
                .send(JobEvent::ChunkProcessed {
                    offset: bytes_scanned,
                    total,
                })
                .is_err()
            {
                scan_err = Some(JobError::ChannelClosed);
                break;
            }
        }

        if scan_err.is_none() && !cancelled {
            self.transition(JobState::Finalizing);
            for record in scanner.finish(total) {
                emitted += 1;
                if extract_tx.send(record).is_err() {
                    scan_err = Some(JobError::ChannelClosed);
                    break;
                }
            }
            info!("scan complete: {emitted} carve records emitted");
        }

        drop(extract_tx);
        drop(string_tx);
        for handle in extract_handles {
            let _ = handle.join();
        }
        if let Some(handle) = string_handle {
            let _ = handle.join();
        }

        let final_state = if cancelled || scan_err.is_some() {
            JobState::Failed
        } else {
            JobState::Done
        };
        let summary = JobSummary {
            run_id: self.run_id.clone(),
            state: final_state,
            bytes_scanned,
            chunks_processed,
            artifacts_found: counters.artifacts_found.load(Ordering::Relaxed),
            artifacts_validated: counters.artifacts_validated.load(Ordering::Relaxed),
            artifacts_truncated: counters.artifacts_truncated.load(Ordering::Relaxed),
            strings_found: counters.strings_found.load(Ordering::Relaxed),
            iocs_found: counters.iocs_found.load(Ordering::Relaxed),
            extract_errors: counters.extract_errors.load(Ordering::Relaxed),
        };
        if event_tx.send(JobEvent::JobDone(summary.clone())).is_err() {
            warn!("event channel closed before job summary");
        }
        drop(event_tx);
        let _ = event_handle.join();

        if let Some(err) = scan_err {
            self.transition(JobState::Failed);
            return Err(err);
        }
        if cancelled {
            info!("cancellation requested; checkpoint preserved for resume");
            self.transition(JobState::Failed);
            return Ok(summary);
        }

        if let Some(path) = &self.options.checkpoint {
            // completed runs have nothing to resume
            let _ = std::fs::remove_file(path);
        }
        self.transition(JobState::Done);
        Ok(summary)
    }

    fn transition(&mut self, next: JobState) {
        info!("job {}: {:?} -> {:?}", self.run_id, self.state, next);
        self.state = next;
    }

    fn init_scan_state(&self, total: u64) -> Result<(u64, CarveScanner, u64), JobError> {
        if self.options.resume {
            if let Some(path) = &self.options.checkpoint {
                if path.exists() {
                    let state = checkpoint::load_checkpoint(path)?;
                    self.validate_checkpoint(&state, total)?;
                    let scanner = CarveScanner::restore(self.registry.clone(), &state.open_carves)
                        .map_err(|e| CheckpointError::Mismatch(e.to_string()))?;
                    info!(
                        "resuming run {} at offset {} with {} open carves",
                        state.run_id,
                        state.next_offset,
                        state.open_carves.len()
                    );
                    return Ok((state.next_offset, scanner, state.artifacts_emitted));
                }
                info!(
                    "no checkpoint at {}; starting a fresh pass",
                    path.display()
                );
            }
        }
        Ok((0, CarveScanner::new(self.registry.clone()), 0))
    }

    fn validate_checkpoint(
        &self,
        state: &JobCheckpoint,
        total: u64,
    ) -> Result<(), CheckpointError> {
        if state.chunk_size != self.options.chunk_size {
            return Err(CheckpointError::Mismatch(format!(
                "checkpoint chunk_size {} does not match requested {}",
                state.chunk_size, self.options.chunk_size
            )));
        }
        if state.source_len != total {
            return Err(CheckpointError::Mismatch(format!(
                "checkpoint source length {} does not match evidence length {}",
                state.source_len, total
            )));
        }
        if state.next_offset >= total {
            return Err(CheckpointError::Mismatch(format!(
                "checkpoint offset {} is beyond evidence length {}",
                state.next_offset, total
            )));
        }
        if state.run_id != self.run_id {
            warn!(
                "checkpoint run_id {} does not match current run_id {}",
                state.run_id, self.run_id
            );
        }
        Ok(())
    }
}

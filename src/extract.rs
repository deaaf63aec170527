use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

use crate::evidence::EvidenceSource;
use crate::registry::SignatureRegistry;
use crate::scan::{CarveRecord, CloseReason};

/// How much of the artifact the validator gets to see.
const HEAD_PROBE: usize = 4096;
const TAIL_PROBE: usize = 1024;
const COPY_BUF: usize = 64 * 1024;

/// A materialized artifact. Immutable once emitted; `validated=false` keeps
/// the file on disk so malformed recoveries stay inspectable.
#[derive(Debug, Clone, Serialize)]
pub struct CarvedArtifact {
    pub run_id: String,
    pub type_name: String,
    /// Output path relative to the carve root.
    pub path: String,
    pub extension: String,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub md5: String,
    pub sha256: String,
    pub validated: bool,
    pub reason: CloseReason,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("evidence error: {0}")]
    Evidence(String),
}

/// Materializes closed carve records by re-reading their byte range from
/// the evidence. Extraction is idempotent: the output name is derived from
/// type and start offset, and a rerun overwrites the same file.
pub struct Extractor {
    registry: Arc<SignatureRegistry>,
    evidence: Arc<dyn EvidenceSource>,
    run_id: String,
    output_root: PathBuf,
}

impl Extractor {
    pub fn new(
        registry: Arc<SignatureRegistry>,
        evidence: Arc<dyn EvidenceSource>,
        run_id: String,
        output_root: PathBuf,
    ) -> Self {
        Self {
            registry,
            evidence,
            run_id,
            output_root,
        }
    }

    pub fn extract(&self, record: &CarveRecord) -> Result<CarvedArtifact, ExtractError> {
        let spec = &self.registry.specs()[record.spec_idx];
        let (full_path, rel_path) = output_path(
            &self.output_root,
            &spec.type_name,
            &spec.extension,
            record.start,
        )?;

        let file = File::create(&full_path)?;
        let mut writer = BufWriter::new(file);
        let mut md5 = md5::Context::new();
        let mut sha256 = Sha256::new();
        let mut head: Vec<u8> = Vec::new();
        let mut tail: Vec<u8> = Vec::new();

        let total = record.end - record.start;
        let mut written = 0u64;
        while written < total {
            let want = (total - written).min(COPY_BUF as u64) as usize;
            let mut buf = vec![0u8; want];
            let n = crate::evidence::read_exact_at(
                self.evidence.as_ref(),
                record.start + written,
                &mut buf,
            )
            .map_err(|e| ExtractError::Evidence(e.to_string()))?;
            if n == 0 {
                return Err(ExtractError::Evidence(format!(
                    "source ended early at offset {}",
                    record.start + written
                )));
            }
            buf.truncate(n);

            writer.write_all(&buf)?;
            md5.consume(&buf);
            sha256.update(&buf);

            if head.len() < HEAD_PROBE {
                let take = (HEAD_PROBE - head.len()).min(buf.len());
                head.extend_from_slice(&buf[..take]);
            }
            if buf.len() >= TAIL_PROBE {
                tail.clear();
                tail.extend_from_slice(&buf[buf.len() - TAIL_PROBE..]);
            } else {
                tail.extend_from_slice(&buf);
                if tail.len() > TAIL_PROBE {
                    tail.drain(..tail.len() - TAIL_PROBE);
                }
            }

            written += n as u64;
        }
        writer.flush()?;

        let validated = spec.validator.validate(&head, &tail, written);
        if !validated {
            warn!(
                "carved {} at offset {:#x} failed {} validation; kept and flagged",
                rel_path, record.start, spec.type_name
            );
        }

        Ok(CarvedArtifact {
            run_id: self.run_id.clone(),
            type_name: spec.type_name.clone(),
            path: rel_path,
            extension: spec.extension.clone(),
            start: record.start,
            end: record.start + written,
            size: written,
            md5: format!("{:x}", md5.compute()),
            sha256: hex::encode(sha256.finalize()),
            validated,
            reason: record.reason,
        })
    }
}

/// Deterministic output location: one directory per type, file named from
/// type and start offset. Start offsets are unique within a pass, so names
/// cannot collide.
pub fn output_path(
    output_root: &Path,
    type_name: &str,
    extension: &str,
    start: u64,
) -> Result<(PathBuf, String), std::io::Error> {
    let dir = output_root.join(type_name);
    std::fs::create_dir_all(&dir)?;
    let filename = format!("{}_{:012x}.{}", type_name, start, extension);
    let full_path = dir.join(&filename);
    let rel_path = full_path
        .strip_prefix(output_root)
        .unwrap_or(&full_path)
        .to_string_lossy()
        .to_string();
    Ok((full_path, rel_path))
}

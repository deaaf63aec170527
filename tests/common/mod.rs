//! Shared test infrastructure: synthetic sources, a collecting event sink,
//! and a one-call job runner.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use exhume::config;
use exhume::events::{EventSink, JobEvent};
use exhume::evidence::{EvidenceSource, RawFileSource};
use exhume::extract::CarvedArtifact;
use exhume::ioc::IocMatch;
use exhume::job::{JobController, JobError, JobOptions, JobSummary, StringOptions};
use exhume::registry::SignatureRegistry;
use exhume::strings::StringMatch;

pub fn insert_bytes(target: &mut Vec<u8>, offset: usize, data: &[u8]) {
    let end = offset + data.len();
    if end > target.len() {
        target.resize(end, 0u8);
    }
    target[offset..end].copy_from_slice(data);
}

pub fn minimal_jpeg() -> Vec<u8> {
    let mut jpeg = vec![0u8; 32];
    jpeg[0..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    jpeg[4..9].copy_from_slice(b"JFIF\0");
    jpeg[30..32].copy_from_slice(&[0xFF, 0xD9]);
    jpeg
}

pub fn minimal_png() -> Vec<u8> {
    let mut png = Vec::new();
    png.extend_from_slice(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    png.extend_from_slice(&[0, 0, 0, 13]);
    png.extend_from_slice(b"IHDR");
    png.extend_from_slice(&[0u8; 17]);
    png.extend_from_slice(&[0, 0, 0, 0]);
    png.extend_from_slice(b"IEND");
    png.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
    png
}

pub fn minimal_pdf() -> Vec<u8> {
    b"%PDF-1.4\nsynthetic payload\n%%EOF".to_vec()
}

pub fn default_registry() -> Arc<SignatureRegistry> {
    let loaded = config::load_config(None).expect("config");
    Arc::new(SignatureRegistry::from_config(&loaded.config).expect("registry"))
}

/// Collects every event the job emits, for assertions.
#[derive(Default)]
pub struct CollectSink {
    pub artifacts: Mutex<Vec<CarvedArtifact>>,
    pub strings: Mutex<Vec<StringMatch>>,
    pub iocs: Mutex<Vec<IocMatch>>,
    pub chunk_offsets: Mutex<Vec<u64>>,
    pub summary: Mutex<Option<JobSummary>>,
}

impl CollectSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn artifact_ranges(&self) -> Vec<(String, u64, u64)> {
        let mut ranges: Vec<(String, u64, u64)> = self
            .artifacts
            .lock()
            .unwrap()
            .iter()
            .map(|a| (a.type_name.clone(), a.start, a.end))
            .collect();
        ranges.sort();
        ranges
    }
}

impl EventSink for CollectSink {
    fn on_event(&self, event: &JobEvent) {
        match event {
            JobEvent::ArtifactFound(artifact) => {
                self.artifacts.lock().unwrap().push(artifact.clone())
            }
            JobEvent::StringFound(string) => self.strings.lock().unwrap().push(string.clone()),
            JobEvent::IocFound(ioc) => self.iocs.lock().unwrap().push(ioc.clone()),
            JobEvent::ChunkProcessed { offset, .. } => {
                self.chunk_offsets.lock().unwrap().push(*offset)
            }
            JobEvent::JobDone(summary) => {
                *self.summary.lock().unwrap() = Some(summary.clone());
            }
        }
    }
}

pub struct RunConfig {
    pub chunk_size: u64,
    pub workers: usize,
    pub strings: Option<StringOptions>,
    pub checkpoint: Option<PathBuf>,
    pub resume: bool,
}

impl RunConfig {
    pub fn carve_only(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            workers: 1,
            strings: None,
            checkpoint: None,
            resume: false,
        }
    }
}

pub fn run_job(
    input: &Path,
    carve_root: &Path,
    registry: Arc<SignatureRegistry>,
    run_cfg: RunConfig,
    sink: Arc<CollectSink>,
    cancel: Arc<AtomicBool>,
) -> Result<JobSummary, JobError> {
    let evidence = RawFileSource::open(input).expect("open evidence");
    let evidence: Arc<dyn EvidenceSource> = Arc::new(evidence);
    let sinks: Vec<Arc<dyn EventSink>> = vec![sink];
    let controller = JobController::new(
        registry,
        evidence,
        "test_run".to_string(),
        carve_root.to_path_buf(),
        JobOptions {
            workers: run_cfg.workers,
            chunk_size: run_cfg.chunk_size,
            strings: run_cfg.strings,
            checkpoint: run_cfg.checkpoint,
            resume: run_cfg.resume,
        },
        sinks,
        cancel,
    );
    controller.run()
}

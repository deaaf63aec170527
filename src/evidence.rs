use std::fs::File;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported evidence type: {0}")]
    Unsupported(String),
}

/// Random-access view over a finite byte source (disk image or memory dump).
/// The source is owned by exactly one job for its duration and is never
/// written to.
pub trait EvidenceSource: Send + Sync {
    fn len(&self) -> u64;
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, EvidenceError>;
}

pub struct RawFileSource {
    file: File,
    len: u64,
    #[cfg(not(unix))]
    lock: std::sync::Mutex<()>,
}

impl RawFileSource {
    pub fn open(path: &Path) -> Result<Self, EvidenceError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            len,
            #[cfg(not(unix))]
            lock: std::sync::Mutex::new(()),
        })
    }
}

impl EvidenceSource for RawFileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, EvidenceError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.read_at(buf, offset)?)
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let _guard = self.lock.lock().unwrap();
            let mut f = &self.file;
            f.seek(SeekFrom::Start(offset))?;
            Ok(f.read(buf)?)
        }
    }
}

pub fn open_source(path: &Path) -> Result<Box<dyn EvidenceSource>, EvidenceError> {
    let src = RawFileSource::open(path)?;
    Ok(Box::new(src))
}

/// Read into `buf` starting at `offset`, retrying short reads. Returns the
/// number of bytes read, which is less than `buf.len()` only at end of
/// source.
pub fn read_exact_at(
    source: &dyn EvidenceSource,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize, EvidenceError> {
    let mut read = 0usize;
    while read < buf.len() {
        let n = source.read_at(offset + read as u64, &mut buf[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(read)
}

/// Full-pass SHA-256 of the evidence, for report provenance.
pub fn compute_sha256(source: &dyn EvidenceSource, buf_size: usize) -> Result<String, EvidenceError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; buf_size.max(4096)];
    let mut offset = 0u64;
    let total = source.len();
    while offset < total {
        let n = source.read_at(offset, &mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        offset += n as u64;
    }
    Ok(hex::encode(hasher.finalize()))
}

use std::sync::Arc;

use memchr::memchr;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::config::ConfigError;
use crate::registry::SignatureRegistry;

/// Persistable state of one candidate carve whose end has not been seen yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCarve {
    pub type_name: String,
    pub start: u64,
    pub bytes_seen: u64,
    /// Global offset at which the footer search resumes; starts just past
    /// the header so a footer cannot overlap the bytes that opened the
    /// carve.
    pub search_from: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Footer,
    MaxSize,
    EndOfSource,
}

/// A closed carve, ready for extraction. Emitted in close order (end
/// offset), not start order.
#[derive(Debug, Clone)]
pub struct CarveRecord {
    pub spec_idx: usize,
    pub type_name: String,
    pub start: u64,
    /// Exclusive end offset.
    pub end: u64,
    pub reason: CloseReason,
}

struct ActiveCarve {
    spec_idx: usize,
    start: u64,
    bytes_seen: u64,
    search_from: u64,
}

/// Left-to-right signature scanner tracking open carves across chunks.
///
/// Each chunk is processed as a sweep over three event kinds in ascending
/// byte position: footer closes, max-size truncations, and header opens.
/// At equal positions a close is handled before an open, and of two headers
/// only the registry's priority winner starts a carve. A header match for a
/// type that already has an open carve is ignored, which bounds memory on
/// inputs with repeated headers and no footers.
///
/// A pattern match is attributed to the chunk holding its final byte in the
/// primary window, so matches straddling a window edge are seen exactly
/// once via the carry bytes.
pub struct CarveScanner {
    registry: Arc<SignatureRegistry>,
    active: Vec<ActiveCarve>,
}

impl CarveScanner {
    pub fn new(registry: Arc<SignatureRegistry>) -> Self {
        Self {
            registry,
            active: Vec::new(),
        }
    }

    /// Rebuild scanner state from checkpointed open carves. Fails when a
    /// carve references a type absent from the registry, which happens when
    /// a resume is attempted with a different enabled-type set.
    pub fn restore(
        registry: Arc<SignatureRegistry>,
        saved: &[OpenCarve],
    ) -> Result<Self, ConfigError> {
        let mut active = Vec::new();
        for carve in saved {
            let spec_idx = registry
                .specs()
                .iter()
                .position(|s| s.type_name == carve.type_name)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "open carve references disabled type {}",
                        carve.type_name
                    ))
                })?;
            active.push(ActiveCarve {
                spec_idx,
                start: carve.start,
                bytes_seen: carve.bytes_seen,
                search_from: carve.search_from,
            });
        }
        Ok(Self { registry, active })
    }

    /// Snapshot open carves for checkpointing.
    pub fn open_state(&self) -> Vec<OpenCarve> {
        let specs = self.registry.specs();
        self.active
            .iter()
            .map(|c| OpenCarve {
                type_name: specs[c.spec_idx].type_name.clone(),
                start: c.start,
                bytes_seen: c.bytes_seen,
                search_from: c.search_from,
            })
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.active.len()
    }

    pub fn scan_chunk(&mut self, chunk: &Chunk) -> Vec<CarveRecord> {
        let specs = self.registry.specs();
        let base = chunk.base();
        let primary_start = chunk.start;
        let primary_end = chunk.primary_end();
        let data = &chunk.data[..];

        // Header candidates ending inside the primary window, in sweep
        // order. Specs are priority-ordered, so sorting by (position,
        // spec index) puts the priority winner first at equal positions.
        let mut headers: Vec<(u64, usize)> = Vec::new();
        for (idx, spec) in specs.iter().enumerate() {
            for pos in find_all(data, &spec.header) {
                let end = base + (pos + spec.header.len()) as u64;
                if end > primary_start {
                    headers.push((base + pos as u64, idx));
                }
            }
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        // Footer matches per spec, (start, end) global, ending inside the
        // primary window.
        let mut footer_hits: Vec<Vec<(u64, u64)>> = vec![Vec::new(); specs.len()];
        for (idx, spec) in specs.iter().enumerate() {
            let Some(footer) = &spec.footer else { continue };
            for pos in find_all(data, footer) {
                let end = base + (pos + footer.len()) as u64;
                if end > primary_start {
                    footer_hits[idx].push((base + pos as u64, end));
                }
            }
        }

        let mut out = Vec::new();
        let mut next_header = 0usize;
        let mut last_opened: Option<u64> = None;

        loop {
            // earliest close event across all open carves
            let mut close: Option<(u64, usize, u64, CloseReason)> = None;
            for (ai, carve) in self.active.iter().enumerate() {
                let spec = &specs[carve.spec_idx];
                let cap = carve.start.saturating_add(spec.max_size);
                let mut candidate: Option<(u64, u64, CloseReason)> = None;
                if let Some((_, end)) = footer_hits[carve.spec_idx]
                    .iter()
                    .find(|(start, end)| *start >= carve.search_from && *end <= cap)
                {
                    candidate = Some((*end, *end, CloseReason::Footer));
                }
                if candidate.is_none() && cap <= primary_end {
                    candidate = Some((cap, cap, CloseReason::MaxSize));
                }
                if let Some((pos, end, reason)) = candidate {
                    if close.map_or(true, |(best, ..)| pos < best) {
                        close = Some((pos, ai, end, reason));
                    }
                }
            }

            let header = headers.get(next_header).copied();
            // closes win ties: at one position a footer completes before a
            // new header opens
            let close_first = match (close, header) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some((close_pos, ..)), Some((header_pos, _))) => close_pos <= header_pos,
            };

            if close_first {
                if let Some((_, ai, end, reason)) = close {
                    let carve = self.active.remove(ai);
                    out.push(CarveRecord {
                        spec_idx: carve.spec_idx,
                        type_name: specs[carve.spec_idx].type_name.clone(),
                        start: carve.start,
                        end,
                        reason,
                    });
                }
            } else if let Some((pos, spec_idx)) = header {
                next_header += 1;
                if last_opened == Some(pos) {
                    continue;
                }
                if self.active.iter().any(|c| c.spec_idx == spec_idx) {
                    continue;
                }
                let header_len = specs[spec_idx].header.len() as u64;
                self.active.push(ActiveCarve {
                    spec_idx,
                    start: pos,
                    bytes_seen: 0,
                    search_from: pos + header_len,
                });
                last_opened = Some(pos);
            }
        }

        for carve in &mut self.active {
            carve.bytes_seen = primary_end.saturating_sub(carve.start);
        }
        out
    }

    /// Close every remaining carve at end of source. Nothing is silently
    /// dropped: a carve that never found its footer is emitted truncated.
    pub fn finish(&mut self, total_len: u64) -> Vec<CarveRecord> {
        let specs = self.registry.specs();
        self.active
            .drain(..)
            .map(|carve| CarveRecord {
                spec_idx: carve.spec_idx,
                type_name: specs[carve.spec_idx].type_name.clone(),
                start: carve.start,
                end: total_len,
                reason: CloseReason::EndOfSource,
            })
            .collect()
    }
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut hits = Vec::new();
    if needle.is_empty() || haystack.len() < needle.len() {
        return hits;
    }
    let first = needle[0];
    let mut pos = 0usize;
    while pos + needle.len() <= haystack.len() {
        let Some(found) = memchr(first, &haystack[pos..]) else {
            break;
        };
        let idx = pos + found;
        if idx + needle.len() > haystack.len() {
            break;
        }
        if &haystack[idx..idx + needle.len()] == needle {
            hits.push(idx);
        }
        pos = idx + 1;
    }
    hits
}

//! Worker thread spawning for the job pipeline: extraction pool, string
//! lane, and the single event thread.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::warn;

use crate::chunk::Chunk;
use crate::events::{EventSink, JobEvent};
use crate::extract::Extractor;
use crate::ioc::IocMatcher;
use crate::scan::{CarveRecord, CloseReason};
use crate::strings::StringScanner;

use super::JobCounters;

/// Forward events to every subscribed sink, in arrival order.
pub(crate) fn spawn_event_thread(
    sinks: Vec<Arc<dyn EventSink>>,
    rx: Receiver<JobEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in rx {
            for sink in &sinks {
                sink.on_event(&event);
            }
        }
    })
}

/// Extraction has no cross-artifact dependency once a carve is closed, so
/// records fan out to a bounded pool to overlap disk I/O.
pub(crate) fn spawn_extract_workers(
    workers: usize,
    extractor: Arc<Extractor>,
    rx: Receiver<CarveRecord>,
    event_tx: Sender<JobEvent>,
    counters: Arc<JobCounters>,
) -> Vec<thread::JoinHandle<()>> {
    let mut handles = Vec::new();
    for _ in 0..workers.max(1) {
        let extractor = extractor.clone();
        let rx = rx.clone();
        let event_tx = event_tx.clone();
        let counters = counters.clone();

        handles.push(thread::spawn(move || {
            for record in rx {
                match extractor.extract(&record) {
                    Ok(artifact) => {
                        counters.artifacts_found.fetch_add(1, Ordering::Relaxed);
                        if artifact.validated {
                            counters.artifacts_validated.fetch_add(1, Ordering::Relaxed);
                        }
                        if artifact.reason != CloseReason::Footer {
                            counters.artifacts_truncated.fetch_add(1, Ordering::Relaxed);
                        }
                        if let Err(err) = event_tx.send(JobEvent::ArtifactFound(artifact)) {
                            warn!("event channel closed while sending artifact: {err}");
                            break;
                        }
                    }
                    Err(err) => {
                        counters.extract_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("extraction failed at offset {}: {err}", record.start);
                    }
                }
            }
        }));
    }
    handles
}

/// The string pass is logically sequential (pending-run state crosses chunk
/// boundaries), so it runs as one lane thread fed chunks in scan order.
pub(crate) fn spawn_string_lane(
    mut scanner: StringScanner,
    matcher: IocMatcher,
    rx: Receiver<Arc<Chunk>>,
    event_tx: Sender<JobEvent>,
    counters: Arc<JobCounters>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let emit = |string: crate::strings::StringMatch| -> bool {
            counters.strings_found.fetch_add(1, Ordering::Relaxed);
            for ioc in matcher.matches(&string) {
                counters.iocs_found.fetch_add(1, Ordering::Relaxed);
                if event_tx.send(JobEvent::IocFound(ioc)).is_err() {
                    return false;
                }
            }
            if event_tx.send(JobEvent::StringFound(string)).is_err() {
                warn!("event channel closed while sending string match");
                return false;
            }
            true
        };

        for chunk in rx {
            for string in scanner.scan_chunk(&chunk) {
                if !emit(string) {
                    return;
                }
            }
        }
        for string in scanner.finish() {
            if !emit(string) {
                return;
            }
        }
    })
}

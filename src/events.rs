//! Event stream exposed to collaborators (CLI progress display, report
//! sinks). The core emits structured records and never formats
//! human-readable output itself.

use crate::extract::CarvedArtifact;
use crate::ioc::IocMatch;
use crate::job::JobSummary;
use crate::strings::StringMatch;

#[derive(Debug, Clone)]
pub enum JobEvent {
    /// A chunk boundary was fully processed; `offset` is the first
    /// unscanned byte.
    ChunkProcessed { offset: u64, total: u64 },
    ArtifactFound(CarvedArtifact),
    StringFound(StringMatch),
    IocFound(IocMatch),
    JobDone(JobSummary),
}

/// Subscriber interface. Sinks run on the job's single event thread, so an
/// implementation needs interior mutability but no ordering logic.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &JobEvent);
}

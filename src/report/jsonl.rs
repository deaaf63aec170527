use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use tracing::warn;

use crate::events::{EventSink, JobEvent};
use crate::extract::CarvedArtifact;
use crate::ioc::IocMatch;
use crate::report::{ReportContext, ReportError};
use crate::strings::StringMatch;

pub struct JsonlReporter {
    ctx: ReportContext,
    artifacts: Mutex<BufWriter<File>>,
    strings: Mutex<BufWriter<File>>,
    iocs: Mutex<BufWriter<File>>,
    summary_path: std::path::PathBuf,
}

/// Provenance wrapper. `run_id` is not repeated here: artifact records
/// carry their own, and string/IOC records get one added.
#[derive(Serialize)]
struct Record<'a, T: Serialize> {
    #[serde(flatten)]
    inner: &'a T,
    tool_version: &'a str,
    config_hash: &'a str,
    source_path: &'a str,
    source_sha256: &'a str,
}

#[derive(Serialize)]
struct RunScoped<'a, T: Serialize> {
    #[serde(flatten)]
    inner: &'a T,
    run_id: &'a str,
}

impl JsonlReporter {
    pub fn new(ctx: ReportContext, report_dir: &Path) -> Result<Self, ReportError> {
        let open = |name: &str| -> Result<Mutex<BufWriter<File>>, ReportError> {
            let file = File::create(report_dir.join(name))?;
            Ok(Mutex::new(BufWriter::new(file)))
        };
        Ok(Self {
            ctx,
            artifacts: open("artifacts.jsonl")?,
            strings: open("strings.jsonl")?,
            iocs: open("iocs.jsonl")?,
            summary_path: report_dir.join("summary.json"),
        })
    }

    fn write_line<T: Serialize>(
        &self,
        writer: &Mutex<BufWriter<File>>,
        inner: &T,
    ) -> Result<(), ReportError> {
        let record = Record {
            inner,
            tool_version: &self.ctx.tool_version,
            config_hash: &self.ctx.config_hash,
            source_path: &self.ctx.source_path,
            source_sha256: &self.ctx.source_sha256,
        };
        let mut guard = writer.lock().unwrap();
        serde_json::to_writer(&mut *guard, &record)?;
        guard.write_all(b"\n")?;
        Ok(())
    }

    fn record_artifact(&self, artifact: &CarvedArtifact) -> Result<(), ReportError> {
        self.write_line(&self.artifacts, artifact)
    }

    fn record_string(&self, string: &StringMatch) -> Result<(), ReportError> {
        let scoped = RunScoped {
            inner: string,
            run_id: &self.ctx.run_id,
        };
        self.write_line(&self.strings, &scoped)
    }

    fn record_ioc(&self, ioc: &IocMatch) -> Result<(), ReportError> {
        let scoped = RunScoped {
            inner: ioc,
            run_id: &self.ctx.run_id,
        };
        self.write_line(&self.iocs, &scoped)
    }

    fn record_summary(&self, summary: &crate::job::JobSummary) -> Result<(), ReportError> {
        let json = serde_json::to_vec_pretty(summary)?;
        std::fs::write(&self.summary_path, json)?;
        for writer in [&self.artifacts, &self.strings, &self.iocs] {
            writer.lock().unwrap().flush()?;
        }
        Ok(())
    }
}

impl EventSink for JsonlReporter {
    fn on_event(&self, event: &JobEvent) {
        let result = match event {
            JobEvent::ArtifactFound(artifact) => self.record_artifact(artifact),
            JobEvent::StringFound(string) => self.record_string(string),
            JobEvent::IocFound(ioc) => self.record_ioc(ioc),
            JobEvent::JobDone(summary) => self.record_summary(summary),
            JobEvent::ChunkProcessed { .. } => Ok(()),
        };
        if let Err(err) = result {
            warn!("report write error: {err}");
        }
    }
}

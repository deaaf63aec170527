use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use tracing::warn;

use crate::events::{EventSink, JobEvent};
use crate::extract::CarvedArtifact;
use crate::ioc::IocMatch;
use crate::report::{ReportContext, ReportError};
use crate::strings::StringMatch;

pub struct CsvReporter {
    ctx: ReportContext,
    artifacts: Mutex<csv::Writer<File>>,
    strings: Mutex<csv::Writer<File>>,
    iocs: Mutex<csv::Writer<File>>,
    summary: Mutex<csv::Writer<File>>,
}

#[derive(Serialize)]
struct ArtifactRow<'a> {
    run_id: &'a str,
    type_name: &'a str,
    path: &'a str,
    start: u64,
    end: u64,
    size: u64,
    md5: &'a str,
    sha256: &'a str,
    validated: bool,
    reason: crate::scan::CloseReason,
    tool_version: &'a str,
    config_hash: &'a str,
    source_path: &'a str,
    source_sha256: &'a str,
}

#[derive(Serialize)]
struct StringRow<'a> {
    run_id: &'a str,
    offset: u64,
    encoding: crate::strings::StringEncoding,
    text: &'a str,
}

#[derive(Serialize)]
struct IocRow<'a> {
    run_id: &'a str,
    kind: crate::ioc::IocKind,
    value: &'a str,
    offset: u64,
}

impl CsvReporter {
    pub fn new(ctx: ReportContext, report_dir: &Path) -> Result<Self, ReportError> {
        let open = |name: &str| -> Result<Mutex<csv::Writer<File>>, ReportError> {
            let file = File::create(report_dir.join(name))?;
            Ok(Mutex::new(csv::Writer::from_writer(file)))
        };
        Ok(Self {
            ctx,
            artifacts: open("artifacts.csv")?,
            strings: open("strings.csv")?,
            iocs: open("iocs.csv")?,
            summary: open("summary.csv")?,
        })
    }

    fn record_artifact(&self, artifact: &CarvedArtifact) -> Result<(), ReportError> {
        let row = ArtifactRow {
            run_id: &self.ctx.run_id,
            type_name: &artifact.type_name,
            path: &artifact.path,
            start: artifact.start,
            end: artifact.end,
            size: artifact.size,
            md5: &artifact.md5,
            sha256: &artifact.sha256,
            validated: artifact.validated,
            reason: artifact.reason,
            tool_version: &self.ctx.tool_version,
            config_hash: &self.ctx.config_hash,
            source_path: &self.ctx.source_path,
            source_sha256: &self.ctx.source_sha256,
        };
        let mut guard = self.artifacts.lock().unwrap();
        guard.serialize(row)?;
        Ok(())
    }

    fn record_string(&self, string: &StringMatch) -> Result<(), ReportError> {
        let row = StringRow {
            run_id: &self.ctx.run_id,
            offset: string.offset,
            encoding: string.encoding,
            text: &string.text,
        };
        let mut guard = self.strings.lock().unwrap();
        guard.serialize(row)?;
        Ok(())
    }

    fn record_ioc(&self, ioc: &IocMatch) -> Result<(), ReportError> {
        let row = IocRow {
            run_id: &self.ctx.run_id,
            kind: ioc.kind,
            value: &ioc.value,
            offset: ioc.offset,
        };
        let mut guard = self.iocs.lock().unwrap();
        guard.serialize(row)?;
        Ok(())
    }

    fn record_summary(&self, summary: &crate::job::JobSummary) -> Result<(), ReportError> {
        {
            let mut guard = self.summary.lock().unwrap();
            guard.serialize(summary)?;
            guard.flush()?;
        }
        for writer in [&self.artifacts, &self.strings, &self.iocs] {
            writer.lock().unwrap().flush()?;
        }
        Ok(())
    }
}

impl EventSink for CsvReporter {
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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use tracing::{info, warn};

use exhume::cli::{self, ReportBackend, StringEncodingArg};
use exhume::config;
use exhume::events::{EventSink, JobEvent};
use exhume::evidence::{self, EvidenceSource};
use exhume::job::{JobController, JobOptions, JobState, StringOptions};
use exhume::logging;
use exhume::registry::SignatureRegistry;
use exhume::report::{self, ReportContext, ReportFormat};
use exhume::strings::StringEncoding;

const MIB: u64 = 1024 * 1024;

/// Logs scan progress at a coarse interval; everything else is recorded by
/// the report sink.
struct ProgressLogger {
    last: Mutex<Instant>,
    interval: Duration,
}

impl ProgressLogger {
    fn new(interval: Duration) -> Self {
        Self {
            last: Mutex::new(Instant::now()),
            interval,
        }
    }
}

impl EventSink for ProgressLogger {
    fn on_event(&self, event: &JobEvent) {
        match event {
            JobEvent::ChunkProcessed { offset, total } => {
                let mut last = self.last.lock().unwrap();
                if last.elapsed() >= self.interval {
                    let pct = if *total > 0 {
                        *offset as f64 / *total as f64 * 100.0
                    } else {
                        100.0
                    };
                    info!("scanned {offset} / {total} bytes ({pct:.1}%)");
                    *last = Instant::now();
                }
            }
            JobEvent::JobDone(summary) => {
                info!(
                    "run_summary state={:?} bytes_scanned={} chunks={} artifacts={} validated={} truncated={} strings={} iocs={}",
                    summary.state,
                    summary.bytes_scanned,
                    summary.chunks_processed,
                    summary.artifacts_found,
                    summary.artifacts_validated,
                    summary.artifacts_truncated,
                    summary.strings_found,
                    summary.iocs_found
                );
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    logging::init_logging();

    let opts = cli::parse();
    let loaded = config::load_config(opts.config.as_deref())?;
    let mut cfg = loaded.config;
    if let Some(min_len) = opts.string_min_len {
        cfg.string_min_len = min_len;
    }

    let registry = SignatureRegistry::from_config(&cfg)?;
    let (registry, unknown) = registry.specs_for(opts.types.as_deref());
    for name in unknown {
        warn!("unknown signature type in --types: {name}");
    }
    if registry.is_empty() {
        bail!("no signature types enabled after applying --types filter");
    }
    let registry = Arc::new(registry);

    let evidence_source = evidence::open_source(&opts.input)?;
    let evidence_source: Arc<dyn EvidenceSource> = Arc::from(evidence_source);

    let source_sha256 = if opts.compute_source_sha256 {
        info!("computing source sha256 (full pass)");
        let hash = evidence::compute_sha256(evidence_source.as_ref(), 8 * 1024 * 1024)?;
        info!("source sha256={hash}");
        hash
    } else {
        String::new()
    };

    let run_output_dir = opts.output.join(&cfg.run_id);
    std::fs::create_dir_all(&run_output_dir)?;

    let chunk_size = opts.chunk_size_mib.unwrap_or(cfg.chunk_size_mib) * MIB;
    info!(
        "starting run_id={} input={} output={} workers={} chunk_size={}",
        cfg.run_id,
        opts.input.display(),
        run_output_dir.display(),
        opts.workers,
        chunk_size
    );

    let format = match opts.report_format {
        ReportBackend::Jsonl => ReportFormat::Jsonl,
        ReportBackend::Csv => ReportFormat::Csv,
    };
    let reporter = report::build_reporter(
        format,
        ReportContext {
            run_id: cfg.run_id.clone(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: loaded.config_hash.clone(),
            source_path: opts.input.display().to_string(),
            source_sha256,
        },
        &run_output_dir,
    )?;
    let sinks: Vec<Arc<dyn EventSink>> = vec![
        reporter,
        Arc::new(ProgressLogger::new(Duration::from_secs(5))),
    ];

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("shutdown requested; finishing current chunk");
            cancel.store(true, Ordering::Relaxed);
        })?;
    }

    let strings = if opts.scan_strings || opts.string_encoding.is_some() {
        let encoding = match opts.string_encoding {
            Some(StringEncodingArg::Utf16) => StringEncoding::Utf16le,
            _ => StringEncoding::Ascii,
        };
        Some(StringOptions {
            encoding,
            min_len: cfg.string_min_len,
            max_len: cfg.string_max_len,
        })
    } else {
        None
    };

    let controller = JobController::new(
        registry,
        evidence_source,
        cfg.run_id.clone(),
        run_output_dir.join("carved"),
        JobOptions {
            workers: opts.workers,
            chunk_size,
            strings,
            checkpoint: opts.checkpoint.clone(),
            resume: opts.resume,
        },
        sinks,
        cancel,
    );

    let summary = controller.run()?;
    if summary.state == JobState::Failed {
        bail!("job stopped before completion; checkpoint preserved for --resume");
    }
    info!("exhume run finished");
    Ok(())
}

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ReportBackend {
    Jsonl,
    Csv,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum StringEncodingArg {
    Ascii,
    Utf16,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Input byte source (disk image or memory dump)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for carved artifacts and reports
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Optional path to config file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Limit carving to these signature types (comma-separated list)
    #[arg(long, value_delimiter = ',')]
    pub types: Option<Vec<String>>,

    /// Number of extraction worker threads
    #[arg(long, default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Chunk window size, in MiB
    #[arg(long)]
    pub chunk_size_mib: Option<u64>,

    /// Enable printable string extraction
    #[arg(long)]
    pub scan_strings: bool,

    /// String encoding to scan for (implies --scan-strings)
    #[arg(long, value_enum)]
    pub string_encoding: Option<StringEncodingArg>,

    /// Override minimum string length
    #[arg(long)]
    pub string_min_len: Option<usize>,

    /// Report backend
    #[arg(long, value_enum, default_value_t = ReportBackend::Jsonl)]
    pub report_format: ReportBackend,

    /// Checkpoint file path; enables per-chunk progress persistence
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Resume from the checkpoint file if it exists
    #[arg(long, requires = "checkpoint")]
    pub resume: bool,

    /// Compute evidence SHA-256 before scanning (extra full pass)
    #[arg(long)]
    pub compute_source_sha256: bool,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}

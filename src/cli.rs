use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "depmatrix",
    about = "Build a cross-repository dependency version matrix from lock files",
    version
)]
pub struct Cli {
    /// Run manifest listing the repositories to scan
    #[arg(short, long, default_value = "depmatrix.toml")]
    pub config: PathBuf,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Write the report as JSON to FILE (implies --report json)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum concurrent repository jobs [default: CPU count]
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Track only this package (repeatable; overrides the manifest filter)
    #[arg(long = "package", value_name = "NAME")]
    pub packages: Vec<String>,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Show the full matrix, however large
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

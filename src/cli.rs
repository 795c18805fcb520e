use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;

/// Multi-threaded HTTP downloader
#[derive(Parser, Debug)]
#[command(name = "mtget", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Address of the file to download
    #[arg(value_name = "URL")]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub url: String,

    /// Number of concurrent range requests
    #[arg(short, long, value_name = "THREADS")]
    pub threads: Option<NonZeroUsize>,

    /// Output file; defaults to the last segment of the URL in the download directory
    #[arg(short, long, value_name = "FILE")]
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Settings file (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// More logging, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

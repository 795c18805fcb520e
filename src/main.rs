use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use url::Url;

use mtget::download::logger::setup_logger;
use mtget::download::progress_bar::ProgressBar;
use mtget::download::util::file_name_from_url;
use mtget::{Config, Downloader, DownloaderConfig, HttpTransport};

use crate::cli::CliArgs;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Download failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let settings = Config::load(args.config.as_deref())?;

    let level = match args.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let log_file = args.log_file.as_deref().or(settings.log_file.as_deref());
    setup_logger(level, log_file)?;

    let url = Url::parse(args.url.trim()).with_context(|| format!("Invalid URL: {}", args.url))?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| settings.download_dir.join(file_name_from_url(&url)));

    let mut config = DownloaderConfig::new(url, output).with_settings(&settings);
    if let Some(threads) = args.threads {
        config = config.with_worker_count(threads);
    }

    let mut transport = HttpTransport::default();
    if let Some(agent) = &settings.user_agent {
        transport = transport.with_user_agent(agent);
    }

    println!("Starting {} threads", config.worker_count);
    let downloader = Downloader::with_http(config, transport);
    let progress = ProgressBar::spawn(downloader.progress_stream());

    let result = downloader.download().await;

    // Closing the progress channel lets the renderer draw the last event and exit.
    drop(downloader);
    let _ = progress.await;

    match result {
        Ok(report) => {
            let (size, unit) = ProgressBar::byte_unit(report.bytes_written);
            info!("Download completed: {}", report.path.display());
            println!("Downloaded {size:.2} {unit} to {} in {:.2?}", report.path.display(), report.elapsed);
            Ok(())
        }
        Err(err) => {
            error!("{}", err);
            Err(err.into())
        }
    }
}

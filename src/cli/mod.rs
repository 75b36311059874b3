//! CLI mode for gallery-fetch - command-line interface for gallery downloads.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::{
    AppConfig, DirectorySink, DownloadOutcome, GalleryDownloader, GalleryInfo,
    HttpGalleryApi, HttpTransport, Selection,
};

use progress::{print_gallery, print_locked, print_summary, render_progress};

/// Download photos from a shared studio gallery.
#[derive(Parser, Debug)]
#[command(name = "gallery-fetch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: <config dir>/gallery-fetch/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the gallery API
    #[arg(long)]
    api_url: Option<String>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Files fetched concurrently per batch
    #[arg(short = 'j', long)]
    concurrent: Option<usize>,

    /// Replace existing files in the output directory
    #[arg(long)]
    force: bool,

    /// Seconds without data before a file fetch fails (0 disables)
    #[arg(long)]
    stall_timeout: Option<u64>,

    /// Share-link token of the gallery
    token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show gallery details and the current selection
    Info,
    /// Download every photo as <title>_all.zip
    All,
    /// Download the selected photos as <title>_selected.zip
    Selected(SelectionArgs),
    /// Export the selected photos for printing as <title>_for_printing.zip
    Print(SelectionArgs),
    /// Download a single photo under its own name
    Media {
        /// Media id
        id: String,
    },
}

/// Edits applied to the server-side selection before downloading.
#[derive(Args, Debug, Default)]
struct SelectionArgs {
    /// Add a media id to the selection
    #[arg(long = "select", value_name = "ID")]
    select: Vec<String>,

    /// Remove a media id from the selection
    #[arg(long = "deselect", value_name = "ID")]
    deselect: Vec<String>,
}

impl SelectionArgs {
    fn apply(&self, selection: &mut Selection) {
        for id in &self.select {
            if !selection.select(id) {
                log::warn!("Ignoring unknown media id {id}");
            }
        }
        for id in &self.deselect {
            if !selection.deselect(id) {
                log::warn!("Ignoring unknown media id {id}");
            }
        }
    }
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration.
    fn apply_overrides(&self, mut config: AppConfig) -> AppConfig {
        if let Some(url) = &self.api_url {
            config.api.base_url.clone_from(url);
        }
        if let Some(dir) = &self.output {
            config.paths.download_dir.clone_from(dir);
        }
        if let Some(n) = self.concurrent {
            config.download = config.download.with_max_concurrent(n);
        }
        if let Some(secs) = self.stall_timeout {
            let secs = (secs > 0).then_some(secs);
            config.download = config.download.with_stall_timeout_secs(secs);
        }
        if self.force {
            config.download = config.download.with_force_overwrite(true);
        }
        config
    }
}

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Builds a configured HTTP client for gallery requests.
fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// Parses the command line and runs it.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the gallery cannot
/// be opened, or the download fails.
pub async fn run() -> crate::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .init();
    run_with(Cli::parse()).await
}

/// Runs an already parsed command line.
///
/// # Errors
///
/// See [`run`].
pub async fn run_with(cli: Cli) -> crate::Result<()> {
    let config = cli.apply_overrides(AppConfig::load(cli.config.as_deref())?);
    log::debug!("Using config: {config:?}");

    let http = build_http_client()?;
    let api = HttpGalleryApi::new(http.clone(), &config.api.base_url, &cli.token);
    let sink = DirectorySink::new(&config.paths.download_dir)
        .with_force_overwrite(config.download.force_overwrite);

    let (downloader, info, mut selection) =
        GalleryDownloader::open(api, HttpTransport::new(http), sink, config.download).await?;
    let downloader = Arc::new(downloader);

    match &cli.command {
        Command::Info => {
            print_gallery(&info, &selection);
            return Ok(());
        }
        Command::Selected(args) | Command::Print(args) => args.apply(&mut selection),
        Command::All | Command::Media { .. } => {}
    }

    let done = CancellationToken::new();
    let renderer = tokio::spawn(render_progress(downloader.subscribe(), done.clone()));
    let interrupt = {
        let downloader = Arc::clone(&downloader);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                downloader.cancel();
            }
        })
    };

    let result = match &cli.command {
        Command::Media { id } => downloader.download_media(id).await,
        Command::Selected(_) => downloader.download_selected(&selection).await,
        Command::Print(_) => downloader.export_for_printing(&selection).await,
        Command::All | Command::Info => downloader.download_all().await,
    };

    interrupt.abort();
    done.cancel();
    let _ = renderer.await;

    report(&info, result?);
    Ok(())
}

fn report(info: &GalleryInfo, outcome: DownloadOutcome) {
    match outcome {
        DownloadOutcome::Saved(saved) => print_summary(&saved),
        DownloadOutcome::Cancelled => println!("Download cancelled."),
        DownloadOutcome::Locked => print_locked(info),
        DownloadOutcome::NothingToDownload => println!("Nothing to download."),
    }
}

//! Progress bar and summary reporting for CLI downloads.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    DownloadProgress, GalleryInfo, Phase, SavedDownload, Selection, format_bytes,
    format_duration, format_progress, format_rate,
};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates the bar for one download attempt. Length is set once the file
/// list is resolved.
fn make_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━━╌");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(250));
    bar
}

/// Renders progress snapshots until the attempt goes back to idle or `done`
/// fires, whichever comes first.
pub async fn render_progress(mut rx: watch::Receiver<DownloadProgress>, done: CancellationToken) {
    let bar = make_progress_bar();
    let mut started = false;

    loop {
        tokio::select! {
            biased;
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = done.cancelled() => break,
        }
        let progress = *rx.borrow_and_update();
        match progress.phase {
            Phase::Idle if started => break,
            Phase::Idle => continue,
            Phase::Downloading | Phase::Zipping => started = true,
        }
        bar.set_length(progress.bytes_total.max(progress.bytes_loaded));
        bar.set_position(progress.bytes_loaded);
        bar.set_message(format_progress(&progress));
    }

    bar.finish_and_clear();
}

/// Prints gallery metadata and the current server-side selection.
pub fn print_gallery(info: &GalleryInfo, selection: &Selection) {
    println!("\n{SEPARATOR}");
    println!("{}", info.title);
    if !info.description.is_empty() {
        println!("  {}", info.description);
    }
    println!("{SEPARATOR}");
    println!("  Media items:       {}", selection.media_count());
    println!("  Selected:          {}", selection.len());
    println!(
        "  Downloads:         {}",
        if info.downloads_locked { "locked" } else { "available" }
    );
    println!("{SEPARATOR}");
}

/// Prints the banner shown when downloads are payment-locked.
pub fn print_locked(info: &GalleryInfo) {
    println!("\n{SEPARATOR}");
    println!("Downloads for {:?} are locked until the invoice is paid.", info.title);
    if let Some(invoice) = &info.invoice_token {
        println!("  Invoice:           {invoice}");
    }
    println!("{SEPARATOR}");
}

/// Prints a summary of a saved download.
pub fn print_summary(saved: &SavedDownload) {
    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");
    println!("  Saved to:          {}", saved.path.display());
    println!("  Files:             {}", saved.files);
    println!("  Total size:        {}", format_bytes(saved.bytes));
    println!("  Total time:        {}", format_duration(saved.elapsed));
    println!("  Average speed:     {}", format_rate(saved.bytes, saved.elapsed));
    println!("{SEPARATOR}");
}

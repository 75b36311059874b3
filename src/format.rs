//! Formatting helpers for human-readable sizes, durations and rates.

use std::time::Duration;

use crate::progress::{DownloadProgress, Phase};

/// Formats a byte count the way the gallery view shows it
/// (whole KB below a megabyte, one decimal in MB, two in GB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a duration as e.g. "5.0s", "1m 05s" or "1h 01m 05s".
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        3600.. => format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60),
        60.. => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}.{:01}s", secs, d.subsec_millis() / 100),
    }
}

/// Average throughput over `elapsed`, e.g. "2.5 MB/s".
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn format_rate(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let per_sec = if secs > 0.0 {
        (bytes as f64 / secs) as u64
    } else {
        0
    };
    format!("{}/s", format_bytes(per_sec))
}

/// One-line progress label, e.g. "3/10 files · 12.0 MB / 40.0 MB (30%)".
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn format_progress(progress: &DownloadProgress) -> String {
    match progress.phase {
        Phase::Idle => String::new(),
        Phase::Zipping => format!("Creating archive of {} files...", progress.files_total),
        Phase::Downloading if progress.files_total == 0 => "Preparing download...".to_string(),
        Phase::Downloading => format!(
            "{}/{} files · {} / {} ({}%)",
            progress.files_completed,
            progress.files_total,
            format_bytes(progress.bytes_loaded),
            format_bytes(progress.bytes_total),
            (progress.fraction() * 100.0).round() as u64,
        ),
    }
}

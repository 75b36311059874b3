//! Error types for the gallery-fetch library.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving, fetching, archiving or saving a
/// gallery download.
#[derive(Error, Debug)]
pub enum Error {
    /// The gallery's downloads are gated behind an unpaid invoice (HTTP 402).
    #[error("Downloads are locked until payment is received")]
    Locked,

    /// The user cancelled the download.
    #[error("Download cancelled")]
    Cancelled,

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// URL that was requested.
        url: String,
    },

    /// No bytes arrived for a file within the configured stall timeout.
    #[error("Download of {filename} stalled for {timeout:?}")]
    Stalled {
        /// Name of the file whose body stopped flowing.
        filename: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The share link does not match any gallery.
    #[error("Gallery not found")]
    GalleryNotFound,

    /// The share link has expired or the gallery was archived.
    #[error("Gallery link has expired or is no longer available")]
    GalleryExpired,

    /// The file list could not be obtained or was malformed.
    #[error("Could not resolve files: {0}")]
    Resolution(String),

    /// Archive assembly failed.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// File already exists and force overwrite is disabled.
    #[error("File already exists: {path}")]
    FileExists {
        /// Path to the existing file.
        path: String,
    },

    /// A save name was not a plain file name.
    #[error("Invalid file name: {0:?}")]
    InvalidFilename(String),

    /// A download is already running for this gallery.
    #[error("A download is already in progress")]
    Busy,

    /// The configuration file could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Returns true if this error represents a user-initiated cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the gallery reported its downloads as payment-locked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }
}

/// A specialized `Result` type for gallery-fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

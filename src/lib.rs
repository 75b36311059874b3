//! gallery-fetch - bulk downloads from token-gated photo galleries.
//!
//! The pipeline resolves a download scope against the gallery API, fetches
//! the files in batches of at most four, packs them into a store-only zip
//! archive and hands the result to a save target. Progress is published as
//! a single snapshot value and every attempt can be cancelled.
//!
//! # Example
//!
//! ```no_run
//! use gallery_fetch::{
//!     DirectorySink, DownloadConfig, DownloadOutcome, GalleryDownloader, HttpGalleryApi,
//!     HttpTransport,
//! };
//!
//! # async fn example() -> gallery_fetch::Result<()> {
//! let http = reqwest::Client::new();
//! let api = HttpGalleryApi::new(http.clone(), "https://studio.example/api", "share-token");
//!
//! let (downloader, info, _selection) = GalleryDownloader::open(
//!     api,
//!     HttpTransport::new(http),
//!     DirectorySink::new("."),
//!     DownloadConfig::default(),
//! )
//! .await?;
//!
//! if let DownloadOutcome::Saved(saved) = downloader.download_all().await? {
//!     println!("{} saved to {}", info.title, saved.path.display());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod api;
pub mod archive;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod format;
pub mod model;
pub mod progress;
pub mod resolver;
pub mod save;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use api::{GalleryApi, HttpGalleryApi};
pub use archive::build_archive;
pub use config::{ApiConfig, AppConfig, DownloadConfig, MAX_CONCURRENT, PathConfig};
pub use coordinator::{GalleryDownloader, archive_name, sanitize_filename};
pub use error::{Error, Result};
pub use fetch::{FileTransport, Fetcher, HttpTransport};
pub use format::{format_bytes, format_duration, format_progress, format_rate};
pub use model::{
    DownloadFile, DownloadKind, DownloadOutcome, DownloadScope, FetchedFile, GalleryInfo,
    MediaItem, SavedDownload, Selection,
};
pub use progress::{
    DownloadObserver, DownloadProgress, NoProgress, Phase, ProgressEvent, ProgressTracker,
};
pub use resolver::SelectionResolver;
pub use save::{DirectorySink, SaveSink};

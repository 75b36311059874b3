//! The gallery download coordinator: entry points, cancellation and the
//! attempt state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{GalleryApi, HttpGalleryApi};
use crate::archive::build_archive;
use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::fetch::{FileTransport, Fetcher, HttpTransport};
use crate::model::{
    DownloadFile, DownloadKind, DownloadOutcome, DownloadScope, GalleryInfo, SavedDownload,
    Selection,
};
use crate::progress::{DownloadProgress, ProgressEvent, ProgressTracker};
use crate::resolver::SelectionResolver;
use crate::save::{DirectorySink, SaveSink};

/// Title used in archive names when the gallery has none.
const FALLBACK_TITLE: &str = "photos";

/// Replaces characters that are invalid in file names on common platforms.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Archive name for a download entry point, e.g. `Smith Wedding_all.zip`.
#[must_use]
pub fn archive_name(title: &str, kind: DownloadKind) -> String {
    let title = sanitize_filename(title);
    let title = if title.is_empty() {
        FALLBACK_TITLE
    } else {
        title.as_str()
    };
    format!("{title}_{}.zip", kind.archive_suffix())
}

/// Resets the shared state of one attempt exactly once, however it ends.
struct Attempt<'a> {
    active: &'a Mutex<Option<CancellationToken>>,
    progress: &'a ProgressTracker,
    token: CancellationToken,
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        self.progress.apply(ProgressEvent::Reset);
        lock(self.active).take();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives bulk downloads for one gallery.
///
/// At most one download runs at a time. Progress is observable through
/// [`progress`](Self::progress) and [`subscribe`](Self::subscribe).
pub struct GalleryDownloader<
    A: GalleryApi = HttpGalleryApi,
    T: FileTransport = HttpTransport,
    S: SaveSink = DirectorySink,
> {
    resolver: SelectionResolver<A>,
    fetcher: Fetcher<T>,
    sink: S,
    title: String,
    locked: AtomicBool,
    active: Mutex<Option<CancellationToken>>,
    progress: ProgressTracker,
}

impl<A: GalleryApi, T: FileTransport, S: SaveSink> GalleryDownloader<A, T, S> {
    /// Creates a downloader for a gallery whose metadata is already known.
    #[must_use]
    pub fn new(api: A, transport: T, sink: S, config: DownloadConfig, info: &GalleryInfo) -> Self {
        Self {
            resolver: SelectionResolver::new(api),
            fetcher: Fetcher::with_transport(transport, config),
            sink,
            title: info.title.clone(),
            locked: AtomicBool::new(info.downloads_locked),
            active: Mutex::new(None),
            progress: ProgressTracker::new(),
        }
    }

    /// Loads gallery metadata and media, returning the downloader together
    /// with the server-side selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the gallery cannot be loaded (not found, expired,
    /// transport failure).
    pub async fn open(
        api: A,
        transport: T,
        sink: S,
        config: DownloadConfig,
    ) -> Result<(Self, GalleryInfo, Selection)> {
        let (info, media) = futures::try_join!(api.gallery_info(), api.list_media())?;
        log::info!(
            "Opened gallery {:?}: {} media, downloads {}",
            info.title,
            media.len(),
            if info.downloads_locked { "locked" } else { "available" }
        );
        let selection = Selection::from_media(&media);
        let downloader = Self::new(api, transport, sink, config, &info);
        Ok((downloader, info, selection))
    }

    /// Gallery title used for archive names.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns a reference to the underlying API client.
    #[must_use]
    pub const fn api(&self) -> &A {
        self.resolver.api()
    }

    /// Whether downloads are payment-locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Whether no download is running.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        lock(&self.active).is_none()
    }

    /// Whether the trigger for `kind` should be enabled.
    #[must_use]
    pub fn can_download(&self, kind: DownloadKind, selection: &Selection) -> bool {
        self.is_idle()
            && !self.is_locked()
            && (kind.scope() == DownloadScope::All || !selection.is_empty())
    }

    /// Current progress snapshot.
    #[must_use]
    pub fn progress(&self) -> DownloadProgress {
        self.progress.snapshot()
    }

    /// Receiver woken on every progress change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    /// Downloads the selected media as `{title}_selected.zip`.
    ///
    /// # Errors
    ///
    /// See [`download`](Self::download).
    pub async fn download_selected(&self, selection: &Selection) -> Result<DownloadOutcome> {
        self.download(DownloadKind::Selected, selection).await
    }

    /// Downloads every media item as `{title}_all.zip`.
    ///
    /// # Errors
    ///
    /// See [`download`](Self::download).
    pub async fn download_all(&self) -> Result<DownloadOutcome> {
        self.download(DownloadKind::All, &Selection::default()).await
    }

    /// Exports the selected media for printing as `{title}_for_printing.zip`.
    ///
    /// # Errors
    ///
    /// See [`download`](Self::download).
    pub async fn export_for_printing(&self, selection: &Selection) -> Result<DownloadOutcome> {
        self.download(DownloadKind::PrintExport, selection).await
    }

    /// Runs one download attempt for `kind`.
    ///
    /// Locked galleries and empty selections return without contacting the
    /// server. Cancellation and the locked state are outcomes, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if a download is already running, and any
    /// resolution, transport, archive or save failure.
    pub async fn download(&self, kind: DownloadKind, selection: &Selection) -> Result<DownloadOutcome> {
        if self.is_locked() {
            return Ok(DownloadOutcome::Locked);
        }
        if kind.scope() == DownloadScope::Selected && selection.is_empty() {
            return Ok(DownloadOutcome::NothingToDownload);
        }

        let attempt = self.begin()?;
        log::info!("Starting {} download of {:?}", kind.archive_suffix(), self.title);
        let result = self.run(kind, selection, &attempt.token).await;
        drop(attempt);
        self.finish(result)
    }

    /// Downloads one media item directly under its own name.
    ///
    /// # Errors
    ///
    /// Same as [`download`](Self::download).
    pub async fn download_media(&self, media_id: &str) -> Result<DownloadOutcome> {
        if self.is_locked() {
            return Ok(DownloadOutcome::Locked);
        }

        let attempt = self.begin()?;
        log::info!("Starting download of media {media_id}");
        let started = Instant::now();
        let result = async {
            let file = tokio::select! {
                biased;
                () = attempt.token.cancelled() => return Err(Error::Cancelled),
                file = self.resolver.resolve_media(media_id) => file?,
            };
            self.progress.apply(ProgressEvent::Resolved {
                files_total: 1,
                bytes_total: file.size_bytes,
            });
            self.save_single(&file, &attempt.token, started).await
        }
        .await;
        drop(attempt);
        self.finish(result)
    }

    /// Signals the running download to stop.
    ///
    /// Returns false if nothing was running or it was already cancelled.
    pub fn cancel(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(token) if !token.is_cancelled() => {
                log::info!("Cancelling download of {:?}", self.title);
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Registers a new attempt: fresh token, progress in `Downloading`.
    fn begin(&self) -> Result<Attempt<'_>> {
        let mut active = lock(&self.active);
        if active.is_some() {
            return Err(Error::Busy);
        }
        let token = CancellationToken::new();
        *active = Some(token.clone());
        drop(active);

        self.progress.apply(ProgressEvent::Begin);
        Ok(Attempt {
            active: &self.active,
            progress: &self.progress,
            token,
        })
    }

    async fn run(
        &self,
        kind: DownloadKind,
        selection: &Selection,
        token: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let started = Instant::now();

        let files = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::Cancelled),
            files = self.resolver.resolve(kind.scope(), selection) => files?,
        };
        if files.is_empty() {
            log::info!("Nothing to download for {} scope", kind.scope());
            return Ok(DownloadOutcome::NothingToDownload);
        }

        self.progress.apply(ProgressEvent::Resolved {
            files_total: files.len(),
            bytes_total: files.iter().map(|f| f.size_bytes).fold(0, u64::saturating_add),
        });

        if let [single] = files.as_slice() {
            return self.save_single(single, token, started).await;
        }

        let fetched = self.fetcher.fetch_all(&files, token, &self.progress).await?;
        let bytes: u64 = fetched.iter().map(|f| f.bytes.len() as u64).sum();
        let count = fetched.len();

        self.progress.apply(ProgressEvent::Assembling);
        let archive = tokio::task::spawn_blocking(move || build_archive(&fetched)).await??;

        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let path = self.sink.save(&archive_name(&self.title, kind), archive).await?;

        Ok(DownloadOutcome::Saved(SavedDownload {
            path,
            files: count,
            bytes,
            elapsed: started.elapsed(),
        }))
    }

    /// Fast path: fetch one file and save it under its own name.
    async fn save_single(
        &self,
        file: &DownloadFile,
        token: &CancellationToken,
        started: Instant,
    ) -> Result<DownloadOutcome> {
        let mut fetched = self
            .fetcher
            .fetch_all(std::slice::from_ref(file), token, &self.progress)
            .await?;
        let Some(single) = fetched.pop() else {
            return Err(Error::Resolution(format!("no body fetched for {}", file.filename)));
        };

        let bytes = single.bytes.len() as u64;
        let path = self.sink.save(&single.filename, single.bytes).await?;
        Ok(DownloadOutcome::Saved(SavedDownload {
            path,
            files: 1,
            bytes,
            elapsed: started.elapsed(),
        }))
    }

    /// Maps an attempt's result onto outcomes and logs it.
    fn finish(&self, result: Result<DownloadOutcome>) -> Result<DownloadOutcome> {
        match result {
            Ok(outcome) => {
                if let DownloadOutcome::Saved(saved) = &outcome {
                    log::info!(
                        "Download complete: {} ({} files, {} bytes)",
                        saved.path.display(),
                        saved.files,
                        saved.bytes
                    );
                }
                Ok(outcome)
            }
            Err(Error::Cancelled) => {
                log::info!("Download cancelled");
                Ok(DownloadOutcome::Cancelled)
            }
            Err(Error::Locked) => {
                self.locked.store(true, Ordering::Release);
                log::info!("Downloads for {:?} are locked until payment", self.title);
                Ok(DownloadOutcome::Locked)
            }
            Err(e) => {
                log::error!("Download failed: {e}");
                Err(e)
            }
        }
    }
}

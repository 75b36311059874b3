//! Download progress: the snapshot reducer, the shared tracker and the
//! observer callbacks the fetcher reports into.

use tokio::sync::watch;

/// Coarse state of a download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No download is running.
    #[default]
    Idle,
    /// Resolving the file list or fetching bodies.
    Downloading,
    /// All bodies are in; the archive is being assembled.
    Zipping,
}

/// Aggregate progress of one download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadProgress {
    pub phase: Phase,
    /// Files whose body stream fully drained.
    pub files_completed: usize,
    /// Size of the resolved file set.
    pub files_total: usize,
    /// Bytes received across all files.
    pub bytes_loaded: u64,
    /// Sum of declared file sizes. An estimate, not authoritative.
    pub bytes_total: u64,
}

/// Inputs to the progress reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A download was triggered.
    Begin,
    /// The file list is known.
    Resolved { files_total: usize, bytes_total: u64 },
    /// A file fetch started. Leaves the snapshot unchanged: neither
    /// counter moves until bytes arrive or the body drains.
    FileStarted,
    /// A chunk of this many bytes arrived for some file.
    BytesReceived(u64),
    /// A file's body fully drained.
    FileCompleted,
    /// Fetching finished; archive assembly starts.
    Assembling,
    /// The attempt ended (saved, failed or cancelled).
    Reset,
}

impl DownloadProgress {
    /// The idle snapshot.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            files_completed: 0,
            files_total: 0,
            bytes_loaded: 0,
            bytes_total: 0,
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Produces the next snapshot.
    ///
    /// Byte and completion events are additive, so concurrent fetches can
    /// report in any order. Anything but `Begin`/`Reset` is ignored while
    /// idle, which keeps late callbacks from reviving a finished attempt.
    #[must_use]
    pub fn apply(self, event: ProgressEvent) -> Self {
        match (self.phase, event) {
            (_, ProgressEvent::Begin) => Self {
                phase: Phase::Downloading,
                ..Self::idle()
            },
            (_, ProgressEvent::Reset) => Self::idle(),
            (Phase::Downloading, ProgressEvent::Resolved { files_total, bytes_total }) => Self {
                files_total,
                bytes_total,
                ..self
            },
            (Phase::Downloading, ProgressEvent::BytesReceived(n)) => Self {
                bytes_loaded: self.bytes_loaded.saturating_add(n),
                ..self
            },
            (Phase::Downloading, ProgressEvent::FileCompleted) => Self {
                files_completed: (self.files_completed + 1).min(self.files_total),
                ..self
            },
            (Phase::Downloading, ProgressEvent::Assembling) => Self {
                phase: Phase::Zipping,
                ..self
            },
            _ => self,
        }
    }

    /// Completion ratio in `0.0..=1.0`, clamped because `bytes_total` is an
    /// estimate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.bytes_total == 0 {
            return 0.0;
        }
        (self.bytes_loaded as f64 / self.bytes_total as f64).min(1.0)
    }
}

/// Trait for receiving fetch progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait DownloadObserver: Send + Sync {
    /// Called before a batch of fetches is issued.
    fn on_batch_start(&self, _index: usize, _len: usize) {}

    /// Called when a file fetch starts.
    fn on_file_start(&self, _name: &str, _size: u64) {}

    /// Called for every chunk with the number of bytes it carried.
    fn on_progress(&self, _name: &str, _bytes_delta: u64) {}

    /// Called once a file's body has fully drained.
    fn on_file_complete(&self, _name: &str, _bytes: u64) {}

    /// Called when a file fetch fails. Not called for cancellation.
    fn on_error(&self, _name: &str, _error: &str) {}
}

/// A null observer that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadObserver for NoProgress {}

/// Owns the live [`DownloadProgress`] of one gallery view and publishes every
/// change to subscribers.
#[derive(Debug)]
pub struct ProgressTracker {
    tx: watch::Sender<DownloadProgress>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DownloadProgress::idle());
        Self { tx }
    }

    /// Applies an event atomically.
    pub fn apply(&self, event: ProgressEvent) {
        self.tx.send_if_modified(|progress| {
            let next = progress.apply(event);
            let changed = next != *progress;
            *progress = next;
            changed
        });
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DownloadProgress {
        *self.tx.borrow()
    }

    /// Receiver that wakes on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DownloadProgress> {
        self.tx.subscribe()
    }
}

impl DownloadObserver for ProgressTracker {
    fn on_file_start(&self, _name: &str, _size: u64) {
        self.apply(ProgressEvent::FileStarted);
    }

    fn on_progress(&self, _name: &str, bytes_delta: u64) {
        self.apply(ProgressEvent::BytesReceived(bytes_delta));
    }

    fn on_file_complete(&self, _name: &str, _bytes: u64) {
        self.apply(ProgressEvent::FileCompleted);
    }
}

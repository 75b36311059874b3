//! Gallery and download data types.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One remote asset to retrieve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFile {
    /// Fetch target.
    pub url: String,
    /// Name used inside the archive, or as the save name on the fast path.
    pub filename: String,
    /// Declared size, used as the progress denominator.
    pub size_bytes: u64,
}

/// A file whose body has been fully drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// Name taken from the resolved [`DownloadFile`].
    pub filename: String,
    /// Complete body.
    pub bytes: Vec<u8>,
}

/// Which subset of gallery media to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadScope {
    /// Only media the client marked as selected.
    Selected,
    /// Every media item in the gallery.
    All,
}

impl DownloadScope {
    /// Query-string value understood by the gallery API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::All => "all",
        }
    }
}

impl fmt::Display for DownloadScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bulk download entry points offered by a gallery view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// "Download selected".
    Selected,
    /// "Download all".
    All,
    /// "Export for printing": the selection, packaged for a print lab.
    PrintExport,
}

impl DownloadKind {
    /// Scope resolved for this entry point.
    #[must_use]
    pub const fn scope(self) -> DownloadScope {
        match self {
            Self::Selected | Self::PrintExport => DownloadScope::Selected,
            Self::All => DownloadScope::All,
        }
    }

    /// Suffix appended to the gallery title in the archive name.
    #[must_use]
    pub const fn archive_suffix(self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::All => "all",
            Self::PrintExport => "for_printing",
        }
    }
}

/// Gallery metadata returned by the share-link endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryInfo {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub downloads_locked: bool,
    /// Token of the invoice that unlocks downloads, when one is pending.
    #[serde(default)]
    pub invoice_token: Option<String>,
}

/// One media item in a gallery listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub compressed_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Client-side selection state for a gallery.
///
/// Keeps the gallery's media order so selection sync and display are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    order: Vec<String>,
    selected: HashSet<String>,
}

impl Selection {
    /// Creates an empty selection over the given media ids.
    #[must_use]
    pub fn new(media_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            order: media_ids.into_iter().collect(),
            selected: HashSet::new(),
        }
    }

    /// Builds a selection from a media listing, pre-selecting what the
    /// server reports as already selected.
    #[must_use]
    pub fn from_media(media: &[MediaItem]) -> Self {
        Self {
            order: media.iter().map(|m| m.id.clone()).collect(),
            selected: media
                .iter()
                .filter(|m| m.is_selected)
                .map(|m| m.id.clone())
                .collect(),
        }
    }

    /// Toggles an id. Returns the new membership, or `None` for unknown ids.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        if !self.contains_media(id) {
            return None;
        }
        if self.selected.remove(id) {
            Some(false)
        } else {
            self.selected.insert(id.to_string());
            Some(true)
        }
    }

    /// Marks an id as selected. Returns false for unknown ids.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.contains_media(id) {
            return false;
        }
        self.selected.insert(id.to_string());
        true
    }

    /// Marks an id as not selected. Returns false for unknown ids.
    pub fn deselect(&mut self, id: &str) -> bool {
        if !self.contains_media(id) {
            return false;
        }
        self.selected.remove(id);
        true
    }

    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    fn contains_media(&self, id: &str) -> bool {
        self.order.iter().any(|m| m == id)
    }

    /// Number of selected media items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// True when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Number of media items in the gallery.
    #[must_use]
    pub fn media_count(&self) -> usize {
        self.order.len()
    }

    /// Selected ids in gallery order.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.selected.contains(*id))
            .cloned()
            .collect()
    }

    /// Unselected ids in gallery order.
    #[must_use]
    pub fn unselected_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| !self.selected.contains(*id))
            .cloned()
            .collect()
    }
}

/// A download that reached the save target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDownload {
    /// Where the archive or single file was written.
    pub path: PathBuf,
    /// Number of gallery files included.
    pub files: usize,
    /// Total bytes fetched.
    pub bytes: u64,
    /// Wall time from trigger to save.
    pub elapsed: Duration,
}

/// How a download attempt ended, short of a hard failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The archive (or single file) was saved.
    Saved(SavedDownload),
    /// The user cancelled; nothing was saved.
    Cancelled,
    /// Downloads are payment-locked; the locked flag is now set.
    Locked,
    /// Nothing was selected, or the gallery resolved to no files.
    NothingToDownload,
}

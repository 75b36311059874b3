//! Turns a download scope into the concrete list of files to fetch.

use std::collections::HashSet;

use crate::api::GalleryApi;
use crate::error::{Error, Result};
use crate::model::{DownloadFile, DownloadScope, Selection};

/// Resolves download scopes against the gallery API.
pub struct SelectionResolver<A: GalleryApi> {
    api: A,
}

impl<A: GalleryApi> SelectionResolver<A> {
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self { api }
    }

    /// Returns a reference to the underlying API client.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Resolves `scope` into the server's ordered file list.
    ///
    /// For [`DownloadScope::Selected`] the current selection is pushed to
    /// the server first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] for payment-gated galleries, and a
    /// resolution or transport error otherwise.
    pub async fn resolve(
        &self,
        scope: DownloadScope,
        selection: &Selection,
    ) -> Result<Vec<DownloadFile>> {
        if scope == DownloadScope::Selected {
            self.sync_selection(selection).await?;
        }

        let files = self.api.download_files(scope).await?;
        validate(&files)?;
        log::debug!("Resolved {} file(s) for scope {scope}", files.len());
        Ok(files)
    }

    /// Looks up the direct download of a single media item.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub async fn resolve_media(&self, media_id: &str) -> Result<DownloadFile> {
        let file = self.api.media_download(media_id).await?;
        validate(std::slice::from_ref(&file))?;
        Ok(file)
    }

    /// Pushes selected and unselected ids concurrently, skipping empty sets.
    async fn sync_selection(&self, selection: &Selection) -> Result<()> {
        let selected = selection.selected_ids();
        let unselected = selection.unselected_ids();

        let push = |ids: Vec<String>, flag: bool| async move {
            if ids.is_empty() {
                Ok(())
            } else {
                self.api.update_selection(&ids, flag).await
            }
        };

        futures::try_join!(push(selected, true), push(unselected, false))?;
        Ok(())
    }
}

/// Rejects entries that cannot be fetched or would collide in an archive.
fn validate(files: &[DownloadFile]) -> Result<()> {
    let mut seen = HashSet::with_capacity(files.len());
    for file in files {
        if file.filename.is_empty() || file.url.is_empty() {
            return Err(Error::Resolution(format!(
                "server returned an incomplete entry (url {:?}, filename {:?})",
                file.url, file.filename
            )));
        }
        if !seen.insert(file.filename.as_str()) {
            return Err(Error::Resolution(format!(
                "server returned {:?} more than once",
                file.filename
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{GalleryInfo, MediaItem};
    use std::sync::Mutex;

    /// Scripted gallery API that records the calls it receives.
    #[derive(Default)]
    pub(crate) struct MockGalleryApi {
        pub(crate) info: Option<GalleryInfo>,
        pub(crate) media: Vec<MediaItem>,
        pub(crate) files: Vec<DownloadFile>,
        pub(crate) locked: bool,
        pub(crate) fail_status: Option<u16>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl MockGalleryApi {
        pub(crate) fn with_files(files: Vec<DownloadFile>) -> Self {
            Self {
                files,
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.locked {
                return Err(Error::Locked);
            }
            if let Some(status) = self.fail_status {
                return Err(Error::Status {
                    status,
                    url: "mock".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl GalleryApi for MockGalleryApi {
        async fn gallery_info(&self) -> Result<GalleryInfo> {
            self.calls.lock().unwrap().push("info".to_string());
            self.info.clone().ok_or(Error::GalleryNotFound)
        }

        async fn list_media(&self) -> Result<Vec<MediaItem>> {
            self.calls.lock().unwrap().push("media".to_string());
            Ok(self.media.clone())
        }

        async fn update_selection(&self, media_ids: &[String], selected: bool) -> Result<()> {
            self.record(format!("select {} {selected}", media_ids.join(",")))
        }

        async fn download_files(&self, scope: DownloadScope) -> Result<Vec<DownloadFile>> {
            self.record(format!("files {scope}"))?;
            Ok(self.files.clone())
        }

        async fn media_download(&self, media_id: &str) -> Result<DownloadFile> {
            self.record(format!("media {media_id}"))?;
            self.files
                .iter()
                .find(|f| f.filename.starts_with(media_id))
                .cloned()
                .ok_or(Error::GalleryNotFound)
        }
    }

    pub(crate) fn file(name: &str, size: u64) -> DownloadFile {
        DownloadFile {
            url: format!("mem://{name}"),
            filename: name.to_string(),
            size_bytes: size,
        }
    }

    fn selection(ids: &[&str], selected: &[&str]) -> Selection {
        let mut s = Selection::new(ids.iter().map(|id| (*id).to_string()));
        for id in selected {
            s.select(id);
        }
        s
    }

    #[tokio::test]
    async fn all_scope_skips_selection_sync() {
        let resolver = SelectionResolver::new(MockGalleryApi::with_files(vec![file("a.jpg", 1)]));
        let files = resolver
            .resolve(DownloadScope::All, &selection(&["a"], &["a"]))
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(resolver.api().calls(), vec!["files all"]);
    }

    #[tokio::test]
    async fn selected_scope_syncs_both_sets_first() {
        let resolver = SelectionResolver::new(MockGalleryApi::with_files(vec![file("b.jpg", 1)]));
        resolver
            .resolve(DownloadScope::Selected, &selection(&["a", "b", "c"], &["b"]))
            .await
            .unwrap();

        let calls = resolver.api().calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[..2].contains(&"select b true".to_string()));
        assert!(calls[..2].contains(&"select a,c false".to_string()));
        assert_eq!(calls[2], "files selected");
    }

    #[tokio::test]
    async fn empty_sets_are_not_pushed() {
        let resolver = SelectionResolver::new(MockGalleryApi::with_files(vec![]));
        resolver
            .resolve(DownloadScope::Selected, &selection(&["a", "b"], &["a", "b"]))
            .await
            .unwrap();
        assert_eq!(resolver.api().calls(), vec!["select a,b true", "files selected"]);
    }

    #[tokio::test]
    async fn order_is_preserved() {
        let files = vec![file("z.jpg", 1), file("a.jpg", 1), file("m.jpg", 1)];
        let resolver = SelectionResolver::new(MockGalleryApi::with_files(files.clone()));
        let resolved = resolver
            .resolve(DownloadScope::All, &Selection::default())
            .await
            .unwrap();
        assert_eq!(resolved, files);
    }

    #[tokio::test]
    async fn locked_is_reported_distinctly() {
        let resolver = SelectionResolver::new(MockGalleryApi {
            locked: true,
            ..MockGalleryApi::default()
        });
        let err = resolver
            .resolve(DownloadScope::All, &Selection::default())
            .await
            .unwrap_err();
        assert!(err.is_locked());
    }

    #[tokio::test]
    async fn incomplete_entries_are_rejected() {
        let mut bad = file("x.jpg", 1);
        bad.filename.clear();
        let resolver = SelectionResolver::new(MockGalleryApi::with_files(vec![bad]));
        let err = resolver
            .resolve(DownloadScope::All, &Selection::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let files = vec![
            file("IMG_0001.jpg", 1),
            file("IMG_0002.jpg", 1),
            file("IMG_0001.jpg", 1),
        ];
        let resolver = SelectionResolver::new(MockGalleryApi::with_files(files));
        let err = resolver
            .resolve(DownloadScope::All, &Selection::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Resolution(ref msg) if msg.contains("IMG_0001.jpg")),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn resolve_media_uses_direct_lookup() {
        let resolver = SelectionResolver::new(MockGalleryApi::with_files(vec![file("m7.jpg", 9)]));
        let single = resolver.resolve_media("m7").await.unwrap();
        assert_eq!(single.filename, "m7.jpg");
        assert_eq!(resolver.api().calls(), vec!["media m7"]);
    }
}

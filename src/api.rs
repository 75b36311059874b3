//! Client for the studio's gallery REST API.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{DownloadFile, DownloadScope, GalleryInfo, MediaItem};

/// The gallery endpoints the download pipeline consumes.
///
/// Implementations must report a payment-locked gallery as [`Error::Locked`].
#[async_trait]
pub trait GalleryApi: Send + Sync {
    /// Gallery metadata, including the locked flag.
    async fn gallery_info(&self) -> Result<GalleryInfo>;

    /// Media items in gallery order.
    async fn list_media(&self) -> Result<Vec<MediaItem>>;

    /// Sets the selection flag of `media_ids` on the server.
    async fn update_selection(&self, media_ids: &[String], selected: bool) -> Result<()>;

    /// Authoritative, ordered list of files to fetch for `scope`.
    async fn download_files(&self, scope: DownloadScope) -> Result<Vec<DownloadFile>>;

    /// Direct download of one media item.
    async fn media_download(&self, media_id: &str) -> Result<DownloadFile>;
}

#[derive(Deserialize)]
struct MediaResponse {
    media: Vec<MediaItem>,
}

#[derive(Deserialize)]
struct FilesResponse {
    files: Vec<DownloadFile>,
}

#[derive(Serialize)]
struct SelectRequest<'a> {
    media_ids: &'a [String],
    selected: bool,
}

/// [`GalleryApi`] over HTTP for one share-link token.
#[derive(Debug, Clone)]
pub struct HttpGalleryApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpGalleryApi {
    /// Creates a client for the gallery behind `token`.
    #[must_use]
    pub fn new(client: Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/gallery/{}", self.base_url, self.token)
        } else {
            format!("{}/gallery/{}/{path}", self.base_url, self.token)
        }
    }
}

/// Maps gallery status codes onto the error taxonomy.
fn check_status(response: Response) -> Result<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::PAYMENT_REQUIRED => Err(Error::Locked),
        StatusCode::NOT_FOUND => Err(Error::GalleryNotFound),
        StatusCode::GONE => Err(Error::GalleryExpired),
        status => Err(Error::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        }),
    }
}

#[async_trait]
impl GalleryApi for HttpGalleryApi {
    async fn gallery_info(&self) -> Result<GalleryInfo> {
        let response = self.client.get(self.url("")).send().await?;
        Ok(check_status(response)?.json().await?)
    }

    async fn list_media(&self) -> Result<Vec<MediaItem>> {
        let response = self.client.get(self.url("media")).send().await?;
        let body: MediaResponse = check_status(response)?.json().await?;
        Ok(body.media)
    }

    async fn update_selection(&self, media_ids: &[String], selected: bool) -> Result<()> {
        let response = self
            .client
            .post(self.url("select"))
            .json(&SelectRequest { media_ids, selected })
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }

    async fn download_files(&self, scope: DownloadScope) -> Result<Vec<DownloadFile>> {
        let response = self
            .client
            .get(self.url("download-files"))
            .query(&[("scope", scope.as_str())])
            .send()
            .await?;
        let body: FilesResponse = check_status(response)?.json().await?;
        Ok(body.files)
    }

    async fn media_download(&self, media_id: &str) -> Result<DownloadFile> {
        let response = self
            .client
            .get(self.url(&format!("media/{media_id}/download")))
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }
}

//! Batched, cancellable fetching of gallery files.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt, future};
use tokio_util::sync::CancellationToken;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::model::{DownloadFile, FetchedFile};
use crate::progress::DownloadObserver;

/// A response body delivered chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Opens body streams for file URLs.
#[async_trait]
pub trait FileTransport: Send + Sync {
    /// Starts fetching `url`. Fails on non-success responses.
    async fn open(&self, url: &str) -> Result<ByteStream>;
}

/// [`FileTransport`] backed by a reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FileTransport for HttpTransport {
    async fn open(&self, url: &str) -> Result<ByteStream> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes_stream().map_err(Error::from).boxed())
    }
}

/// Fetches resolved files in sequential batches of concurrent requests.
pub struct Fetcher<T: FileTransport = HttpTransport> {
    transport: T,
    config: DownloadConfig,
}

impl Fetcher<HttpTransport> {
    /// Creates a fetcher over HTTP.
    #[must_use]
    pub const fn new(client: reqwest::Client, config: DownloadConfig) -> Self {
        Self {
            transport: HttpTransport::new(client),
            config,
        }
    }
}

impl<T: FileTransport> Fetcher<T> {
    /// Creates a fetcher with a custom transport implementation.
    #[must_use]
    pub const fn with_transport(transport: T, config: DownloadConfig) -> Self {
        Self { transport, config }
    }

    /// Returns a reference to the download configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Fetches every file and returns the bodies in input order.
    ///
    /// Files are split into consecutive batches of
    /// [`batch_size`](DownloadConfig::batch_size). Each batch runs all of its
    /// fetches concurrently and waits for every one of them to settle before
    /// the next batch starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] once `token` is cancelled. Any other
    /// failure aborts the remaining fetches of the batch and is returned;
    /// no later batch starts.
    pub async fn fetch_all(
        &self,
        files: &[DownloadFile],
        token: &CancellationToken,
        observer: &dyn DownloadObserver,
    ) -> Result<Vec<FetchedFile>> {
        let batch_size = self.config.batch_size();
        let batch_count = files.len().div_ceil(batch_size);
        let mut fetched = Vec::with_capacity(files.len());

        for (index, batch) in files.chunks(batch_size).enumerate() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            log::debug!(
                "Starting batch {}/{batch_count} ({} files)",
                index + 1,
                batch.len()
            );
            observer.on_batch_start(index, batch.len());

            // Cancelled by the user token, or by the first failing sibling.
            let abort = token.child_token();
            let results = future::join_all(
                batch
                    .iter()
                    .map(|file| self.fetch_in_batch(file, &abort, observer)),
            )
            .await;

            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            for result in results {
                match result {
                    Ok(file) => fetched.push(file),
                    // Aborted by a failing sibling, whose error is returned instead.
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(fetched)
    }

    /// Fetches one file and, on failure, aborts its batch siblings.
    async fn fetch_in_batch(
        &self,
        file: &DownloadFile,
        abort: &CancellationToken,
        observer: &dyn DownloadObserver,
    ) -> Result<FetchedFile> {
        let result = self.fetch_file(file, abort, observer).await;
        if let Err(ref e) = result
            && !e.is_cancelled()
        {
            observer.on_error(&file.filename, &e.to_string());
            abort.cancel();
        }
        result
    }

    /// Fetches a single file, reporting each chunk as it arrives.
    ///
    /// Completion is reported only after the body has fully drained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `abort` fires, [`Error::Stalled`] if
    /// the stall timeout elapses before the response arrives or between
    /// chunks, or the transport error.
    pub async fn fetch_file(
        &self,
        file: &DownloadFile,
        abort: &CancellationToken,
        observer: &dyn DownloadObserver,
    ) -> Result<FetchedFile> {
        observer.on_file_start(&file.filename, file.size_bytes);

        let mut stream = tokio::select! {
            biased;
            () = abort.cancelled() => return Err(Error::Cancelled),
            opened = self.within_stall_timeout(file, self.transport.open(&file.url)) => {
                opened?
            }
        };

        // Declared sizes can be stale; don't trust them for huge reservations.
        let reserve = usize::try_from(file.size_bytes.min(64 * 1024 * 1024)).unwrap_or(0);
        let mut buffer = Vec::with_capacity(reserve);

        loop {
            let chunk = tokio::select! {
                biased;
                () = abort.cancelled() => return Err(Error::Cancelled),
                next = self.next_chunk(&mut stream, file) => next?,
            };
            let Some(chunk) = chunk else { break };
            buffer.extend_from_slice(&chunk);
            observer.on_progress(&file.filename, chunk.len() as u64);
        }

        observer.on_file_complete(&file.filename, buffer.len() as u64);
        Ok(FetchedFile {
            filename: file.filename.clone(),
            bytes: buffer,
        })
    }

    async fn next_chunk(
        &self,
        stream: &mut ByteStream,
        file: &DownloadFile,
    ) -> Result<Option<Bytes>> {
        self.within_stall_timeout(file, async { stream.next().await.transpose() })
            .await
    }

    /// Fails `fut` with [`Error::Stalled`] if it does not resolve within the
    /// stall timeout. Covers both waiting for response headers and waiting
    /// between chunks.
    async fn within_stall_timeout<R>(
        &self,
        file: &DownloadFile,
        fut: impl Future<Output = Result<R>>,
    ) -> Result<R> {
        let Some(timeout) = self.config.stall_timeout() else {
            return fut.await;
        };
        tokio::time::timeout(timeout, fut).await.map_err(|_| {
            log::warn!("No data for {} in {timeout:?}", file.filename);
            Error::Stalled {
                filename: file.filename.clone(),
                timeout,
            }
        })?
    }
}

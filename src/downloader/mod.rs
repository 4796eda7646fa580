mod error;
mod executor;
mod fetcher;
mod merger;
mod planer;
mod prober;
mod progress;

pub use error::DownloadError;
pub use progress::ProgressFn;

use std::future::Future;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use planer::Segment;
use progress::SegmentProgress;

/// Immutable input for one download session
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Destination directory; created if absent.
    pub save_path: PathBuf,
    pub file_name: String,
    /// Requested worker count: 0 picks the machine's parallelism, 1 is
    /// promoted to 2 so the segmented path always has company.
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DownloadStatus {
    Downloading,
    Downloaded,
    Failed,
}

/// Terminal record of one download session, never reused
#[derive(Debug, Clone, Serialize)]
pub struct DownloadItem {
    pub url: String,
    pub file_name: String,
    pub save_path: PathBuf,
    pub status: DownloadStatus,
    pub downloaded_time: Option<SystemTime>,
    pub error_message: Option<String>,
}

pub fn effective_workers(requested: usize) -> usize {
    match requested {
        0 => std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4),
        1 => 2,
        n => n,
    }
}

/// Races an operation against the session's cancellation token. Every
/// suspension point in a session sits under one of these.
pub(crate) async fn with_cancel<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T, DownloadError>>,
) -> Result<T, DownloadError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DownloadError::Canceled),
        result = operation => result,
    }
}

/// Segmented parallel HTTP downloader.
///
/// Holds the process-wide connection pool; everything per-session (limiter,
/// progress table, scratch directory, cancellation) is created inside
/// [`Downloader::download`] and torn down on every exit path.
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Runs one session to its terminal state: probe the server, pick the
    /// segmented or single-stream path, fetch, merge, clean up. The returned
    /// item is `Downloaded` with a completion timestamp, or `Failed` with
    /// one descriptive message; there is no partial success.
    pub async fn download(
        &self,
        request: DownloadRequest,
        progress: Option<ProgressFn>,
        cancel: CancellationToken,
    ) -> DownloadItem {
        let mut item = DownloadItem {
            url: request.url.clone(),
            file_name: request.file_name.clone(),
            save_path: request.save_path.clone(),
            status: DownloadStatus::Downloading,
            downloaded_time: None,
            error_message: None,
        };

        match self.run(&request, progress, &cancel).await {
            Ok(()) => {
                item.status = DownloadStatus::Downloaded;
                item.downloaded_time = Some(SystemTime::now());
            }
            Err(err) => {
                item.status = DownloadStatus::Failed;
                item.error_message = Some(err.to_string());
            }
        }

        item
    }

    async fn run(
        &self,
        request: &DownloadRequest,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let workers = effective_workers(request.workers);

        let ranged = with_cancel(
            cancel,
            prober::supports_ranges(&self.client, &request.url),
        )
        .await?;

        let segments = if ranged {
            let total = with_cancel(
                cancel,
                prober::content_length(&self.client, &request.url),
            )
            .await?;
            match total {
                Some(total) => planer::plan(total, workers),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        if segments.is_empty() {
            self.run_single(request, progress, cancel).await
        } else {
            self.run_segmented(request, &segments, workers, progress, cancel)
                .await
        }
    }

    async fn run_segmented(
        &self,
        request: &DownloadRequest,
        segments: &[Segment],
        workers: usize,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        fs::create_dir_all(&request.save_path).await?;
        let scratch = tempfile::Builder::new()
            .prefix(".parget-")
            .tempdir_in(&request.save_path)?;

        let table = SegmentProgress::new(segments.len());
        let ticker = progress
            .clone()
            .map(|sink| progress::start_aggregator(table.clone(), sink));

        // Child token: a failing segment cancels its siblings without
        // touching the caller's token
        let session_cancel = cancel.child_token();
        let fetched = executor::fetch_all(
            &self.client,
            &request.url,
            segments,
            scratch.path(),
            workers,
            &table,
            &session_cancel,
        )
        .await;

        if let Some(ticker) = ticker {
            ticker.abort();
            // Wait out a tick already in flight so no stale report can land
            // after the final 100
            let _ = ticker.await;
        }

        if let Err(err) = fetched {
            // All fetchers have been awaited, nothing is writing here anymore
            let _ = scratch.close();
            return Err(err);
        }

        if let Some(sink) = progress.as_ref() {
            sink(100);
        }

        let parts: Vec<PathBuf> = segments
            .iter()
            .map(|segment| fetcher::part_path(scratch.path(), segment.index))
            .collect();
        let destination = request.save_path.join(&request.file_name);

        if let Err(err) = merger::merge(&parts, &destination).await {
            let _ = scratch.close();
            return Err(err);
        }

        let _ = scratch.close();
        Ok(())
    }

    async fn run_single(
        &self,
        request: &DownloadRequest,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        fs::create_dir_all(&request.save_path).await?;
        let scratch = tempfile::Builder::new()
            .prefix(".parget-")
            .tempdir_in(&request.save_path)?;
        let stream_path = scratch.path().join("stream");

        let fetched = with_cancel(
            cancel,
            fetcher::fetch_single(&self.client, &request.url, &stream_path, progress.as_ref()),
        )
        .await;

        if let Err(err) = fetched {
            let _ = scratch.close();
            return Err(err);
        }

        let destination = request.save_path.join(&request.file_name);
        // Remove first so the rename overwrites on every platform
        let _ = fs::remove_file(&destination).await;
        if let Err(err) = fs::rename(&stream_path, &destination).await {
            let _ = scratch.close();
            return Err(err.into());
        }

        if let Some(sink) = progress.as_ref() {
            sink(100);
        }

        let _ = scratch.close();
        Ok(())
    }
}

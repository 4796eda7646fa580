use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::header;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use super::planer::Segment;
use super::progress::{ProgressFn, SegmentProgress};
use super::with_cancel;
use crate::utils::limiter::Limiter;

pub fn part_path(scratch: &Path, index: usize) -> PathBuf {
    scratch.join(format!("part{}", index))
}

/// Fetches one byte range into its part file.
///
/// Waits for a limiter permit before opening the connection; the permit is
/// an RAII guard, so it is released on success, error and cancellation
/// alike. Progress lands in the segment's slot as a fraction of its length.
pub async fn fetch_segment(
    client: reqwest::Client,
    url: String,
    segment: Segment,
    part: PathBuf,
    limiter: Limiter,
    table: SegmentProgress,
    cancel: CancellationToken,
) -> Result<(), DownloadError> {
    let Some(_permit) = limiter.acquire(&cancel).await else {
        return Err(DownloadError::Canceled);
    };

    with_cancel(
        &cancel,
        fetch_segment_inner(&client, &url, segment, &part, &table),
    )
    .await
}

async fn fetch_segment_inner(
    client: &reqwest::Client,
    url: &str,
    segment: Segment,
    part: &Path,
    table: &SegmentProgress,
) -> Result<(), DownloadError> {
    let response = client
        .get(url)
        .header(
            header::RANGE,
            format!("bytes={}-{}", segment.start, segment.end),
        )
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            status: response.status(),
            url: url.to_string(),
        });
    }

    let segment_size = segment.len();
    let mut file = File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut received = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
        table.set(segment.index, received as f64 * 100.0 / segment_size as f64);
    }

    file.flush().await?;
    Ok(())
}

/// Streams the whole resource sequentially into `destination`.
///
/// Reports percent per chunk when the server announced a total length;
/// with an unknown length nothing is reported until completion.
pub async fn fetch_single(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    progress: Option<&ProgressFn>,
) -> Result<(), DownloadError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            status: response.status(),
            url: url.to_string(),
        });
    }

    let total_bytes = response.content_length().unwrap_or(0);
    let mut file = File::create(destination).await?;
    let mut stream = response.bytes_stream();
    let mut received = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;

        if total_bytes > 0 {
            if let Some(sink) = progress {
                sink((received * 100 / total_bytes).min(100) as u8);
            }
        }
    }

    file.flush().await?;
    Ok(())
}

use std::io;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use super::fetcher;
use super::planer::Segment;
use super::progress::SegmentProgress;
use crate::utils::limiter::Limiter;

/// Runs every planned segment fetch concurrently under one limiter and
/// waits for all of them.
///
/// The first failure cancels `cancel` so still-running siblings stop, but
/// every task is still awaited before returning: by the time an error comes
/// back, no fetcher is writing to the scratch directory anymore.
pub async fn fetch_all(
    client: &reqwest::Client,
    url: &str,
    segments: &[Segment],
    scratch: &Path,
    workers: usize,
    table: &SegmentProgress,
    cancel: &CancellationToken,
) -> Result<(), DownloadError> {
    let limiter = Limiter::new(workers);

    let mut handles = Vec::with_capacity(segments.len());
    for segment in segments {
        handles.push(tokio::spawn(fetcher::fetch_segment(
            client.clone(),
            url.to_string(),
            *segment,
            fetcher::part_path(scratch, segment.index),
            limiter.clone(),
            table.clone(),
            cancel.clone(),
        )));
    }

    let mut first_error = None;
    for handle in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(DownloadError::Io(io::Error::new(
                io::ErrorKind::Other,
                err.to_string(),
            ))),
        };

        if let Err(err) = result {
            if first_error.is_none() {
                cancel.cancel();
                first_error = Some(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

use reqwest::header;

use super::error::DownloadError;

/// Asks the server whether it accepts byte-range requests.
///
/// Issues a HEAD request and checks the `Accept-Ranges` header. A server
/// that answers without advertising byte ranges (or rejects HEAD outright)
/// simply does not support them; only transport failures are errors.
pub async fn supports_ranges(client: &reqwest::Client, url: &str) -> Result<bool, DownloadError> {
    let response = client.head(url).send().await?;

    let ranged = response
        .headers()
        .get(header::ACCEPT_RANGES)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("bytes"))
        .unwrap_or(false);

    Ok(ranged)
}

/// Reads the total byte length of the resource from a content fetch.
///
/// The GET response is dropped without reading the body; only its headers
/// are consulted. Returns `None` when the server does not report a length.
pub async fn content_length(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<u64>, DownloadError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            status: response.status(),
            url: url.to_string(),
        });
    }

    Ok(response.content_length())
}

use std::error::Error;
use std::fmt;
use std::io;

use reqwest::StatusCode;

/// A fatal error terminating one download session
#[derive(Debug)]
pub enum DownloadError {
    Transport(reqwest::Error),
    Status { status: StatusCode, url: String },
    Io(io::Error),
    Canceled,
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::Transport(err) => write!(f, "transport error: {}", err),
            DownloadError::Status { status, url } => {
                write!(f, "server returned {} for {}", status, url)
            }
            DownloadError::Io(err) => write!(f, "io error: {}", err),
            DownloadError::Canceled => write!(f, "download canceled"),
        }
    }
}

impl Error for DownloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DownloadError::Transport(err) => Some(err),
            DownloadError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Transport(err)
    }
}

impl From<io::Error> for DownloadError {
    fn from(err: io::Error) -> Self {
        DownloadError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canceled_message_is_distinguishable() {
        assert_eq!(DownloadError::Canceled.to_string(), "download canceled");
    }

    #[test]
    fn test_status_message_names_code_and_url() {
        let err = DownloadError::Status {
            status: StatusCode::NOT_FOUND,
            url: "http://example.com/missing".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("http://example.com/missing"));
    }
}

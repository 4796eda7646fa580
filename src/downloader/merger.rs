use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;

/// Concatenates the completed part files, strictly in index order, into the
/// destination file.
///
/// Each part is closed before it is deleted, and deletion failures are
/// swallowed so they cannot mask a copy error. A failure mid-merge leaves
/// whatever was already appended at the destination; the session reports it
/// as fatal.
pub async fn merge(parts: &[PathBuf], destination: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut output = File::create(destination).await?;

    for part in parts {
        let mut input = File::open(part).await?;
        tokio::io::copy(&mut input, &mut output).await?;
        drop(input);

        // The input handle is closed, deleting is safe now
        let _ = fs::remove_file(part).await;
    }

    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_concatenates_in_index_order() {
        let scratch = tempfile::tempdir().unwrap();
        let parts: Vec<PathBuf> = (0..3)
            .map(|i| scratch.path().join(format!("part{}", i)))
            .collect();

        std::fs::write(&parts[0], b"first-").unwrap();
        std::fs::write(&parts[1], b"second-").unwrap();
        std::fs::write(&parts[2], b"third").unwrap();

        let destination = scratch.path().join("out").join("merged.bin");
        merge(&parts, &destination).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"first-second-third");
    }

    #[tokio::test]
    async fn test_merge_deletes_parts() {
        let scratch = tempfile::tempdir().unwrap();
        let parts: Vec<PathBuf> = (0..2)
            .map(|i| scratch.path().join(format!("part{}", i)))
            .collect();

        std::fs::write(&parts[0], b"aa").unwrap();
        std::fs::write(&parts[1], b"bb").unwrap();

        let destination = scratch.path().join("merged.bin");
        merge(&parts, &destination).await.unwrap();

        assert!(!parts[0].exists());
        assert!(!parts[1].exists());
    }

    #[tokio::test]
    async fn test_merge_fails_on_missing_part() {
        let scratch = tempfile::tempdir().unwrap();
        let parts = vec![scratch.path().join("part0")];

        let destination = scratch.path().join("merged.bin");
        let result = merge(&parts, &destination).await;

        assert!(matches!(result, Err(DownloadError::Io(_))));
    }
}

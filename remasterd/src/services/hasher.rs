//! Source file hashing
//!
//! Tracks are resubmitted to the mastering service only when their source
//! audio actually changed. The change check compares SHA-256 digests of the
//! file contents.

use std::path::Path;

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

/// Calculate the SHA-256 digest of a file, hex encoded.
///
/// Reads in 1MB chunks on the blocking pool so large masters don't stall
/// the async runtime.
pub async fn file_sha256(path: &Path) -> Result<String> {
    let path = path.to_path_buf();

    let hash = tokio::task::spawn_blocking(move || -> Result<String> {
        use std::fs::File;
        use std::io::Read;

        let mut file = File::open(&path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 1024 * 1024];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| anyhow!("Hash task failed: {}", e))??;

    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        std::fs::write(&path, b"hello world").unwrap();

        let hash = file_sha256(&path).await.unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn test_detects_content_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.wav");

        std::fs::write(&path, b"take one").unwrap();
        let first = file_sha256(&path).await.unwrap();

        std::fs::write(&path, b"take two").unwrap();
        let second = file_sha256(&path).await.unwrap();

        assert_ne!(first, second);

        std::fs::write(&path, b"take one").unwrap();
        let third = file_sha256(&path).await.unwrap();
        assert_eq!(first, third);
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let result = file_sha256(Path::new("/nonexistent/audio.wav")).await;
        assert!(result.is_err());
    }
}

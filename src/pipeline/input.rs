//! Input resolution: read a user-supplied path or URL into PDF bytes.
//!
//! Extraction works on an in-memory buffer, so unlike a file-based renderer
//! there is no temp file to manage: URLs are downloaded straight into memory
//! and local files are read whole. Both paths check the `%PDF` magic before
//! returning so a wrong file yields a clear error instead of a parser one.

use crate::error::StudyBotError;
use std::path::PathBuf;
use tracing::{debug, info};

/// PDF bytes plus a label describing where they came from.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    /// The path or URL as the user typed it.
    pub source: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
///
/// If the input is a URL, download it; otherwise read the local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<LoadedInput, StudyBotError> {
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    check_magic(input, &bytes)?;
    Ok(LoadedInput {
        source: input.to_string(),
        bytes,
    })
}

/// Reject buffers that do not start with `%PDF`.
pub fn check_magic(source: &str, bytes: &[u8]) -> Result<(), StudyBotError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(StudyBotError::NotAPdf {
            source_name: source.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, StudyBotError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) => Err(match e.kind() {
            std::io::ErrorKind::NotFound => StudyBotError::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => StudyBotError::PermissionDenied { path },
            _ => StudyBotError::ReadFailed { path, source: e },
        }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, StudyBotError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StudyBotError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            StudyBotError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            StudyBotError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(StudyBotError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| StudyBotError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_check() {
        assert!(check_magic("a", b"%PDF-1.7\n").is_ok());
        let err = check_magic("a.txt", b"hello").unwrap_err();
        match err {
            StudyBotError::NotAPdf { magic, .. } => assert_eq!(magic, b"hell".to_vec()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_magic("empty", b"").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, StudyBotError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn directory_is_a_read_failure_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyBotError::ReadFailed { .. }), "{err:?}");
        assert!(err.to_string().starts_with("Could not read"));
    }

    #[tokio::test]
    async fn non_pdf_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"just some notes").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyBotError::NotAPdf { .. }));
    }
}

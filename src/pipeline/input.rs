//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! Each CTD module arrives as a local file or an HTTP/HTTPS URL. Either way
//! the extractor works on an in-memory byte buffer, so URLs are downloaded
//! straight into memory. The `%PDF` magic bytes are checked here so that a
//! mislabelled upload fails with a readable message instead of a parser error.

use crate::error::ReviewError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// PDF bytes together with the label they were loaded from.
#[derive(Debug, Clone)]
pub struct PdfSource {
    /// Path or URL as given by the user.
    pub label: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<PdfSource, ReviewError> {
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    check_magic(input, &bytes)?;
    Ok(PdfSource {
        label: input.to_string(),
        bytes,
    })
}

/// Reject buffers that do not start with `%PDF`.
pub fn check_magic(label: &str, bytes: &[u8]) -> Result<(), ReviewError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(ReviewError::NotAPdf {
            source_label: label.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, ReviewError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ReviewError::PermissionDenied { path })
        }
        Err(_) => Err(ReviewError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ReviewError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReviewError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReviewError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ReviewError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ReviewError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReviewError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/module1.pdf"));
        assert!(is_url("http://example.com/module1.pdf"));
        assert!(!is_url("/tmp/module1.pdf"));
        assert!(!is_url("module1.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_accepts_pdf_header() {
        assert!(check_magic("m1.pdf", b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn magic_rejects_other_formats() {
        match check_magic("m1.docx", b"PK\x03\x04rest").unwrap_err() {
            ReviewError::NotAPdf { source_label, magic } => {
                assert_eq!(source_label, "m1.docx");
                assert_eq!(magic, b"PK\x03\x04".to_vec());
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn magic_rejects_short_buffer() {
        assert!(check_magic("tiny", b"%P").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.pdf");
        let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, ReviewError::FileNotFound { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn local_file_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m1.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%%EOF").unwrap();
        let src = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(src.bytes, b"%PDF-1.4\n%%EOF");
        assert_eq!(src.label, path.to_str().unwrap());
    }
}

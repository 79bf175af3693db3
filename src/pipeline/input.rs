//! Input loading: read a user-supplied path or URL into a [`RawDocument`].
//!
//! The declared kind is inferred from the leading magic bytes, falling back
//! to the file extension or the server's `Content-Type`. Kinds that are
//! neither PDF nor a raster image are kept as [`FileKind::Other`] so the
//! normalizer can reject them with a message naming the kind.

use crate::document::{FileKind, RawDocument};
use crate::error::Scan2StructError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download an HTTP(S) URL.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<RawDocument, Scan2StructError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(Path::new(input)).await
    }
}

/// Infer the file kind from content, then from `hint` (extension or MIME type).
pub fn detect_kind(bytes: &[u8], hint: Option<&str>) -> FileKind {
    if let Some(kind) = sniff(bytes) {
        return kind;
    }
    match hint {
        Some(h) if !h.is_empty() => FileKind::from_declared(h),
        _ => FileKind::Other("unknown".into()),
    }
}

fn sniff(bytes: &[u8]) -> Option<FileKind> {
    const IMAGE_MAGIC: &[&[u8]] = &[
        b"\x89PNG\r\n\x1a\n",
        b"\xFF\xD8\xFF",
        b"GIF87a",
        b"GIF89a",
        b"II*\0",
        b"MM\0*",
        b"BM",
    ];
    if bytes.starts_with(b"%PDF") {
        return Some(FileKind::Pdf);
    }
    if IMAGE_MAGIC.iter().any(|m| bytes.starts_with(m)) {
        return Some(FileKind::Image);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(FileKind::Image);
    }
    None
}

async fn load_local(path: &Path) -> Result<RawDocument, Scan2StructError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Scan2StructError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Scan2StructError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let kind = detect_kind(&bytes, ext.as_deref());

    debug!("Loaded {} ({} bytes, kind {})", path.display(), bytes.len(), kind);
    Ok(RawDocument::new(bytes, kind, name))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<RawDocument, Scan2StructError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Scan2StructError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Scan2StructError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Scan2StructError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Scan2StructError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Scan2StructError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let name = filename_from_url(url);
    let ext = PathBuf::from(&name)
        .extension()
        .map(|e| e.to_string_lossy().into_owned());
    let kind = detect_kind(&bytes, ext.as_deref().or(content_type.as_deref()));

    info!("Downloaded {} bytes ({})", bytes.len(), kind);
    Ok(RawDocument::new(bytes.to_vec(), kind, name))
}

/// Last path segment of the URL, or a generic name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "download".to_string()
}

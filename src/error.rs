//! Error types for the scan2struct library.
//!
//! Three tiers of failure reflect three different scopes:
//!
//! * [`Scan2StructError`]: **Fatal**: the call cannot produce anything useful
//!   (file missing, unsupported kind, both PDF tiers failed, provider down).
//!   Returned as `Err(Scan2StructError)` from the top-level entry points.
//!
//! * [`EncodingError`]: **Page-scoped**: one raster could not be decoded or
//!   re-encoded. Callers that hold several pages decide whether to skip the
//!   page or abort.
//!
//! * [`TierFailure`] / [`RasterError`]: **Absorbed**: a fallback strategy or
//!   a single rasterisation attempt failed. These drive the fallback policy
//!   and only appear in reports and logs.
//!
//! Parse and shape failures of model output are not errors: they
//! always resolve to [`crate::pipeline::recover::Recovered::Degraded`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scan2struct library.
#[derive(Debug, Error)]
pub enum Scan2StructError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Normalization errors ──────────────────────────────────────────────
    /// The declared file kind is neither `pdf` nor `image`.
    #[error("Unsupported file kind '{kind}' for '{name}': expected a PDF or a raster image")]
    UnsupportedFileKind { name: String, kind: String },

    /// A raster could not be decoded or re-encoded.
    #[error("Could not encode '{name}': {source}")]
    Encoding {
        name: String,
        #[source]
        source: EncodingError,
    },

    /// Every PDF strategy failed; no page sequence could be produced.
    #[error("Could not read PDF '{name}' ({stage}): {detail}")]
    DocumentProcessing {
        name: String,
        stage: String,
        detail: String,
    },

    // ── Capability errors ─────────────────────────────────────────────────
    /// The external generative capability failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a page or record to disk.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Scan2StructError {
    /// `true` when the failure means the uploaded file itself could not be
    /// read, as opposed to the model or the environment failing.
    pub fn is_unreadable_input(&self) -> bool {
        matches!(
            self,
            Scan2StructError::UnsupportedFileKind { .. }
                | Scan2StructError::Encoding { .. }
                | Scan2StructError::DocumentProcessing { .. }
        )
    }
}

/// Failure to turn raw bytes into a bounded [`crate::document::Page`].
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Input bytes are not a decodable raster image.
    #[error("not a decodable raster image: {0}")]
    Decode(String),

    /// The image decoded but could not be re-encoded.
    #[error("re-encoding failed: {0}")]
    Encode(String),

    /// The image has a zero dimension.
    #[error("image has zero size ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// A single rasterisation attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RasterError {
    /// The requested page does not exist: the normal end-of-document signal.
    #[error("page {page} does not exist")]
    NoSuchPage { page: usize },

    /// The renderer is not available in this deployment (library missing).
    #[error("page renderer unavailable: {0}")]
    Unavailable(String),

    /// The PDF could not be opened at all.
    #[error("renderer could not open the document: {0}")]
    Unreadable(String),

    /// The page exists but rendering it failed.
    #[error("page {page} failed to render: {detail}")]
    Render { page: usize, detail: String },
}

/// Why a page strategy produced nothing. Absorbed by the normalizer.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TierFailure {
    /// The capability the strategy depends on is missing.
    #[error("{strategy}: unavailable: {detail}")]
    Unavailable { strategy: String, detail: String },

    /// The strategy ran but yielded zero pages.
    #[error("{strategy}: produced no pages")]
    NoPages { strategy: String },

    /// The strategy failed outright.
    #[error("{strategy}: {detail}")]
    Failed { strategy: String, detail: String },
}

impl TierFailure {
    /// Name of the strategy that failed.
    pub fn strategy(&self) -> &str {
        match self {
            TierFailure::Unavailable { strategy, .. }
            | TierFailure::NoPages { strategy }
            | TierFailure::Failed { strategy, .. } => strategy,
        }
    }
}

/// The external generative capability failed or returned an unusable envelope.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// The provider is not initialised (missing API key etc.).
    #[error("Generative provider '{provider}' is not configured.\n{hint}")]
    NotConfigured { provider: String, hint: String },

    /// No response came back after all attempts.
    #[error("No response from the generative capability after {attempts} attempt(s): {detail}")]
    NoResponse { attempts: u32, detail: String },

    /// A response arrived but its content was empty.
    #[error("The generative capability returned an empty response")]
    EmptyContent,

    /// The call exceeded the configured timeout on every attempt.
    #[error("Generative call timed out after {secs}s")]
    Timeout { secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_kind_names_the_kind() {
        let e = Scan2StructError::UnsupportedFileKind {
            name: "notes.docx".into(),
            kind: "docx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'docx'"), "got: {msg}");
        assert!(msg.contains("notes.docx"));
        assert!(e.is_unreadable_input());
    }

    #[test]
    fn document_processing_carries_stage() {
        let e = Scan2StructError::DocumentProcessing {
            name: "scan.pdf".into(),
            stage: "text-extraction".into(),
            detail: "broken xref".into(),
        };
        assert!(e.to_string().contains("text-extraction"));
        assert!(e.to_string().contains("broken xref"));
    }

    #[test]
    fn capability_errors_are_distinct() {
        let none = CapabilityError::NoResponse {
            attempts: 4,
            detail: "connection reset".into(),
        };
        let empty = CapabilityError::EmptyContent;
        assert!(none.to_string().contains("4 attempt"));
        assert!(empty.to_string().contains("empty"));

        let wrapped: Scan2StructError = empty.into();
        assert!(!wrapped.is_unreadable_input());
    }

    #[test]
    fn tier_failure_strategy_name() {
        let f = TierFailure::NoPages {
            strategy: "rasterize".into(),
        };
        assert_eq!(f.strategy(), "rasterize");
        assert!(f.to_string().contains("no pages"));
    }
}

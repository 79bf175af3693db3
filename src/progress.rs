//! Progress-callback trait for normalization events.
//!
//! Inject an [`Arc<dyn NormalizeProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe
//! which strategy is running, which ones fell through, and each page as it
//! is produced.
//!
//! # Example
//!
//! ```rust
//! use scan2struct::{NormalizeProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl NormalizeProgressCallback for CountingCallback {
//!     fn on_page_produced(&self, page_num: usize, strategy: &str) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num} via {strategy}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { pages: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn NormalizeProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the normalizer as it works through a document.
///
/// Strategies run on a blocking thread, so implementations must be
/// `Send + Sync`. Every method defaults to a no-op.
pub trait NormalizeProgressCallback: Send + Sync {
    /// Called once before the first strategy runs.
    ///
    /// # Arguments
    /// * `name`: display name of the document
    /// * `kind`: declared file kind
    fn on_normalize_start(&self, name: &str, kind: &str) {
        let _ = (name, kind);
    }

    /// Called when a strategy gives up and control falls to the next one.
    fn on_strategy_failed(&self, strategy: &str, reason: &str) {
        let _ = (strategy, reason);
    }

    /// Called once per page of the final sequence, in page order, after the
    /// page ceiling has been applied.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `strategy`: name of the strategy producing it
    fn on_page_produced(&self, page_num: usize, strategy: &str) {
        let _ = (page_num, strategy);
    }

    /// Called once with the final page count after the ceiling was applied.
    fn on_normalize_complete(&self, page_count: usize, dropped: usize) {
        let _ = (page_count, dropped);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl NormalizeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn NormalizeProgressCallback>;

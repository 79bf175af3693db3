//! Configuration for normalization and structured recovery.
//!
//! All knobs live in [`PipelineConfig`], built via [`PipelineConfigBuilder`].
//! One struct keeps configs cheap to share across tasks and easy to diff
//! between runs.

use crate::error::Scan2StructError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a normalization / analysis run.
///
/// # Example
/// ```rust
/// use scan2struct::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_pages(10)
///     .jpeg_quality(80)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, 10);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Maximum page width in pixels. Default: 2000.
    ///
    /// Pages are downscaled (never upscaled) so neither dimension exceeds
    /// the configured maximum.
    pub max_width: u32,

    /// Maximum page height in pixels. Default: 2000.
    pub max_height: u32,

    /// JPEG quality, 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// Page-count ceiling. Default: 20.
    ///
    /// Bounds the tier-1 rasterisation loop and truncates whatever any tier
    /// produced. Excess pages are dropped, not reported as errors.
    pub max_pages: usize,

    /// Characters per synthesised page when falling back to text extraction. Default: 2000.
    pub chunk_chars: usize,

    /// Ceiling on sanitised text drawn onto one synthesised page. Default: 3000.
    pub max_render_chars: usize,

    /// Synthesised page canvas width in pixels. Default: 1240 (A4 at 150 DPI).
    pub canvas_width: u32,

    /// Synthesised page canvas height in pixels. Default: 1754.
    pub canvas_height: u32,

    /// Body text size on synthesised pages, in pixels. Default: 22.
    pub font_size: f32,

    /// Font used for synthesised pages. If None, common system fonts are tried, then a bundled one.
    pub font_path: Option<PathBuf>,

    /// Retry a tier-1 page once after a transient render error. Default: true.
    ///
    /// A "no such page" answer always ends the document immediately; only
    /// render errors on an existing page are retried.
    pub retry_transient_raster: bool,

    /// Generative model identifier, e.g. "gpt-4.1-mini".
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per completion. Default: 4096.
    ///
    /// Too low a budget is the most common cause of truncated JSON.
    pub max_tokens: usize,

    /// Retry attempts on a failed capability call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Normalization progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_width: 2000,
            max_height: 2000,
            jpeg_quality: 85,
            max_pages: 20,
            chunk_chars: 2000,
            max_render_chars: 3000,
            canvas_width: 1240,
            canvas_height: 1754,
            font_size: 22.0,
            font_path: None,
            retry_transient_raster: true,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_pages", &self.max_pages)
            .field("chunk_chars", &self.chunk_chars)
            .field("max_render_chars", &self.max_render_chars)
            .field("canvas", &(self.canvas_width, self.canvas_height))
            .field("font_path", &self.font_path)
            .field("retry_transient_raster", &self.retry_transient_raster)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width = px;
        self
    }

    pub fn max_height(mut self, px: u32) -> Self {
        self.config.max_height = px;
        self
    }

    /// Set both raster bounds at once.
    pub fn max_dimensions(self, width: u32, height: u32) -> Self {
        self.max_width(width).max_height(height)
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn chunk_chars(mut self, n: usize) -> Self {
        self.config.chunk_chars = n;
        self
    }

    pub fn max_render_chars(mut self, n: usize) -> Self {
        self.config.max_render_chars = n;
        self
    }

    pub fn canvas(mut self, width: u32, height: u32) -> Self {
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self
    }

    pub fn font_size(mut self, px: f32) -> Self {
        self.config.font_size = px.clamp(6.0, 96.0);
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn retry_transient_raster(mut self, v: bool) -> Self {
        self.config.retry_transient_raster = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Scan2StructError> {
        let c = &self.config;
        if c.max_width < 16 || c.max_height < 16 {
            return Err(Scan2StructError::InvalidConfig(format!(
                "Raster bounds must be at least 16x16, got {}x{}",
                c.max_width, c.max_height
            )));
        }
        if c.max_pages == 0 {
            return Err(Scan2StructError::InvalidConfig(
                "Page ceiling must be ≥ 1".into(),
            ));
        }
        if c.chunk_chars == 0 || c.max_render_chars == 0 {
            return Err(Scan2StructError::InvalidConfig(
                "Character budgets must be ≥ 1".into(),
            ));
        }
        if c.canvas_width < 200 || c.canvas_height < 200 {
            return Err(Scan2StructError::InvalidConfig(format!(
                "Canvas must be at least 200x200, got {}x{}",
                c.canvas_width, c.canvas_height
            )));
        }
        Ok(self.config)
    }
}

//! Configuration types for the comparison client.
//!
//! Every knob lives in [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. Polling cadence is grouped in [`PollingConfig`]
//! and per-render choices in [`RenderOptions`], so a long-lived client can be
//! shared while each render picks its own pages and zoom.

use crate::error::DiffClientError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed rasterisation scale applied to every page (1.5×).
pub const RENDER_SCALE: f32 = 1.5;

/// Zoom bounds, in percent.
pub const MIN_ZOOM: u32 = 25;
pub const MAX_ZOOM: u32 = 400;

/// Configuration for talking to the comparison backend.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfdiff::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:8000")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Scheme, host and port of the comparison service. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Path prefix of the versioned API. Default: `/api/v1`.
    pub api_prefix: String,

    /// Per-request timeout in seconds. Default: 30.
    ///
    /// Applies to every call including the upload, so very slow links
    /// uploading two 50 MB files may need more.
    pub request_timeout_secs: u64,

    /// Retries for idempotent GETs that fail without a response. Default: 3.
    ///
    /// Uploads are never retried: the backend does not deduplicate, so a
    /// retried upload would create a second job.
    pub max_request_retries: u32,

    /// Base delay for GET retries in milliseconds, doubled per attempt. Default: 100.
    pub retry_backoff_ms: u64,

    /// Status polling cadence.
    pub polling: PollingConfig,

    /// Directory for the persisted session file. Default: platform data dir.
    pub storage_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            request_timeout_secs: 30,
            max_request_retries: 3,
            retry_backoff_ms: 100,
            polling: PollingConfig::default(),
            storage_dir: None,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL for an API path such as `/jobs/abc`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay before request retry number `attempt` (1-based): the base
    /// backoff, doubled per further attempt, saturating.
    pub fn request_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(factor.saturating_mul(self.retry_backoff_ms))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.api_prefix = prefix.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_request_retries(mut self, n: u32) -> Self {
        self.config.max_request_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.config.polling = polling;
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, DiffClientError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(DiffClientError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.polling.initial_interval_ms == 0 {
            return Err(DiffClientError::InvalidConfig(
                "Polling interval must be ≥ 1 ms".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Polling ──────────────────────────────────────────────────────────────

/// Status polling cadence.
///
/// The interval escalates with wall-clock time since polling started, so a
/// quick comparison is noticed within seconds while an hour-long one does not
/// hammer the backend. Failed fetches back off exponentially until
/// `max_consecutive_errors` is exceeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval before `escalate_after_secs[0]`. Default: 3000.
    pub initial_interval_ms: u64,
    /// Interval between the two escalation points. Default: 5000.
    pub medium_interval_ms: u64,
    /// Interval after `escalate_after_secs[1]`. Default: 10000.
    pub long_interval_ms: u64,
    /// Elapsed seconds at which the interval steps up. Default: 5 and 10 minutes.
    pub escalate_after_secs: [u64; 2],
    /// Consecutive failures tolerated before polling gives up. Default: 3.
    pub max_consecutive_errors: u32,
    /// Backoff unit: retry `n` waits `2^n × backoff_base_ms`. Default: 1000.
    pub backoff_base_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 3000,
            medium_interval_ms: 5000,
            long_interval_ms: 10_000,
            escalate_after_secs: [5 * 60, 10 * 60],
            max_consecutive_errors: 3,
            backoff_base_ms: 1000,
        }
    }
}

impl PollingConfig {
    /// Delay before the next status fetch after a successful one.
    ///
    /// `< 5 min → initial`, `5–10 min → medium`, `> 10 min → long`.
    pub fn interval_for(&self, elapsed: Duration) -> Duration {
        let [medium_at, long_at] = self.escalate_after_secs;
        let ms = if elapsed < Duration::from_secs(medium_at) {
            self.initial_interval_ms
        } else if elapsed <= Duration::from_secs(long_at) {
            self.medium_interval_ms
        } else {
            self.long_interval_ms
        };
        Duration::from_millis(ms)
    }

    /// Delay before retry number `consecutive_errors` (1-based).
    pub fn backoff_for(&self, consecutive_errors: u32) -> Duration {
        let factor = 2u64.saturating_pow(consecutive_errors);
        Duration::from_millis(factor.saturating_mul(self.backoff_base_ms))
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Per-render options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Which pages to render. Default: all.
    pub pages: PageSelection,
    /// Displayed size in percent of the 1.5× raster. Default: 100.
    pub zoom_percent: u32,
    /// Gap between the two columns in the composed image, in pixels. Default: 16.
    pub gutter_px: u32,
    /// Draw difference boxes. Default: true.
    pub show_differences: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pages: PageSelection::All,
            zoom_percent: 100,
            gutter_px: 16,
            show_differences: true,
        }
    }
}

impl RenderOptions {
    /// Displayed pixels per raster pixel.
    pub fn display_factor(&self) -> f32 {
        clamp_zoom(self.zoom_percent) as f32 / 100.0
    }
}

/// Clamp a zoom percentage into `MIN_ZOOM..=MAX_ZOOM`.
pub fn clamp_zoom(zoom: u32) -> u32 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Specifies which pages of the comparison to render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Render all pages (default).
    #[default]
    All,
    /// Render a single page (1-indexed).
    Single(usize),
    /// Render a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Render specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        let c = ClientConfig::builder()
            .base_url("http://svc:8000/")
            .build()
            .unwrap();
        assert_eq!(c.endpoint("/jobs/abc"), "http://svc:8000/api/v1/jobs/abc");
        assert_eq!(c.endpoint("upload"), "http://svc:8000/api/v1/upload");
    }

    #[test]
    fn build_rejects_non_http_base() {
        let err = ClientConfig::builder().base_url("ftp://x").build().unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn interval_escalates_with_elapsed_time() {
        let p = PollingConfig::default();
        let min = |m: u64| Duration::from_secs(m * 60);
        assert_eq!(p.interval_for(Duration::ZERO), Duration::from_millis(3000));
        assert_eq!(p.interval_for(min(4)), Duration::from_millis(3000));
        assert_eq!(p.interval_for(min(5)), Duration::from_millis(5000));
        assert_eq!(p.interval_for(min(10)), Duration::from_millis(5000));
        assert_eq!(
            p.interval_for(min(10) + Duration::from_millis(1)),
            Duration::from_millis(10_000)
        );
    }

    #[test]
    fn backoff_doubles() {
        let p = PollingConfig::default();
        assert_eq!(p.backoff_for(1), Duration::from_millis(2000));
        assert_eq!(p.backoff_for(2), Duration::from_millis(4000));
        assert_eq!(p.backoff_for(3), Duration::from_millis(8000));
    }

    #[test]
    fn request_backoff_saturates() {
        let c = ClientConfig::builder()
            .retry_backoff_ms(100)
            .max_request_retries(200)
            .build()
            .unwrap();
        assert_eq!(c.request_backoff(1), Duration::from_millis(100));
        assert_eq!(c.request_backoff(3), Duration::from_millis(400));
        assert_eq!(c.request_backoff(65), Duration::from_millis(u64::MAX));
        assert_eq!(c.request_backoff(200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn zoom_is_clamped() {
        assert_eq!(clamp_zoom(5), MIN_ZOOM);
        assert_eq!(clamp_zoom(1000), MAX_ZOOM);
        let opts = RenderOptions {
            zoom_percent: 50,
            ..Default::default()
        };
        assert!((opts.display_factor() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(4).to_indices(3), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 10).to_indices(3), vec![1, 2]);
        assert_eq!(PageSelection::Set(vec![3, 1, 3]).to_indices(5), vec![0, 2]);
    }
}

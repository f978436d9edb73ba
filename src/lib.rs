//! # edgequake-pdfdiff
//!
//! Client for a two-PDF comparison service: pick two documents, upload them,
//! follow the comparison job, and render both documents side by side with
//! the detected differences boxed on top.
//!
//! ## Flow Overview
//!
//! ```text
//! a.pdf + b.pdf
//!  │
//!  ├─ 1. Validate  exactly two PDFs, ≤ 50 MB each, not the same file twice
//!  ├─ 2. Upload    multipart POST with progress and cancellation
//!  ├─ 3. Poll      3 s → 5 s → 10 s as the job ages; 2/4/8 s backoff on errors
//!  ├─ 4. Fetch     both documents + the page-by-page diff
//!  └─ 5. Render    pdfium at 1.5×, Y-flipped overlays, page-NNN.png
//! ```
//!
//! The backend does the diffing. This crate validates, transports, tracks and
//! displays.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfdiff::{
//!     ApiClient, ClientConfig, FileCandidate, JobStore, UploadManager, UploadStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let backend = Arc::new(ApiClient::new(&config)?);
//!
//!     let uploads = UploadStore::new(Arc::new(UploadManager::new(backend.clone())), None);
//!     uploads.select_files(vec![
//!         FileCandidate::from_path("contract-v1.pdf")?,
//!         FileCandidate::from_path("contract-v2.pdf")?,
//!     ])?;
//!     let job_id = uploads.submit().await?;
//!
//!     let jobs = JobStore::new(backend, config.polling.clone(), None);
//!     jobs.load_job(&job_id).await?;
//!     let settled = jobs.wait_until_settled().await;
//!     println!("{:?}", settled.job.map(|j| j.status));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfdiff` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfdiff = { version = "0.1", default-features = false }
//! ```
//!
//! ## Rendering
//!
//! [`render::render_comparison`] needs a pdfium shared library at runtime.
//! Set `PDFIUM_LIB_PATH` to the library (or its directory), or install it on
//! the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod polling;
pub mod progress;
pub mod render;
pub mod state;
pub mod storage;
pub mod stream;
pub mod upload;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{ApiClient, ComparisonBackend};
pub use config::{ClientConfig, ClientConfigBuilder, PageSelection, PollingConfig, RenderOptions};
pub use error::{Column, DiffClientError, ErrorCode, PageRenderError, ValidationError};
pub use model::{
    ChangeKind, ComparisonJob, ComparisonResult, DiffReport, ExportFormat, JobStatus, UploadedFile,
};
pub use output::{RenderStats, RenderedComparison, RenderedPage};
pub use polling::{PollState, PollingObserver, PollingService};
pub use progress::{NoopRenderProgress, RenderProgress, RenderProgressCallback};
pub use render::{render_comparison, render_job};
pub use state::{JobStore, UploadStore};
pub use storage::SessionStore;
pub use stream::{watch_job, PollEvent};
pub use upload::{AbortController, AbortSignal, UploadManager};
pub use validation::{has_duplicate_files, validate_files, FileCandidate};

//! Error types for the edgequake-pdfdiff library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ValidationError`] is **Local**: the selected files can never make a
//!   valid job (wrong count, not a PDF, too large, duplicated). Validation
//!   errors accumulate so the caller can show one or all of them, and they
//!   never reach the network layer.
//!
//! * [`DiffClientError`] is **Fatal** for the current operation: the upload,
//!   status fetch, or render cannot proceed. Returned as
//!   `Err(DiffClientError)` from the client, stores, and renderer.
//!
//! * [`PageRenderError`] is **Non-fatal**: a single page failed to rasterise
//!   but every other page is fine. Stored inside
//!   [`crate::output::RenderedPage`] so one bad page does not hide the rest
//!   of the comparison.
//!
//! `AbortedByUser` is deliberately a variant of its own: a user cancelling an
//! upload is an informational outcome, not a failure banner, and callers
//! check [`DiffClientError::is_cancellation`] before reporting it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Maximum accepted PDF size, in bytes (50 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

// ── Wire error codes ─────────────────────────────────────────────────────

/// Error codes carried in the backend's `{error, message}` body, plus the
/// client-side codes for network failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400
    InvalidFile,
    FileTooLarge,
    UnsupportedFormat,
    MissingFiles,
    // 404
    JobNotFound,
    // 409
    InvalidJobStatus,
    // 413
    PayloadTooLarge,
    // 500
    ComparisonFailed,
    InternalError,
    // client side
    InvalidFileCount,
    DuplicateFiles,
    NetworkError,
    RequestTimeout,
    AbortedByUser,
    PollingExhausted,
    Unknown,
}

impl ErrorCode {
    /// Parse the `error` field of a backend error body. Unrecognised codes
    /// map to [`ErrorCode::Unknown`] rather than failing the whole response.
    pub fn from_wire(code: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(code.trim().to_ascii_uppercase()))
            .unwrap_or(ErrorCode::Unknown)
    }
}

/// Error body returned by the backend on any non-2xx response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

// ── Validation ───────────────────────────────────────────────────────────

/// A reason the selected files cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Please select exactly 2 PDF files (got {count})")]
    InvalidFileCount { count: usize },

    #[error("{name}: Only PDF files are supported")]
    UnsupportedFormat { name: String },

    #[error("{name}: File exceeds 50MB limit ({size} bytes)")]
    FileTooLarge { name: String, size: u64 },

    #[error("The same file was selected twice: {name}")]
    DuplicateFiles { name: String },
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::InvalidFileCount { .. } => ErrorCode::InvalidFileCount,
            ValidationError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            ValidationError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            ValidationError::DuplicateFiles { .. } => ErrorCode::DuplicateFiles,
        }
    }
}

// ── Fatal errors ─────────────────────────────────────────────────────────

/// All fatal errors returned by the edgequake-pdfdiff library.
///
/// Page-level render failures use [`PageRenderError`] and are stored in
/// [`crate::output::RenderedPage`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DiffClientError {
    // ── Selection errors ──────────────────────────────────────────────────
    /// One or more files failed local validation; nothing was sent.
    #[error("{}", join_validation(.0))]
    Validation(Vec<ValidationError>),

    /// A selected file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The request never produced an HTTP response.
    #[error("Network error: {detail}\nCheck that the comparison service is reachable.")]
    NetworkError { detail: String },

    /// The request exceeded the per-request timeout.
    #[error("Request timed out after {secs}s")]
    RequestTimeout { secs: u64 },

    /// The user cancelled the upload.
    #[error("Upload cancelled by user")]
    AbortedByUser,

    // ── Backend-reported errors ───────────────────────────────────────────
    /// The backend does not know this job id.
    #[error("Job '{job_id}' was not found")]
    JobNotFound { job_id: String },

    /// The backend accepted the files but the comparison itself failed.
    #[error("Comparison failed: {message}")]
    ComparisonFailed { message: String },

    /// The backend hit an unexpected server-side error.
    #[error("Comparison service error: {message}")]
    InternalError { message: String },

    /// Any other non-2xx response.
    #[error("HTTP {status} ({code:?}): {message}")]
    Api {
        status: u16,
        code: ErrorCode,
        message: String,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Unexpected response from comparison service: {0}")]
    InvalidResponse(String),

    // ── Polling ───────────────────────────────────────────────────────────
    /// Status polling failed more times in a row than allowed.
    #[error("Lost contact with the comparison service after {retries} attempts: {last_error}")]
    PollingExhausted { retries: u32, last_error: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// A downloaded document could not be opened by pdfium.
    #[error("PDF '{label}' is corrupt: {detail}")]
    CorruptPdf { label: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or install pdfium on the system\n\
library search path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
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

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl DiffClientError {
    /// The wire/taxonomy code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DiffClientError::Validation(errors) => errors
                .first()
                .map(ValidationError::code)
                .unwrap_or(ErrorCode::InvalidFile),
            DiffClientError::FileNotFound { .. } | DiffClientError::PermissionDenied { .. } => {
                ErrorCode::InvalidFile
            }
            DiffClientError::NetworkError { .. } => ErrorCode::NetworkError,
            DiffClientError::RequestTimeout { .. } => ErrorCode::RequestTimeout,
            DiffClientError::AbortedByUser => ErrorCode::AbortedByUser,
            DiffClientError::JobNotFound { .. } => ErrorCode::JobNotFound,
            DiffClientError::ComparisonFailed { .. } => ErrorCode::ComparisonFailed,
            DiffClientError::InternalError { .. } => ErrorCode::InternalError,
            DiffClientError::Api { code, .. } => *code,
            DiffClientError::PollingExhausted { .. } => ErrorCode::PollingExhausted,
            _ => ErrorCode::Unknown,
        }
    }

    /// `true` for the user-initiated cancellation outcome.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DiffClientError::AbortedByUser)
    }

    /// `true` when offering the user a retry makes sense.
    ///
    /// Validation errors need a new selection instead, and a cancellation is
    /// not an error at all.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DiffClientError::NetworkError { .. }
                | DiffClientError::RequestTimeout { .. }
                | DiffClientError::JobNotFound { .. }
                | DiffClientError::ComparisonFailed { .. }
                | DiffClientError::InternalError { .. }
                | DiffClientError::PollingExhausted { .. }
        ) || matches!(self, DiffClientError::Api { status, .. } if *status >= 500)
    }

    /// `true` for failures where the request never got an answer; these are
    /// the only ones the status GET retries on its own.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DiffClientError::NetworkError { .. } | DiffClientError::RequestTimeout { .. }
        )
    }

    /// A short human-readable message for display.
    pub fn user_message(&self) -> String {
        match self {
            DiffClientError::AbortedByUser => "Upload cancelled".to_string(),
            DiffClientError::NetworkError { .. } => {
                "Network error. Check your connection and try again.".to_string()
            }
            DiffClientError::RequestTimeout { .. } => {
                "The request timed out. Please try again.".to_string()
            }
            DiffClientError::PollingExhausted { .. } => {
                "Lost contact with the comparison service. Retry to check the job again."
                    .to_string()
            }
            DiffClientError::ComparisonFailed { message }
            | DiffClientError::InternalError { message }
            | DiffClientError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// ── Page-level errors ────────────────────────────────────────────────────

/// Which of the two documents a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    /// The first uploaded document (`file1`).
    Left,
    /// The second uploaded document (`file2`).
    Right,
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::RenderedPage`] when a page fails.
/// Rendering continues with the next page.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageRenderError {
    /// pdfium could not load or rasterise one side of the page.
    #[error("Page {page} ({column:?}): rasterisation failed: {detail}")]
    RenderFailed {
        page: usize,
        column: Column,
        detail: String,
    },

    /// The composed image could not be encoded or written.
    #[error("Page {page}: could not write image: {detail}")]
    WriteFailed { page: usize, detail: String },
}

//! HTTP client for the comparison backend.
//!
//! [`ComparisonBackend`] is the seam the rest of the crate talks to; the
//! upload manager, polling service and stores never see reqwest. Tests swap
//! in an in-memory backend.
//!
//! ## Retries
//!
//! Status, file, diff and export GETs are idempotent and are retried when
//! the request produced no response at all (connect failure, reset, timeout),
//! with exponential backoff (`retry_backoff_ms * 2^attempt`). A response with
//! an error status is never retried here: the backend has answered. The
//! upload is never retried because each POST creates a new job.

use crate::config::ClientConfig;
use crate::error::{ApiErrorBody, DiffClientError, ErrorCode};
use crate::model::{DiffReport, ExportFormat, FileSlot, JobStatusResponse, UploadResponse};
use crate::validation::{FileCandidate, PDF_MIME};
use async_trait::async_trait;
use futures::stream;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Size of the body chunks handed to the transport. Upload progress
/// advances once per chunk.
pub const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Byte-level upload progress: `(sent, total)`.
pub type ByteProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Operations offered by the comparison service.
#[async_trait]
pub trait ComparisonBackend: Send + Sync {
    /// `POST /upload` with parts `file1` and `file2`.
    async fn upload(
        &self,
        first: &FileCandidate,
        second: &FileCandidate,
        progress: ByteProgress,
    ) -> Result<UploadResponse, DiffClientError>;

    /// `GET /jobs/{id}`.
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, DiffClientError>;

    /// `GET /jobs/{id}/files/{file1|file2}`: raw PDF bytes.
    async fn job_file(&self, job_id: &str, slot: FileSlot) -> Result<Vec<u8>, DiffClientError>;

    /// `GET /jobs/{id}/diff`.
    async fn job_diff(&self, job_id: &str) -> Result<DiffReport, DiffClientError>;

    /// `GET /jobs/{id}/export?format=…`: the report blob.
    async fn export(&self, job_id: &str, format: ExportFormat)
        -> Result<Vec<u8>, DiffClientError>;
}

/// reqwest-backed [`ComparisonBackend`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, DiffClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("edgequake-pdfdiff/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DiffClientError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn transport_error(&self, e: reqwest::Error) -> DiffClientError {
        if e.is_timeout() {
            DiffClientError::RequestTimeout {
                secs: self.config.request_timeout_secs,
            }
        } else {
            DiffClientError::NetworkError {
                detail: e.to_string(),
            }
        }
    }

    /// GET `path`, retrying transport failures. Non-2xx responses are
    /// mapped to errors without retrying.
    async fn get(&self, path: &str, job_id: &str) -> Result<Vec<u8>, DiffClientError> {
        let url = self.config.endpoint(path);
        let max_retries = self.config.max_request_retries;
        let mut attempt = 0u32;

        loop {
            if attempt > 0 {
                sleep(self.config.request_backoff(attempt)).await;
            }

            let result = match self.http.get(&url).send().await {
                Ok(resp) => self.read_body(resp, job_id).await,
                Err(e) => Err(self.transport_error(e)),
            };
            match result {
                Err(err) if err.is_transport() && attempt < max_retries => {
                    attempt += 1;
                    warn!("GET {}: {} (retry {}/{})", url, err, attempt, max_retries);
                }
                other => return other,
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        job_id: &str,
    ) -> Result<T, DiffClientError> {
        let body = self.get(path, job_id).await?;
        decode(&body)
    }

    async fn read_body(
        &self,
        resp: reqwest::Response,
        job_id: &str,
    ) -> Result<Vec<u8>, DiffClientError> {
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            let text = String::from_utf8_lossy(&body);
            Err(map_error_body(status.as_u16(), &text, job_id))
        }
    }
}

#[async_trait]
impl ComparisonBackend for ApiClient {
    async fn upload(
        &self,
        first: &FileCandidate,
        second: &FileCandidate,
        progress: ByteProgress,
    ) -> Result<UploadResponse, DiffClientError> {
        let a = read_file(&first.path).await?;
        let b = read_file(&second.path).await?;
        let total = (a.len() + b.len()) as u64;
        let sent = Arc::new(AtomicU64::new(0));

        let form = Form::new()
            .part(
                "file1",
                counted_part(a, &first.name, total, sent.clone(), progress.clone())?,
            )
            .part("file2", counted_part(b, &second.name, total, sent, progress)?);

        let url = self.config.endpoint("/upload");
        info!("Uploading {} + {} ({} bytes)", first.name, second.name, total);
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = self.read_body(resp, "").await?;
        let created: UploadResponse = decode(&body)?;
        debug!("Upload accepted: job {}", created.job_id);
        Ok(created)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, DiffClientError> {
        self.get_json(&format!("/jobs/{job_id}"), job_id).await
    }

    async fn job_file(&self, job_id: &str, slot: FileSlot) -> Result<Vec<u8>, DiffClientError> {
        self.get(&format!("/jobs/{job_id}/files/{}", slot.as_str()), job_id)
            .await
    }

    async fn job_diff(&self, job_id: &str) -> Result<DiffReport, DiffClientError> {
        self.get_json(&format!("/jobs/{job_id}/diff"), job_id).await
    }

    async fn export(
        &self,
        job_id: &str,
        format: ExportFormat,
    ) -> Result<Vec<u8>, DiffClientError> {
        self.get(
            &format!("/jobs/{job_id}/export?format={}", format.as_str()),
            job_id,
        )
        .await
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, DiffClientError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DiffClientError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DiffClientError::FileNotFound {
            path: path.to_path_buf(),
        },
    })
}

/// A multipart part whose body reports bytes as the transport pulls them.
fn counted_part(
    data: Vec<u8>,
    name: &str,
    total: u64,
    sent: Arc<AtomicU64>,
    progress: ByteProgress,
) -> Result<Part, DiffClientError> {
    let len = data.len() as u64;
    let chunks: Vec<Vec<u8>> = data
        .chunks(UPLOAD_CHUNK_BYTES)
        .map(<[u8]>::to_vec)
        .collect();
    let body = stream::iter(chunks.into_iter().map(move |chunk| {
        let now = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
        progress(now, total);
        Ok::<_, std::io::Error>(chunk)
    }));

    Part::stream_with_length(reqwest::Body::wrap_stream(body), len)
        .file_name(name.to_string())
        .mime_str(PDF_MIME)
        .map_err(|e| DiffClientError::Internal(format!("multipart: {e}")))
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, DiffClientError> {
    serde_json::from_slice(body).map_err(|e| DiffClientError::InvalidResponse(e.to_string()))
}

/// Map a non-2xx response to the error taxonomy.
///
/// The body is expected to be `{error, message, …}`; anything else falls
/// back to the status line.
pub fn map_error_body(status: u16, body: &str, job_id: &str) -> DiffClientError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = ErrorCode::from_wire(&parsed.error);
    let message = if parsed.message.is_empty() {
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed.starts_with('{') {
            format!("HTTP {status}")
        } else {
            trimmed.chars().take(200).collect()
        }
    } else {
        parsed.message
    };

    match code {
        ErrorCode::JobNotFound => DiffClientError::JobNotFound {
            job_id: job_id.to_string(),
        },
        _ if status == 404 && !job_id.is_empty() => DiffClientError::JobNotFound {
            job_id: job_id.to_string(),
        },
        ErrorCode::ComparisonFailed => DiffClientError::ComparisonFailed { message },
        ErrorCode::InternalError => DiffClientError::InternalError { message },
        ErrorCode::Unknown if status >= 500 => DiffClientError::InternalError { message },
        code => DiffClientError::Api {
            status,
            code,
            message,
        },
    }
}

//! In-memory backend shared by the unit tests.

use crate::api::{ByteProgress, ComparisonBackend};
use crate::error::DiffClientError;
use crate::model::{
    DiffReport, ExportFormat, FileSlot, JobStatus, JobStatusResponse, UploadResponse,
};
use crate::validation::FileCandidate;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type StatusScript = Box<dyn Fn(usize) -> Result<JobStatusResponse, DiffClientError> + Send + Sync>;

/// Scripted backend. `status` receives the 0-based call index.
pub(crate) struct FakeBackend {
    pub upload_steps: u64,
    pub status: StatusScript,
    pub status_calls: Mutex<Vec<Instant>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            upload_steps: 4,
            status: Box::new(|_| Ok(status_response("job-1", JobStatus::Processing))),
            status_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_upload_steps(mut self, steps: u64) -> Self {
        self.upload_steps = steps;
        self
    }

    pub fn with_status<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> Result<JobStatusResponse, DiffClientError> + Send + Sync + 'static,
    {
        self.status = Box::new(f);
        self
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.status_calls.lock().unwrap().clone()
    }

    /// Gaps between consecutive status calls, in milliseconds.
    pub fn call_gaps_ms(&self) -> Vec<u128> {
        self.call_times()
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect()
    }
}

pub(crate) fn status_response(job_id: &str, status: JobStatus) -> JobStatusResponse {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    JobStatusResponse {
        job_id: job_id.to_string(),
        status,
        created_at: t,
        updated_at: t,
        result: None,
        error_message: (status == JobStatus::Failed).then(|| "boom".to_string()),
    }
}

pub(crate) fn network_error() -> DiffClientError {
    DiffClientError::NetworkError {
        detail: "connection refused".into(),
    }
}

pub(crate) fn pdf_pair() -> (FileCandidate, FileCandidate) {
    (
        FileCandidate::new("/in/a.pdf", "a.pdf", 10, "application/pdf"),
        FileCandidate::new("/in/b.pdf", "b.pdf", 20, "application/pdf"),
    )
}

#[async_trait]
impl ComparisonBackend for FakeBackend {
    /// One progress tick per 10 ms, then a `job-1` acceptance.
    async fn upload(
        &self,
        _first: &FileCandidate,
        _second: &FileCandidate,
        progress: ByteProgress,
    ) -> Result<UploadResponse, DiffClientError> {
        for i in 1..=self.upload_steps {
            tokio::time::sleep(Duration::from_millis(10)).await;
            progress(i, self.upload_steps);
        }
        Ok(UploadResponse {
            job_id: "job-1".into(),
            status: JobStatus::Pending,
            created_at: None,
        })
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobStatusResponse, DiffClientError> {
        let index = {
            let mut calls = self.status_calls.lock().unwrap();
            calls.push(Instant::now());
            calls.len() - 1
        };
        (self.status)(index)
    }

    async fn job_file(&self, _: &str, _: FileSlot) -> Result<Vec<u8>, DiffClientError> {
        Ok(b"%PDF-1.4".to_vec())
    }

    async fn job_diff(&self, _: &str) -> Result<DiffReport, DiffClientError> {
        Ok(DiffReport::default())
    }

    async fn export(&self, _: &str, format: ExportFormat) -> Result<Vec<u8>, DiffClientError> {
        Ok(format.as_str().as_bytes().to_vec())
    }
}

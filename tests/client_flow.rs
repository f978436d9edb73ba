//! Select → upload → poll, driven through the public stores against a
//! scripted in-memory backend. Timers run on paused tokio time, so the
//! polling cadence is asserted exactly.

use async_trait::async_trait;
use edgequake_pdfdiff::api::ByteProgress;
use edgequake_pdfdiff::model::{FileSlot, JobStatusResponse, UploadResponse};
use edgequake_pdfdiff::stream::PollEvent;
use edgequake_pdfdiff::{
    watch_job, ComparisonBackend, DiffClientError, DiffReport, ErrorCode, ExportFormat,
    FileCandidate, JobStatus, JobStore, PollingConfig, SessionStore, UploadManager, UploadStore,
};
use futures::StreamExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Step {
    Status(JobStatus),
    Unreachable,
}

/// Backend whose status answers follow a script; the last step repeats.
struct ScriptedBackend {
    upload_steps: u64,
    upload_step: Duration,
    script: Vec<Step>,
    status_calls: Mutex<Vec<Instant>>,
    uploads: Mutex<u32>,
}

impl ScriptedBackend {
    fn new(script: Vec<Step>) -> Self {
        Self {
            upload_steps: 4,
            upload_step: Duration::from_millis(500),
            script,
            status_calls: Mutex::new(Vec::new()),
            uploads: Mutex::new(0),
        }
    }

    fn slow_upload(mut self, steps: u64, step: Duration) -> Self {
        self.upload_steps = steps;
        self.upload_step = step;
        self
    }

    fn status_call_count(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    fn gaps_ms(&self) -> Vec<u128> {
        let calls = self.status_calls.lock().unwrap();
        calls
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect()
    }
}

fn response(job_id: &str, status: JobStatus) -> JobStatusResponse {
    let mut body = serde_json::json!({
        "job_id": job_id,
        "status": status,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:30Z",
    });
    match status {
        JobStatus::Completed => {
            body["result"] = serde_json::json!({
                "total_differences": 3,
                "pages_affected": 2,
                "differences_by_page": {
                    "1": {"additions": [{"id": "a", "type": "addition",
                          "location": {"x": 1, "y": 2, "width": 3, "height": 4}}]},
                    "2": {"deletions": [
                        {"id": "b", "type": "deletion",
                         "location": {"x": 1, "y": 2, "width": 3, "height": 4}},
                        {"id": "c", "type": "deletion",
                         "location": {"x": 5, "y": 6, "width": 7, "height": 8}}
                    ]}
                }
            });
        }
        JobStatus::Failed => {
            body["error_message"] = serde_json::json!("Could not parse file2");
        }
        _ => {}
    }
    serde_json::from_value(body).unwrap()
}

#[async_trait]
impl ComparisonBackend for ScriptedBackend {
    async fn upload(
        &self,
        first: &FileCandidate,
        second: &FileCandidate,
        progress: ByteProgress,
    ) -> Result<UploadResponse, DiffClientError> {
        let total = first.size + second.size;
        for step in 1..=self.upload_steps {
            tokio::time::sleep(self.upload_step).await;
            progress(total * step / self.upload_steps, total);
        }
        let n = {
            let mut uploads = self.uploads.lock().unwrap();
            *uploads += 1;
            *uploads
        };
        Ok(UploadResponse {
            job_id: format!("job-{n}"),
            status: JobStatus::Pending,
            created_at: None,
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, DiffClientError> {
        let i = {
            let mut calls = self.status_calls.lock().unwrap();
            calls.push(Instant::now());
            calls.len() - 1
        };
        let step = self.script[i.min(self.script.len() - 1)];
        match step {
            Step::Status(status) => Ok(response(job_id, status)),
            Step::Unreachable => Err(DiffClientError::NetworkError {
                detail: "connection refused".into(),
            }),
        }
    }

    async fn job_file(&self, _job_id: &str, _slot: FileSlot) -> Result<Vec<u8>, DiffClientError> {
        Ok(b"%PDF-1.4".to_vec())
    }

    async fn job_diff(&self, _job_id: &str) -> Result<DiffReport, DiffClientError> {
        Ok(DiffReport::default())
    }

    async fn export(
        &self,
        _job_id: &str,
        _format: ExportFormat,
    ) -> Result<Vec<u8>, DiffClientError> {
        Ok(Vec::new())
    }
}

fn write_pdf(dir: &Path, name: &str, len: usize) -> FileCandidate {
    let path = dir.join(name);
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(len.max(bytes.len()), b' ');
    std::fs::write(&path, bytes).unwrap();
    FileCandidate::from_path(&path).unwrap()
}

fn pair(dir: &Path) -> Vec<FileCandidate> {
    vec![
        write_pdf(dir, "contract-v1.pdf", 4_000),
        write_pdf(dir, "contract-v2.pdf", 6_000),
    ]
}

// ── Upload ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_upload_then_resume_and_poll_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let session = Arc::new(SessionStore::at(dir.path().join("session.json")));
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Status(JobStatus::Pending),
        Step::Status(JobStatus::Processing),
        Step::Status(JobStatus::Processing),
        Step::Status(JobStatus::Completed),
    ]));

    let uploads = UploadStore::new(
        Arc::new(UploadManager::new(backend.clone())),
        Some(session.clone()),
    );
    uploads.select_files(pair(dir.path())).unwrap();
    assert!(session.load_upload_draft().is_some(), "selection is drafted");

    let job_id = uploads.submit().await.unwrap();
    assert_eq!(job_id, "job-1");
    let state = uploads.state();
    assert!(!state.is_uploading);
    assert_eq!(state.upload_progress, 100);
    assert!(state.selected_files.is_empty());
    assert!(state.error.is_none());
    assert!(session.load_upload_draft().is_none(), "draft cleared on success");
    assert_eq!(session.last_job_id().as_deref(), Some("job-1"));

    // A fresh store picks the job up from the session.
    let jobs = JobStore::new(backend.clone(), PollingConfig::default(), Some(session));
    let loaded = jobs.resume_last_job().await.unwrap().unwrap();
    assert_eq!(loaded.job_id.as_deref(), Some("job-1"));
    assert!(loaded.is_polling);

    let settled = jobs.wait_until_settled().await;
    assert!(!settled.is_polling);
    assert!(settled.poll_error.is_none());
    let job = settled.job.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result.total_differences, 3);
    assert_eq!(result.page(2).unwrap().deletions.len(), 2);

    // load_job's fetch, then the poller's immediate fetch, then every 3 s.
    assert_eq!(backend.status_call_count(), 4);
    assert_eq!(&backend.gaps_ms()[1..], &[3000, 3000]);
}

#[tokio::test(start_paused = true)]
async fn test_progress_is_published_while_uploading() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(
        ScriptedBackend::new(vec![Step::Status(JobStatus::Pending)])
            .slow_upload(4, Duration::from_secs(1)),
    );
    let uploads = Arc::new(UploadStore::new(
        Arc::new(UploadManager::new(backend)),
        None,
    ));
    uploads.select_files(pair(dir.path())).unwrap();

    let task = tokio::spawn({
        let uploads = uploads.clone();
        async move { uploads.submit().await }
    });

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let mid = uploads.state();
    assert!(mid.is_uploading);
    assert_eq!(mid.upload_progress, 50);

    assert_eq!(task.await.unwrap().unwrap(), "job-1");
    assert_eq!(uploads.state().upload_progress, 100);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_keeps_selection_for_retry() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(
        ScriptedBackend::new(vec![Step::Status(JobStatus::Pending)])
            .slow_upload(10, Duration::from_secs(1)),
    );
    let uploads = Arc::new(UploadStore::new(
        Arc::new(UploadManager::new(backend)),
        None,
    ));
    uploads.select_files(pair(dir.path())).unwrap();

    let task = tokio::spawn({
        let uploads = uploads.clone();
        async move { uploads.submit().await }
    });
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    uploads.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_cancellation());
    let state = uploads.state();
    assert!(!state.is_uploading);
    assert_eq!(state.upload_progress, 0);
    assert_eq!(state.error.as_deref(), Some("Upload cancelled by user"));
    assert_eq!(state.selected_files.len(), 2, "selection survives a cancel");

    // The same selection uploads cleanly on retry; the aborted attempt
    // never reached the backend's accept step.
    assert_eq!(uploads.submit().await.unwrap(), "job-1");
}

#[tokio::test]
async fn test_invalid_selection_is_rejected_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(ScriptedBackend::new(vec![Step::Status(JobStatus::Pending)]));
    let uploads = UploadStore::new(Arc::new(UploadManager::new(backend)), None);

    let one = vec![write_pdf(dir.path(), "only.pdf", 100)];
    let err = uploads.select_files(one).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidFileCount);
    assert_eq!(
        uploads.state().error.as_deref(),
        Some("Please select exactly 2 PDF files (got 1)")
    );

    let same = write_pdf(dir.path(), "twice.pdf", 100);
    let err = uploads
        .select_files(vec![same.clone(), same])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateFiles);
    assert!(uploads.state().selected_files.is_empty());

    uploads.select_files(pair(dir.path())).unwrap();
    assert!(uploads.state().error.is_none());
    assert_eq!(uploads.state().selected_files.len(), 2);
}

#[tokio::test]
async fn test_draft_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let backend = Arc::new(ScriptedBackend::new(vec![Step::Status(JobStatus::Pending)]));

    {
        let uploads = UploadStore::new(
            Arc::new(UploadManager::new(backend.clone())),
            Some(Arc::new(SessionStore::at(&path))),
        );
        uploads.select_files(pair(dir.path())).unwrap();
    }

    let restarted = UploadStore::new(
        Arc::new(UploadManager::new(backend)),
        Some(Arc::new(SessionStore::at(&path))),
    );
    let draft = restarted.restored_draft().unwrap();
    assert_eq!(draft.file_names, vec!["contract-v1.pdf", "contract-v2.pdf"]);
    assert_eq!(draft.file_sizes, vec![4_000, 6_000]);
}

// ── Polling ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stream_reports_backoff_then_completion() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Unreachable,
        Step::Unreachable,
        Step::Status(JobStatus::Processing),
        Step::Status(JobStatus::Completed),
    ]));

    let events: Vec<PollEvent> = watch_job(backend.clone(), "job-1", PollingConfig::default())
        .collect()
        .await;

    assert_eq!(events.len(), 4);
    assert!(matches!(
        events[0],
        PollEvent::Error { code: ErrorCode::NetworkError, retry_count: 1, terminal: false, .. }
    ));
    assert!(matches!(
        events[1],
        PollEvent::Error { retry_count: 2, terminal: false, .. }
    ));
    assert!(matches!(&events[2], PollEvent::Status(job) if job.status == JobStatus::Processing));
    assert!(matches!(&events[3], PollEvent::Finished(job) if job.status == JobStatus::Completed));

    // 2 s and 4 s of backoff, then the regular 3 s interval.
    assert_eq!(backend.gaps_ms(), vec![2000, 4000, 3000]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_stops_polling_with_message() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Status(JobStatus::Processing),
        Step::Status(JobStatus::Failed),
    ]));
    let jobs = JobStore::new(backend.clone(), PollingConfig::default(), None);
    jobs.load_job("job-1").await.unwrap();

    let settled = jobs.wait_until_settled().await;
    let job = settled.job.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("Could not parse file2"));
    assert!(job.result.is_none());
    assert!(!settled.is_polling);

    // No further fetches once terminal.
    let calls = backend.status_call_count();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.status_call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_polling_can_be_retried() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Status(JobStatus::Processing),
        Step::Unreachable,
        Step::Unreachable,
        Step::Unreachable,
        Step::Unreachable,
        Step::Status(JobStatus::Completed),
    ]));
    let jobs = JobStore::new(backend.clone(), PollingConfig::default(), None);
    jobs.load_job("job-1").await.unwrap();

    let gave_up = jobs.wait_until_settled().await;
    assert!(!gave_up.is_polling);
    assert!(!gave_up.is_terminal());
    assert!(gave_up
        .poll_error
        .as_deref()
        .unwrap()
        .starts_with("Lost contact with the comparison service"));
    assert_eq!(backend.status_call_count(), 5);

    // The user-initiated retry starts a fresh run.
    jobs.start_polling();
    let settled = jobs.wait_until_settled().await;
    assert_eq!(settled.job.unwrap().status, JobStatus::Completed);
    assert!(settled.poll_error.is_none());
    assert_eq!(settled.retry_count, 0);
}

//! Job state: the tracked job, polling status and viewer position.

use crate::api::ComparisonBackend;
use crate::config::{clamp_zoom, PollingConfig};
use crate::error::DiffClientError;
use crate::model::ComparisonJob;
use crate::polling::{PollingObserver, PollingService};
use crate::storage::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Zoom change per step, in percent.
pub const ZOOM_STEP: u32 = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct JobState {
    pub job_id: Option<String>,
    pub job: Option<ComparisonJob>,
    pub is_polling: bool,
    pub poll_error: Option<String>,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    /// 1-based.
    pub current_page: u32,
    /// Percent.
    pub zoom: u32,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            job_id: None,
            job: None,
            is_polling: false,
            poll_error: None,
            last_poll_at: None,
            retry_count: 0,
            current_page: 1,
            zoom: 100,
        }
    }
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        self.job.as_ref().is_some_and(|j| j.status.is_terminal())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobAction {
    /// Assign the job id. Ignored once a different id is set.
    SetJobId(String),
    /// A fetched job snapshot.
    SetJob {
        job: ComparisonJob,
        polled_at: DateTime<Utc>,
    },
    StartPolling,
    StopPolling,
    /// A non-terminal fetch failure; polling continues.
    PollRetry { retry_count: u32, error: String },
    /// Polling gave up, or the first fetch failed.
    SetPollError { error: String, retry_count: u32 },
    SetCurrentPage(u32),
    SetZoom(u32),
    ClearJob,
}

/// Job transition table.
pub fn reduce(state: &JobState, action: JobAction) -> JobState {
    let mut next = state.clone();
    match action {
        JobAction::SetJobId(id) => match &state.job_id {
            Some(existing) if *existing != id => {}
            _ => next.job_id = Some(id),
        },
        JobAction::SetJob { job, polled_at } => {
            if state.job_id.as_ref().is_some_and(|id| *id != job.id) || state.is_terminal() {
                return next;
            }
            next.job_id = Some(job.id.clone());
            next.last_poll_at = Some(polled_at);
            next.poll_error = None;
            next.retry_count = 0;
            if job.status.is_terminal() {
                next.is_polling = false;
            }
            next.job = Some(job);
        }
        JobAction::StartPolling => {
            if state.job_id.is_some() && !state.is_terminal() {
                next.is_polling = true;
                next.poll_error = None;
                next.retry_count = 0;
            }
        }
        JobAction::StopPolling => {
            next.is_polling = false;
        }
        JobAction::PollRetry { retry_count, error } => {
            if state.is_polling {
                next.retry_count = retry_count;
                next.poll_error = Some(error);
            }
        }
        JobAction::SetPollError { error, retry_count } => {
            next.is_polling = false;
            next.retry_count = retry_count;
            next.poll_error = Some(error);
        }
        JobAction::SetCurrentPage(page) => {
            next.current_page = page.max(1);
        }
        JobAction::SetZoom(zoom) => {
            next.zoom = clamp_zoom(zoom);
        }
        JobAction::ClearJob => {
            next = JobState::default();
        }
    }
    next
}

/// Owns the job state and drives a [`PollingService`].
pub struct JobStore {
    tx: Arc<watch::Sender<JobState>>,
    backend: Arc<dyn ComparisonBackend>,
    polling: PollingService,
    session: Option<Arc<SessionStore>>,
    /// Page count of the longer document, once known; 0 = unknown.
    total_pages: AtomicU32,
}

impl JobStore {
    pub fn new(
        backend: Arc<dyn ComparisonBackend>,
        polling: PollingConfig,
        session: Option<Arc<SessionStore>>,
    ) -> Self {
        let (tx, _rx) = watch::channel(JobState::default());
        Self {
            tx: Arc::new(tx),
            polling: PollingService::new(backend.clone(), polling),
            backend,
            session,
            total_pages: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> JobState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.tx.subscribe()
    }

    pub fn dispatch(&self, action: JobAction) {
        dispatch(&self.tx, action);
    }

    pub fn set_job_id(&self, job_id: &str) {
        self.dispatch(JobAction::SetJobId(job_id.to_string()));
        if let Some(session) = &self.session {
            session.save_last_job_id(job_id);
        }
    }

    /// Start polling the current job. No-op without a job id or once the
    /// job is terminal. Also the user-initiated retry after polling gave up.
    pub fn start_polling(&self) {
        let state = self.state();
        let Some(job_id) = state.job_id.clone() else {
            warn!("start_polling without a job id");
            return;
        };
        if state.is_terminal() {
            return;
        }
        self.dispatch(JobAction::StartPolling);
        let observer = Arc::new(StoreObserver {
            tx: self.tx.clone(),
        });
        self.polling.start(job_id, observer);
    }

    pub fn stop_polling(&self) {
        self.polling.stop();
        self.dispatch(JobAction::StopPolling);
    }

    /// Track a job id from an earlier session or a link: fetch its status
    /// once and keep polling if it has not finished.
    pub async fn load_job(&self, job_id: &str) -> Result<JobState, DiffClientError> {
        self.polling.stop();
        self.dispatch(JobAction::ClearJob);
        self.set_job_id(job_id);
        info!("Loading job {}", job_id);

        match self.backend.job_status(job_id).await {
            Ok(resp) => {
                let job = ComparisonJob::from(&resp);
                let finished = job.status.is_terminal();
                self.dispatch(JobAction::SetJob {
                    job,
                    polled_at: Utc::now(),
                });
                if !finished {
                    self.start_polling();
                }
                Ok(self.state())
            }
            Err(e) => {
                self.dispatch(JobAction::SetPollError {
                    error: e.user_message(),
                    retry_count: 0,
                });
                Err(e)
            }
        }
    }

    /// Reload the job saved by the previous session, if any.
    pub async fn resume_last_job(&self) -> Option<Result<JobState, DiffClientError>> {
        let job_id = self.session.as_ref()?.last_job_id()?;
        Some(self.load_job(&job_id).await)
    }

    /// Wait until polling is no longer running, returning the final
    /// snapshot. That covers a terminal job, exhausted retries and
    /// [`stop_polling`](Self::stop_polling); the latter leaves `poll_error`
    /// unset and the job non-terminal.
    pub async fn wait_until_settled(&self) -> JobState {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|s| !s.is_polling)
            .await
            .map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Forget the current job, including the saved id.
    pub fn clear(&self) {
        self.polling.stop();
        self.dispatch(JobAction::ClearJob);
        self.total_pages.store(0, Ordering::Relaxed);
        if let Some(session) = &self.session {
            session.clear_last_job_id();
        }
    }

    // ── Viewer ───────────────────────────────────────────────────────────

    /// Record the page count of the longer document.
    pub fn set_total_pages(&self, total: u32) {
        self.total_pages.store(total, Ordering::Relaxed);
        let page = self.state().current_page;
        if page > total.max(1) {
            self.go_to_page(total);
        }
    }

    /// Known page count: the documents' if set, else the highest page with
    /// differences, else 1.
    pub fn total_pages(&self) -> u32 {
        let known = self.total_pages.load(Ordering::Relaxed);
        if known > 0 {
            return known;
        }
        self.tx
            .borrow()
            .job
            .as_ref()
            .and_then(|j| j.result.as_ref())
            .and_then(|r| r.pages.iter().map(|p| p.number).max())
            .unwrap_or(1)
    }

    pub fn go_to_page(&self, page: u32) {
        let page = page.clamp(1, self.total_pages().max(1));
        self.dispatch(JobAction::SetCurrentPage(page));
    }

    pub fn next_page(&self) {
        self.go_to_page(self.state().current_page.saturating_add(1));
    }

    pub fn previous_page(&self) {
        self.go_to_page(self.state().current_page.saturating_sub(1));
    }

    pub fn set_zoom(&self, zoom: u32) {
        self.dispatch(JobAction::SetZoom(zoom));
    }

    pub fn zoom_in(&self) {
        self.set_zoom(self.state().zoom.saturating_add(ZOOM_STEP));
    }

    pub fn zoom_out(&self) {
        self.set_zoom(self.state().zoom.saturating_sub(ZOOM_STEP));
    }
}

fn dispatch(tx: &watch::Sender<JobState>, action: JobAction) {
    tx.send_modify(|state| *state = reduce(state, action));
}

/// Feeds polling events into the job reducer.
struct StoreObserver {
    tx: Arc<watch::Sender<JobState>>,
}

impl PollingObserver for StoreObserver {
    fn on_status_update(&self, job: &ComparisonJob) {
        dispatch(
            &self.tx,
            JobAction::SetJob {
                job: job.clone(),
                polled_at: Utc::now(),
            },
        );
    }

    fn on_complete(&self, job: &ComparisonJob) {
        debug!("Job {} settled as {}", job.id, job.status);
        dispatch(&self.tx, JobAction::StopPolling);
    }

    fn on_error(&self, error: &DiffClientError, retry_count: u32, terminal: bool) {
        let action = if terminal {
            JobAction::SetPollError {
                error: error.user_message(),
                retry_count,
            }
        } else {
            JobAction::PollRetry {
                retry_count,
                error: error.user_message(),
            }
        };
        dispatch(&self.tx, action);
    }
}

//! Job status polling with adaptive interval and bounded backoff.
//!
//! A [`PollingService`] owns at most one background task. The task fetches
//! the job status immediately, then sleeps for an interval chosen from the
//! time elapsed since polling started (see
//! [`PollingConfig::interval_for`]). Consecutive fetch failures back off
//! exponentially and, past `max_consecutive_errors`, end polling with a
//! terminal [`DiffClientError::PollingExhausted`]. Polling is never resumed
//! automatically after that; the caller has to start it again.
//!
//! ```text
//!            start()                terminal status
//!   Idle ───────────────► Polling ───────────────────► Completed | Failed
//!                           │  ▲        too many errors ──► Failed
//!                   stop()  │  │ start()
//!                           ▼  │
//!                        Cancelled
//! ```

use crate::api::ComparisonBackend;
use crate::config::PollingConfig;
use crate::error::DiffClientError;
use crate::model::{ComparisonJob, JobStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of a [`PollingService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    /// The job reached `completed`.
    Completed,
    /// The job reached `failed`, or polling gave up after repeated errors.
    Failed,
    /// Stopped by the caller while polling.
    Cancelled,
}

/// Receives polling events. All methods default to no-ops.
///
/// Called from the polling task; implementations must be `Send + Sync` and
/// must not block.
pub trait PollingObserver: Send + Sync {
    /// Every successful status fetch.
    fn on_status_update(&self, job: &ComparisonJob) {
        let _ = job;
    }

    /// Once, when the job reaches a terminal status.
    fn on_complete(&self, job: &ComparisonJob) {
        let _ = job;
    }

    /// A failed status fetch. `retry_count` is the number of consecutive
    /// failures so far; `terminal` is set on the last one, after which no
    /// further events arrive.
    fn on_error(&self, error: &DiffClientError, retry_count: u32, terminal: bool) {
        let _ = (error, retry_count, terminal);
    }
}

/// Observer that ignores every event.
pub struct NoopPollingObserver;

impl PollingObserver for NoopPollingObserver {}

#[derive(Debug)]
struct Inner {
    state: PollState,
    consecutive_errors: u32,
    /// Bumped on every start/stop so a superseded task can tell it is stale.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Polls one job at a time.
pub struct PollingService {
    backend: Arc<dyn ComparisonBackend>,
    config: PollingConfig,
    inner: Arc<Mutex<Inner>>,
}

impl PollingService {
    pub fn new(backend: Arc<dyn ComparisonBackend>, config: PollingConfig) -> Self {
        Self {
            backend,
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: PollState::Idle,
                consecutive_errors: 0,
                generation: 0,
                task: None,
            })),
        }
    }

    /// Start polling `job_id`, replacing any polling already in progress.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self, job_id: impl Into<String>, observer: Arc<dyn PollingObserver>) {
        let job_id = job_id.into();
        let mut inner = lock(&self.inner);
        if let Some(previous) = inner.task.take() {
            debug!("Replacing pending poll before starting {}", job_id);
            previous.abort();
        }
        inner.generation += 1;
        inner.state = PollState::Polling;
        inner.consecutive_errors = 0;

        info!("Polling job {}", job_id);
        let run = PollRun {
            job_id,
            generation: inner.generation,
            backend: self.backend.clone(),
            config: self.config.clone(),
            inner: self.inner.clone(),
            observer,
        };
        inner.task = Some(tokio::spawn(run.run()));
    }

    /// Stop polling. Idempotent and safe from any state: clears the pending
    /// timer and resets the error counter.
    pub fn stop(&self) {
        let mut inner = lock(&self.inner);
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        if inner.state == PollState::Polling {
            debug!("Polling cancelled");
            inner.state = PollState::Cancelled;
        }
        inner.generation += 1;
        inner.consecutive_errors = 0;
    }

    pub fn state(&self) -> PollState {
        lock(&self.inner).state
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollState::Polling
    }

    /// Consecutive failed fetches in the current run.
    pub fn consecutive_errors(&self) -> u32 {
        lock(&self.inner).consecutive_errors
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }
}

impl Drop for PollingService {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.inner).task.take() {
            task.abort();
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State owned by one background polling task.
struct PollRun {
    job_id: String,
    generation: u64,
    backend: Arc<dyn ComparisonBackend>,
    config: PollingConfig,
    inner: Arc<Mutex<Inner>>,
    observer: Arc<dyn PollingObserver>,
}

impl PollRun {
    async fn run(self) {
        let started = Instant::now();
        loop {
            let result = self.backend.job_status(&self.job_id).await;
            if !self.is_current() {
                return;
            }

            let delay = match result {
                Ok(response) => {
                    self.with_inner(|inner| inner.consecutive_errors = 0);
                    let job = ComparisonJob::from(&response);
                    debug!("Job {} is {}", job.id, job.status);
                    self.observer.on_status_update(&job);

                    if job.status.is_terminal() {
                        let state = match job.status {
                            JobStatus::Completed => PollState::Completed,
                            _ => PollState::Failed,
                        };
                        self.finish(state);
                        info!("Job {} finished: {}", job.id, job.status);
                        self.observer.on_complete(&job);
                        return;
                    }
                    self.config.interval_for(started.elapsed())
                }
                Err(err) => {
                    let count = self.with_inner(|inner| {
                        inner.consecutive_errors += 1;
                        inner.consecutive_errors
                    });
                    if count > self.config.max_consecutive_errors {
                        self.finish(PollState::Failed);
                        warn!("Giving up on job {} after {} failures", self.job_id, count);
                        let exhausted = DiffClientError::PollingExhausted {
                            retries: count,
                            last_error: err.to_string(),
                        };
                        self.observer.on_error(&exhausted, count, true);
                        return;
                    }
                    let backoff = self.config.backoff_for(count);
                    warn!(
                        "Status fetch for {} failed ({}); retry {}/{} in {:?}",
                        self.job_id, err, count, self.config.max_consecutive_errors, backoff
                    );
                    self.observer.on_error(&err, count, false);
                    backoff
                }
            };

            sleep(delay).await;
            if !self.is_current() {
                return;
            }
        }
    }

    fn is_current(&self) -> bool {
        let inner = lock(&self.inner);
        inner.generation == self.generation && inner.state == PollState::Polling
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        f(&mut lock(&self.inner))
    }

    fn finish(&self, state: PollState) {
        self.with_inner(|inner| {
            if inner.generation == self.generation {
                inner.state = state;
                inner.task = None;
            }
        });
    }
}

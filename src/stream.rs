//! Streaming job API: poll a job and consume the events as a `Stream`.
//!
//! [`watch_job`] wraps a [`PollingService`] and forwards its observer
//! callbacks as [`PollEvent`]s. The stream ends after the terminal event
//! (completion or exhausted retries); dropping it early stops polling.

use crate::api::ComparisonBackend;
use crate::config::PollingConfig;
use crate::error::{DiffClientError, ErrorCode};
use crate::model::ComparisonJob;
use crate::polling::{PollingObserver, PollingService};
use futures::stream::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// One polling event.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A successful, non-terminal fetch.
    Status(ComparisonJob),
    /// The job reached `completed` or `failed`. Last event.
    Finished(ComparisonJob),
    /// A failed fetch. When `terminal` is set polling has given up and this
    /// is the last event.
    Error {
        code: ErrorCode,
        message: String,
        retry_count: u32,
        terminal: bool,
    },
}

impl PollEvent {
    pub fn is_terminal(&self) -> bool {
        match self {
            PollEvent::Finished(_) => true,
            PollEvent::Error { terminal, .. } => *terminal,
            PollEvent::Status(_) => false,
        }
    }
}

/// A boxed stream of polling events.
pub type PollEventStream = Pin<Box<dyn Stream<Item = PollEvent> + Send>>;

struct Forwarder(mpsc::UnboundedSender<PollEvent>);

impl PollingObserver for Forwarder {
    fn on_status_update(&self, job: &ComparisonJob) {
        if !job.status.is_terminal() {
            let _ = self.0.send(PollEvent::Status(job.clone()));
        }
    }

    fn on_complete(&self, job: &ComparisonJob) {
        let _ = self.0.send(PollEvent::Finished(job.clone()));
    }

    fn on_error(&self, error: &DiffClientError, retry_count: u32, terminal: bool) {
        let _ = self.0.send(PollEvent::Error {
            code: error.code(),
            message: error.to_string(),
            retry_count,
            terminal,
        });
    }
}

/// Poll `job_id` until it finishes, yielding every event.
///
/// Must be called within a tokio runtime.
pub fn watch_job(
    backend: Arc<dyn ComparisonBackend>,
    job_id: impl Into<String>,
    config: PollingConfig,
) -> PollEventStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let service = PollingService::new(backend, config);
    service.start(job_id, Arc::new(Forwarder(tx)));

    // The service rides along with the stream; dropping the stream drops
    // the service, which aborts the polling task.
    let events = UnboundedReceiverStream::new(rx).map(move |event| {
        let _service = &service;
        event
    });
    Box::pin(events)
}

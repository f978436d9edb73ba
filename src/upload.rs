//! Upload manager: one cancellable two-file upload at a time.
//!
//! Starting an upload aborts whichever upload the manager was already
//! running. Cancellation is cooperative: the in-flight request future is
//! dropped as soon as the [`AbortSignal`] fires, and every progress report
//! checks the signal first, so nothing but the `AbortedByUser` outcome is
//! delivered after a cancel.

use crate::api::{ByteProgress, ComparisonBackend};
use crate::error::DiffClientError;
use crate::validation::FileCandidate;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info};

// ── Abort handle ─────────────────────────────────────────────────────────

/// Owner side of a cancellation flag.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observer side of a cancellation flag.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the controller aborts. Never resolves if the
    /// controller is dropped without aborting.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ── Manager ──────────────────────────────────────────────────────────────

struct InFlight {
    id: u64,
    controller: AbortController,
}

/// Runs uploads against a [`ComparisonBackend`], at most one at a time.
pub struct UploadManager {
    backend: Arc<dyn ComparisonBackend>,
    current: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
}

impl UploadManager {
    pub fn new(backend: Arc<dyn ComparisonBackend>) -> Self {
        Self {
            backend,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Upload `first` and `second` and return the new job id.
    ///
    /// `on_progress` receives whole percents in increasing order; 100 is
    /// delivered exactly once, after the backend accepted the job. A
    /// cancelled upload returns [`DiffClientError::AbortedByUser`] and
    /// reports nothing further.
    pub async fn upload<F>(
        &self,
        first: &FileCandidate,
        second: &FileCandidate,
        on_progress: F,
    ) -> Result<String, DiffClientError>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let controller = AbortController::new();
        let signal = controller.signal();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = self.slot().replace(InFlight { id, controller }) {
            debug!("Aborting upload #{} in favour of #{}", previous.id, id);
            previous.controller.abort();
        }

        let on_progress = Arc::new(on_progress);
        let byte_progress: ByteProgress = {
            let signal = signal.clone();
            let on_progress = on_progress.clone();
            let last = AtomicU8::new(0);
            Arc::new(move |sent: u64, total: u64| {
                if total == 0 || signal.is_aborted() {
                    return;
                }
                // 100 is reserved for the accepted response.
                let pct = ((sent.saturating_mul(100) + total / 2) / total).min(99) as u8;
                if last.fetch_max(pct, Ordering::AcqRel) < pct {
                    on_progress(pct);
                }
            })
        };

        let result = tokio::select! {
            biased;
            _ = signal.aborted() => Err(DiffClientError::AbortedByUser),
            r = self.backend.upload(first, second, byte_progress) => r,
        };

        {
            let mut slot = self.slot();
            if slot.as_ref().is_some_and(|f| f.id == id) {
                *slot = None;
            }
        }

        match result {
            _ if signal.is_aborted() => {
                info!("Upload #{} cancelled", id);
                Err(DiffClientError::AbortedByUser)
            }
            Ok(created) => {
                on_progress(100);
                info!("Upload #{} accepted as job {}", id, created.job_id);
                Ok(created.job_id)
            }
            Err(e) => Err(e),
        }
    }

    /// Abort the in-flight upload, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match self.slot().take() {
            Some(in_flight) => {
                in_flight.controller.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<InFlight>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Readiness barrier for surface mounting.
//!
//! Drawing may only begin once every surface the render pass will touch
//! exists. The barrier counts surfaces as they are mounted and releases
//! exactly once, when the count reaches the expected total.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug)]
pub struct ReadinessBarrier {
    expected: usize,
    ready: AtomicUsize,
    released: AtomicBool,
    notify: Notify,
}

impl ReadinessBarrier {
    /// A barrier waiting for `expected` surfaces. With nothing to wait for
    /// it starts released.
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            ready: AtomicUsize::new(0),
            released: AtomicBool::new(expected == 0),
            notify: Notify::new(),
        }
    }

    /// Count one surface as mounted. Returns `true` only for the call that
    /// releases the barrier; extra calls past the expected count are ignored.
    pub fn mark_ready(&self) -> bool {
        let counted = self
            .ready
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.expected).then_some(n + 1)
            });
        match counted {
            Ok(prev) if prev + 1 == self.expected => {
                let first = !self.released.swap(true, Ordering::AcqRel);
                if first {
                    debug!("All {} surfaces mounted", self.expected);
                    self.notify.notify_waiters();
                }
                first
            }
            _ => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::Acquire)
    }

    /// Wait until the barrier releases.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_released() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn releases_exactly_once() {
        let barrier = ReadinessBarrier::new(4);
        assert!(!barrier.mark_ready());
        assert!(!barrier.mark_ready());
        assert!(!barrier.mark_ready());
        assert!(!barrier.is_released());
        assert!(barrier.mark_ready());
        assert!(barrier.is_released());
        assert!(!barrier.mark_ready(), "later mounts never re-fire");
        assert_eq!(barrier.ready_count(), 4);
    }

    #[test]
    fn empty_barrier_starts_released() {
        let barrier = ReadinessBarrier::new(0);
        assert!(barrier.is_released());
        assert!(!barrier.mark_ready());
    }

    #[test]
    fn waiter_wakes_on_release() {
        let barrier = ReadinessBarrier::new(2);
        let mut wait = task::spawn(barrier.wait());
        assert_pending!(wait.poll());

        barrier.mark_ready();
        assert!(!wait.is_woken());
        assert_pending!(wait.poll());

        barrier.mark_ready();
        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }
}

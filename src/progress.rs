//! Progress-callback trait for per-page render events.
//!
//! Pass an [`Arc<dyn RenderProgressCallback>`] to
//! [`crate::render::render_comparison`] to follow the renderer page by page.
//! Callers can forward events to a channel, a log, or a terminal progress
//! bar without the library knowing how the host reports progress.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfdiff::RenderProgressCallback;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl RenderProgressCallback for CountingCallback {
//!     fn on_page_rendered(&self, page_num: usize, total_pages: usize, changes: usize) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {}/{} ({} changes)", page_num, total_pages, changes);
//!     }
//! }
//!
//! let cb: Arc<dyn RenderProgressCallback> = Arc::new(CountingCallback {
//!     written: AtomicUsize::new(0),
//! });
//! cb.on_render_start(2);
//! ```

use std::sync::Arc;

/// Called by the renderer as it works through the pages.
///
/// Calls arrive from the blocking render thread, so implementations must be
/// `Send + Sync`. All methods default to no-ops.
pub trait RenderProgressCallback: Send + Sync {
    /// Once, after both documents loaded and before the first page.
    fn on_render_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// A page was composed and written. `changes` counts the boxes drawn.
    fn on_page_rendered(&self, page_num: usize, total_pages: usize, changes: usize) {
        let _ = (page_num, total_pages, changes);
    }

    /// A page failed; rendering continues with the next one.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Once, after every selected page has been attempted.
    fn on_render_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A callback that ignores every event.
pub struct NoopRenderProgress;

impl RenderProgressCallback for NoopRenderProgress {}

/// Shared handle to a render progress callback.
pub type RenderProgress = Arc<dyn RenderProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        rendered: AtomicUsize,
        errors: AtomicUsize,
        success: AtomicUsize,
    }

    impl RenderProgressCallback for Tracking {
        fn on_page_rendered(&self, _page: usize, _total: usize, _changes: usize) {
            self.rendered.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _page: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_render_complete(&self, _total: usize, success_count: usize) {
            self.success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_accepts_everything() {
        let cb: RenderProgress = Arc::new(NoopRenderProgress);
        cb.on_render_start(3);
        cb.on_page_rendered(1, 3, 4);
        cb.on_page_error(2, 3, "bad xref");
        cb.on_render_complete(3, 2);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let t = Tracking::default();
        t.on_render_start(3);
        t.on_page_rendered(1, 3, 0);
        t.on_page_rendered(2, 3, 5);
        t.on_page_error(3, 3, "render failed");
        t.on_render_complete(3, 2);
        assert_eq!(t.rendered.load(Ordering::SeqCst), 2);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
        assert_eq!(t.success.load(Ordering::SeqCst), 2);
    }
}

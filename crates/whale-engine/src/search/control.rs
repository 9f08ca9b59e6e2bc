//! Search control: the abort flag shared by every worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation for one search.
///
/// Workers poll [`should_stop`](SearchControl::should_stop) at the top of
/// every node and every deepening iteration. Helpers additionally stop once
/// worker 0 has finished its own deepening loop.
#[derive(Debug)]
pub struct SearchControl {
    abort: Arc<AtomicBool>,
    main_finished: AtomicBool,
}

impl SearchControl {
    pub fn new(abort: Arc<AtomicBool>) -> Self {
        Self {
            abort,
            main_finished: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn should_stop(&self, worker_id: usize) -> bool {
        self.abort.load(Ordering::Relaxed)
            || (worker_id != 0 && self.main_finished.load(Ordering::Relaxed))
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Release the helpers once worker 0 is done.
    pub fn finish_main(&self) {
        self.main_finished.store(true, Ordering::Release);
    }
}

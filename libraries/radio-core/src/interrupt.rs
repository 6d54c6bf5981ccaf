//! Cooperative cancellation flag for slow operations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Best-effort "interrupt requested" flag
///
/// Set by callers before queuing a command that supersedes playback
/// (stop, forward, rewind, source changes). Long-running work on the worker
/// thread, such as stream connection attempts and resolver fetches, polls it
/// at safe points and gives up early. The flag is cleared when the next
/// command starts executing.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Create a cleared flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask in-flight work to abort
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear a pending request
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Check whether an abort was requested
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

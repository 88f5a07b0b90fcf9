//! Cooperative cancellation and recursion-depth checks.
//!
//! Every recursive entry point (binding extraction, property derivation, predicate
//! to constraint conversion) and every iteration of the xform loop calls
//! [`ExecGuard::check`]. The guard is cheap to clone; clones share the same flag.

use crate::error::{OptError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default recursion limit used by [`ExecGuard::default`].
pub const DEFAULT_MAX_DEPTH: usize = 512;

#[derive(Debug, Clone)]
pub struct ExecGuard {
    cancelled: Arc<AtomicBool>,
    max_depth: usize,
}

impl ExecGuard {
    pub fn new(max_depth: usize) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Handle that can raise the cancellation flag from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail fast if the search was cancelled or `depth` exceeds the limit.
    #[inline]
    pub fn check(&self, depth: usize) -> Result<()> {
        if self.is_cancelled() {
            return Err(OptError::Cancelled);
        }
        if depth > self.max_depth {
            return Err(OptError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }
}

impl Default for ExecGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Cloneable handle that cancels every guard sharing its flag.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_limit() {
        let guard = ExecGuard::new(3);
        assert!(guard.check(3).is_ok());
        assert_eq!(guard.check(4), Err(OptError::DepthExceeded { limit: 3 }));
    }

    #[test]
    fn test_cancel_is_shared_across_clones() {
        let guard = ExecGuard::default();
        let clone = guard.clone();
        guard.cancel_handle().cancel();
        assert_eq!(clone.check(0), Err(OptError::Cancelled));
    }
}

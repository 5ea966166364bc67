use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::core::error::{Error, Result};

/// Cooperative cancellation token
///
/// Long-running operations (bulk indexing, multi-layer search, reflection,
/// batch mutation) call `check()` at safe checkpoints. Timeouts are layered
/// on top as a deadline; child tokens observe the parent flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: None,
            deadline: None,
        }
    }

    /// Token that can never fire; for callers without cancellation needs
    pub fn never() -> Self {
        Self::new()
    }

    /// Child token sharing the parent flag, with its own deadline
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(self.cancelled.clone()),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Child token sharing the parent flag and deadline
    pub fn child(&self) -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(self.cancelled.clone()),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(parent) = &self.parent {
            if parent.load(Ordering::SeqCst) {
                return true;
            }
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Checkpoint: fail with `Cancelled` when the token has fired
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

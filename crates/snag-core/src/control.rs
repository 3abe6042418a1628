//! Cancellation plumbing shared between the orchestrator and transfers.
//!
//! A `CancelToken` is a cheap clonable flag. Child tokens chain to their
//! parent, so cancelling the batch cancels every download, while a chunked
//! download can cancel only its own sibling fetches. Transfer write callbacks
//! poll the token and abort the in-flight request when it fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error surfaced when a transfer is stopped by cancellation.
#[derive(Debug)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "download cancelled")
    }
}

impl std::error::Error for Cancelled {}

struct Inner {
    flag: AtomicBool,
    parent: Option<CancelToken>,
}

/// Hierarchical cancellation token.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Derives a child token: cancelled when either it or any ancestor is.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancels this token (and, through the chain, everything derived from it).
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.flag.load(Ordering::Relaxed) {
            return true;
        }
        match &self.inner.parent {
            Some(p) => p.is_cancelled(),
            None => false,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

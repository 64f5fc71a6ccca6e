//! Cooperative cancellation passed into every handler call.
//!
//! # Invariants
//! - Once cancelled, a signal stays cancelled.
//! - Clones share state.

use crate::error::{PersistError, PersistResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal nobody will ever cancel.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once the signal has fired.
    pub fn check(&self) -> PersistResult<()> {
        if self.is_cancelled() {
            Err(PersistError::Cancelled)
        } else {
            Ok(())
        }
    }
}

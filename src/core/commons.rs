// src/core/commons.rs

// Small helpers shared by the executor and the stream workers.

use crate::CancellationToken;
use crate::system::error::ProcessError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Creates a fresh, lowered cancellation token.
pub fn new_token() -> CancellationToken {
    Arc::new(AtomicBool::new(false))
}

pub fn is_cancelled(token: &CancellationToken) -> bool {
    token.load(Ordering::SeqCst)
}

/// Raises the token. Every holder of a clone observes it on its next check.
pub fn cancel(token: &CancellationToken) {
    token.store(true, Ordering::SeqCst);
}

/// Returns `Err(ProcessError::Cancelled)` once the token has been raised.
pub fn check_for_cancellation(token: &CancellationToken) -> Result<(), ProcessError> {
    if is_cancelled(token) {
        Err(ProcessError::Cancelled)
    } else {
        Ok(())
    }
}

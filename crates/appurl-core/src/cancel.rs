//! Cooperative cancellation for in-flight transfers.
//!
//! A [`CancelToken`] is cloned into every transfer. Setting it makes the
//! running transfer stop at its next chunk with [`Error::Interrupted`](crate::Error::Interrupted);
//! the store then removes the partial cache entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

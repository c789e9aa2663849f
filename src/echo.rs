//! Echo suppression
//!
//! A store notification caused by this client's own write must not be
//! re-applied on top of newer local state. The writer arms the guard right
//! before each store write; the next notification consumes it.

use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot flag with arm / consume-once semantics
#[derive(Debug, Default)]
pub struct EchoGuard {
    armed: AtomicBool,
}

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the next notification as this client's own echo
    ///
    /// Arming twice before a consume leaves a single pending echo.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    /// Read and clear the flag, returning whether it was armed
    pub fn consume(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

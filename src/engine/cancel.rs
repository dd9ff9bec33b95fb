//! Cooperative cancellation
//!
//! A token is bound to a transaction when it begins. Every store and
//! iterator operation checks it first and fails with `AERO_CANCELLED` once
//! the flag is set or the deadline has passed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{DbError, DbResult};

/// Shared cancellation flag with an optional deadline
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// A token that is never cancelled unless `cancel` is called
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    /// Returns a token sharing this flag, expiring at `deadline`.
    ///
    /// An existing earlier deadline wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            cancelled: self.cancelled.clone(),
            deadline: Some(deadline),
        }
    }

    /// Cancel every operation holding this token (or a clone of it)
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns `AERO_CANCELLED` when the token has fired
    pub fn check(&self) -> DbResult<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(DbError::cancelled("operation cancelled"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(DbError::cancelled("transaction deadline exceeded"));
            }
        }
        Ok(())
    }
}

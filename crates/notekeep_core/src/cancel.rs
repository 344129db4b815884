//! Cancellation signal and deadline enforcement for storage calls.
//!
//! # Responsibility
//! - Carry a caller-owned cancel flag plus an optional deadline.
//! - Abort running SQLite statements through the connection progress handler.
//!
//! # Invariants
//! - A signal that is already cancelled or expired never reaches the engine.
//! - An interrupted statement leaves no partial write: single statements are
//!   atomic and open transactions roll back on drop.

use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// SQLite VM instructions between two progress handler invocations.
const PROGRESS_CHECK_INTERVAL_OPS: i32 = 1_000;

/// Why a cancellable operation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

/// Cooperative cancellation handle.
///
/// Clones share the same flag, so a caller can keep one clone and hand another
/// to the operation it wants to be able to abort.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Signal that is never cancelled and has no deadline of its own.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::none().bounded(Some(timeout))
    }

    /// Returns a clone sharing the flag whose deadline is the earlier of the
    /// current one and `now + timeout`.
    pub fn bounded(&self, timeout: Option<Duration>) -> Self {
        let candidate = timeout.and_then(|value| Instant::now().checked_add(value));
        let deadline = match (self.deadline, candidate) {
            (Some(current), Some(next)) => Some(current.min(next)),
            (current, next) => current.or(next),
        };
        Self {
            flag: Arc::clone(&self.flag),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason this signal should stop work, if any.
    pub fn interruption(&self) -> Option<Interrupted> {
        if self.is_cancelled() {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        match self.interruption() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Checks the signal, then arms `conn` so that running statements abort
    /// once it fires. The handler is removed when the guard drops.
    pub(crate) fn watch<'conn>(
        &self,
        conn: &'conn Connection,
    ) -> Result<InterruptGuard<'conn>, Interrupted> {
        self.check()?;

        let flag = Arc::clone(&self.flag);
        let deadline = self.deadline;
        conn.progress_handler(
            PROGRESS_CHECK_INTERVAL_OPS,
            Some(move || {
                flag.load(Ordering::SeqCst)
                    || deadline.is_some_and(|deadline| Instant::now() >= deadline)
            }),
        );

        Ok(InterruptGuard { conn })
    }
}

/// Disarms the progress handler installed by [`Cancellation::watch`].
pub(crate) struct InterruptGuard<'conn> {
    conn: &'conn Connection,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

/// Returns whether `err` is SQLite reporting an interrupted statement.
pub(crate) fn is_interrupt_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::OperationInterrupted
    )
}

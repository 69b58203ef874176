//! Error types for the threading runtime.
//!
//! Plain enums with a manual `Display`, matching the rest of this
//! codebase's subsystem error types rather than pulling in an error
//! derive crate.

use core::fmt;

/// Failure modes for thread lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// `thread_create` was called with the maximum number of live
    /// threads already outstanding.
    TooManyThreads,
    /// `thread_join` named an id that was never assigned by this
    /// runtime.
    UnknownThread,
    /// The runtime has not been started (no call into the scheduler
    /// has happened yet, or it has already shut down).
    NotRunning,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::TooManyThreads => write!(f, "maximum live thread count exceeded"),
            ThreadError::UnknownThread => write!(f, "no thread was ever assigned that id"),
            ThreadError::NotRunning => write!(f, "threading runtime is not running"),
        }
    }
}

impl std::error::Error for ThreadError {}

/// Failure modes for mutex/condvar id allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// `Mutex::new` or `Condvar::new` was called with the maximum
    /// number of live ids of that kind already outstanding.
    TooManyMutexes,
    TooManyCondvars,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::TooManyMutexes => write!(f, "maximum live mutex count exceeded"),
            SyncError::TooManyCondvars => write!(f, "maximum live condition variable count exceeded"),
        }
    }
}

impl std::error::Error for SyncError {}

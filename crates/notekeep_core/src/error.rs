//! Caller-facing error classification.
//!
//! Every layer keeps its own typed error; adapters only need the coarse kind
//! to pick a response (HTTP status, exit code, retry decision).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Slug taken by an active note; regenerate and retry.
    SlugConflict,
    /// Stale version, missing note or deleted note; reload and retry.
    VersionMismatchOrMissing,
    NotFound,
    /// Transient engine failure (busy, locked, I/O).
    StorageUnavailable,
    Cancelled,
    TimedOut,
    InvalidInput,
    /// Schema, decoding or unexpected engine fault.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SlugConflict => "slug_conflict",
            Self::VersionMismatchOrMissing => "version_mismatch_or_missing",
            Self::NotFound => "not_found",
            Self::StorageUnavailable => "storage_unavailable",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        }
    }

    /// Whether retrying the same call later can succeed without new input.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::StorageUnavailable | Self::TimedOut)
    }
}

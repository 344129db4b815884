//! Domain model for the note consistency layer.
//!
//! # Responsibility
//! - Define the canonical note record and its write-side input shapes.
//! - Expose pure lifecycle predicates derived from persisted fields.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId` assigned at creation.
//! - Deletion is a soft-delete tombstone paired with a purge instant.

pub mod note;

//! Repository layer contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the note store contract used by slug allocation and lifecycle
//!   orchestration.
//! - Keep SQL details behind that contract.
//!
//! # Invariants
//! - Every mutating store call is one atomic engine request guarded by a
//!   filter; none is a read followed by an unconditional write.

pub mod note_store;

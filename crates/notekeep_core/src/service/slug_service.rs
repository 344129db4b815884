//! Unique slug allocation against stored notes.
//!
//! # Responsibility
//! - Pick a slug not currently used by any active note.
//!
//! # Invariants
//! - Probing is read-only; the unique index checked by `NoteStore::create` is
//!   what actually guarantees uniqueness.
//! - Probe exhaustion never fails the caller; it degrades to a random suffix.

use crate::cancel::Cancellation;
use crate::repo::note_store::{NoteStore, StoreResult};
use crate::slug::{random_hex, SlugGenerator};
use log::warn;

/// Finds a free slug for a title by probing numbered suffixes.
#[derive(Debug, Clone, Copy)]
pub struct SlugAllocator {
    generator: SlugGenerator,
    probe_attempts: u32,
}

impl SlugAllocator {
    /// `probe_attempts` counts every lookup, including the bare base slug.
    pub fn new(generator: SlugGenerator, probe_attempts: u32) -> Self {
        Self {
            generator,
            probe_attempts: probe_attempts.max(1),
        }
    }

    /// Returns `base`, `base-1`, `base-2`, ... whichever is free first.
    ///
    /// The result is only a good guess: a concurrent writer may still take it
    /// before the caller inserts.
    pub fn allocate<S: NoteStore>(
        &self,
        store: &S,
        title: &str,
        cancel: &Cancellation,
    ) -> StoreResult<String> {
        let base = self.generator.generate(title);

        for attempt in 0..self.probe_attempts {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                self.generator.with_suffix(&base, &attempt.to_string())
            };
            if store.get_by_slug(&candidate, cancel)?.is_none() {
                return Ok(candidate);
            }
        }

        warn!(
            "event=slug_allocate module=service status=fallback probe_attempts={}",
            self.probe_attempts
        );
        Ok(self.generator.with_suffix(&base, &random_hex()))
    }
}

//! Note lifecycle use-case service.
//!
//! # Responsibility
//! - Sequence slug allocation and note creation, recovering from slug races.
//! - Translate store outcomes (`applied = false`, missing rows) into typed
//!   errors callers can branch on.
//! - Bound every call with the configured operation timeout.
//!
//! # Invariants
//! - Only `create_note` retries, and only on `SlugConflict`, at most
//!   `create_attempts` times.
//! - `update_note` never retries; a stale version is the caller's decision.
//!
//! # See also
//! - `repo::note_store` for the guarded write semantics.

use crate::cancel::Cancellation;
use crate::config::CoreConfig;
use crate::error::ErrorKind;
use crate::model::note::{now_utc, Note, NoteChanges, NoteDraft, NoteId};
use crate::repo::note_store::{NoteSearchQuery, NoteStore, Page, PageRequest, StoreError};
use crate::service::slug_service::SlugAllocator;
use crate::slug::SlugGenerator;
use chrono::Duration as ChronoDuration;
use log::{info, warn};
use thiserror::Error;

/// Service error for note use-cases.
#[derive(Debug, Error)]
pub enum NoteServiceError {
    #[error("note not found: {0}")]
    NotFound(NoteId),
    #[error("no active note with slug `{0}`")]
    SlugNotFound(String),
    /// Missing, deleted, or changed since `expected_version` was read.
    #[error("note {0} is missing, deleted, or not at the expected version")]
    VersionMismatchOrMissing(NoteId),
    /// Slug races outlasted the retry budget.
    #[error("slug `{0}` stayed in conflict after all create attempts")]
    SlugConflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl NoteServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::SlugNotFound(_) => ErrorKind::NotFound,
            Self::VersionMismatchOrMissing(_) => ErrorKind::VersionMismatchOrMissing,
            Self::SlugConflict(_) => ErrorKind::SlugConflict,
            Self::Store(err) => err.kind(),
        }
    }
}

pub type ServiceResult<T> = Result<T, NoteServiceError>;

/// Note service facade over a store implementation.
pub struct NoteService<S: NoteStore> {
    store: S,
    config: CoreConfig,
    allocator: SlugAllocator,
}

impl<S: NoteStore> NoteService<S> {
    /// `config` is expected to have passed `CoreConfig::validate()`.
    pub fn new(store: S, config: CoreConfig) -> Self {
        let allocator = SlugAllocator::new(
            SlugGenerator::new(config.slug),
            config.slug_probe_attempts,
        );
        Self {
            store,
            config,
            allocator,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Allocates a slug for `draft.title`, inserts, and reads the note back.
    pub fn create_note(&self, draft: NoteDraft, cancel: &Cancellation) -> ServiceResult<Note> {
        let cancel = self.bounded(cancel);
        let attempts = self.config.create_attempts.max(1);
        let mut attempt = 1;

        let id = loop {
            let slug = self.allocator.allocate(&self.store, &draft.title, &cancel)?;
            let new_note = draft.clone().into_new_note(slug);
            match self.store.create(&new_note, &cancel) {
                Ok(id) => break id,
                Err(StoreError::SlugConflict(_)) if attempt < attempts => {
                    warn!(
                        "event=note_create module=service status=retry reason=slug_conflict attempt={} max_attempts={}",
                        attempt, attempts
                    );
                    attempt += 1;
                }
                Err(StoreError::SlugConflict(slug)) => {
                    warn!(
                        "event=note_create module=service status=error reason=slug_conflict attempts={}",
                        attempts
                    );
                    return Err(NoteServiceError::SlugConflict(slug));
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!(
            "event=note_create module=service status=ok attempts={}",
            attempt
        );
        // A concurrent soft-delete may hide the committed note before read-back.
        self.store
            .get_active(id, &cancel)?
            .ok_or(NoteServiceError::NotFound(id))
    }

    pub fn get_note(&self, id: NoteId, cancel: &Cancellation) -> ServiceResult<Note> {
        let cancel = self.bounded(cancel);
        self.store
            .get_active(id, &cancel)?
            .ok_or(NoteServiceError::NotFound(id))
    }

    pub fn get_note_by_slug(&self, slug: &str, cancel: &Cancellation) -> ServiceResult<Note> {
        let cancel = self.bounded(cancel);
        self.store
            .get_by_slug(slug, &cancel)?
            .ok_or_else(|| NoteServiceError::SlugNotFound(slug.to_string()))
    }

    /// Applies `changes` if the note is still at `expected_version`.
    ///
    /// Returns the stored note after the write. When another writer changes or
    /// deletes the note between the write and the read-back, the update stays
    /// committed and the call reports `VersionMismatchOrMissing` so the caller
    /// reloads.
    pub fn update_note(
        &self,
        id: NoteId,
        expected_version: u32,
        changes: NoteChanges,
        cancel: &Cancellation,
    ) -> ServiceResult<Note> {
        let cancel = self.bounded(cancel);
        let applied = self
            .store
            .update(id, expected_version, |current| changes.apply(current), &cancel)?;
        if !applied {
            return Err(NoteServiceError::VersionMismatchOrMissing(id));
        }

        match self.store.get_active(id, &cancel)? {
            Some(note) if note.version == expected_version.saturating_add(1) => Ok(note),
            _ => Err(NoteServiceError::VersionMismatchOrMissing(id)),
        }
    }

    /// Soft-deletes an active note. `purge_after` defaults to the configured
    /// retention.
    pub fn delete_note(
        &self,
        id: NoteId,
        purge_after: Option<ChronoDuration>,
        cancel: &Cancellation,
    ) -> ServiceResult<()> {
        let cancel = self.bounded(cancel);
        let purge_after = purge_after.unwrap_or_else(|| self.config.default_purge_after());
        if self.store.soft_delete(id, purge_after, &cancel)? {
            Ok(())
        } else {
            Err(NoteServiceError::NotFound(id))
        }
    }

    /// Brings a soft-deleted note back. Fails with a slug conflict when an
    /// active note has taken its slug meanwhile.
    pub fn restore_note(&self, id: NoteId, cancel: &Cancellation) -> ServiceResult<Note> {
        let cancel = self.bounded(cancel);
        if !self.store.restore(id, &cancel)? {
            return Err(NoteServiceError::NotFound(id));
        }

        self.store
            .get_active(id, &cancel)?
            .ok_or(NoteServiceError::NotFound(id))
    }

    pub fn search_notes(
        &self,
        query: &NoteSearchQuery,
        cancel: &Cancellation,
    ) -> ServiceResult<Page<Note>> {
        let cancel = self.bounded(cancel);
        Ok(self.store.search(query, &cancel)?)
    }

    pub fn list_deleted(
        &self,
        page: PageRequest,
        cancel: &Cancellation,
    ) -> ServiceResult<Page<Note>> {
        let cancel = self.bounded(cancel);
        Ok(self.store.list_deleted(page, &cancel)?)
    }

    /// Removes every soft-deleted note whose purge instant has passed.
    pub fn purge_expired(&self, cancel: &Cancellation) -> ServiceResult<u64> {
        let cancel = self.bounded(cancel);
        Ok(self.store.purge_expired(now_utc(), &cancel)?)
    }

    fn bounded(&self, cancel: &Cancellation) -> Cancellation {
        cancel.bounded(self.config.operation_timeout())
    }
}

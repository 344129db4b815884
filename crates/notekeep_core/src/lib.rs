//! Core domain logic for notekeep.
//! This crate is the single source of truth for note consistency rules:
//! unique slugs, optimistic versioning and the soft-delete lifecycle.

pub mod cancel;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod slug;

pub use cancel::{Cancellation, Interrupted};
pub use config::{ConfigError, CoreConfig, SlugRules};
pub use db::{open_db, open_db_in_memory, open_db_with, DbError, DbResult};
pub use error::ErrorKind;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::{NewNote, Note, NoteChanges, NoteDraft, NoteId, NoteState};
pub use repo::note_store::{
    NoteSearchQuery, NoteStore, Page, PageRequest, SqliteNoteStore, StoreError, StoreResult,
};
pub use search::fts::build_match_expression;
pub use service::note_service::{NoteService, NoteServiceError, ServiceResult};
pub use service::slug_service::SlugAllocator;
pub use slug::{is_valid_slug, SlugGenerator};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Note store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist note records and their tags.
//! - Enforce optimistic concurrency and the soft-delete state machine with
//!   filter-guarded writes.
//! - Surface slug uniqueness violations as a distinguishable conflict.
//!
//! # Invariants
//! - `update`, `soft_delete` and `restore` write through the same compound
//!   filter they read with; an affected-row count other than 1 means "not
//!   applied", never a partial write.
//! - Only the partial unique index decides slug uniqueness; nothing here checks
//!   a slug and then writes it.
//! - Read paths reject rows violating the tombstone pairing instead of masking
//!   them.
//! - Every operation is armed with the caller's cancellation signal.

use crate::cancel::{is_interrupt_error, Cancellation, Interrupted};
use crate::db::DbError;
use crate::error::ErrorKind;
use crate::model::note::{dedup_tags, now_utc, NewNote, Note, NoteId};
use crate::search::fts::{build_match_expression, map_query_error};
use crate::slug::is_valid_slug;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    notes.id,
    notes.title,
    notes.content,
    notes.slug,
    notes.version,
    notes.created_at,
    notes.updated_at,
    notes.deleted_at,
    notes.purge_at
FROM notes";

const DEFAULT_PAGE_SIZE: u32 = 10;

pub type StoreResult<T> = Result<T, StoreError>;

/// Note store error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The active-slug unique index rejected the write.
    #[error("slug `{0}` is already used by an active note")]
    SlugConflict(String),
    /// Busy, locked or failing engine; surfaced for the caller's retry policy.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] rusqlite::Error),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("invalid full-text query `{query}`: {message}")]
    InvalidQuery { query: String, message: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid persisted note data: {0}")]
    InvalidData(String),
    #[error("required table `{0}` is missing")]
    MissingRequiredTable(&'static str),
    #[error(transparent)]
    Db(DbError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SlugConflict(_) => ErrorKind::SlugConflict,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::Interrupted(Interrupted::Cancelled) => ErrorKind::Cancelled,
            Self::Interrupted(Interrupted::DeadlineExceeded) => ErrorKind::TimedOut,
            Self::InvalidQuery { .. } | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InvalidData(_) | Self::MissingRequiredTable(_) | Self::Db(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if is_unavailable_error(&value) {
            Self::StorageUnavailable(value)
        } else {
            Self::Db(DbError::Sqlite(value))
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

/// Offset pagination request; `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Rows skipped before this page. Page 0 is read as page 1; range checks
    /// belong to the caller.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1).saturating_mul(i64::from(self.page_size))
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Filters for active-note search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSearchQuery {
    /// Matched against title and content; blank counts as absent.
    pub text: Option<String>,
    /// A note matches only if it carries every one of these tags.
    pub tags: Vec<String>,
    pub page: PageRequest,
}

impl NoteSearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = PageRequest::new(page, page_size);
        self
    }
}

/// Persistence contract for notes.
///
/// Implementations hold no in-process locks; every concurrency decision is
/// made by the engine through guarded single-row writes.
pub trait NoteStore {
    /// Inserts a note at version 0 and returns its new id.
    ///
    /// Fails with `StoreError::SlugConflict` when an active note already owns
    /// `note.slug`.
    fn create(&self, note: &NewNote, cancel: &Cancellation) -> StoreResult<NoteId>;

    /// Returns the note only while it is not soft-deleted.
    fn get_active(&self, id: NoteId, cancel: &Cancellation) -> StoreResult<Option<Note>>;

    /// Looks a slug up among active notes, matching the uniqueness scope.
    fn get_by_slug(&self, slug: &str, cancel: &Cancellation) -> StoreResult<Option<Note>>;

    /// Active notes matching text and tag filters, newest first.
    fn search(&self, query: &NoteSearchQuery, cancel: &Cancellation) -> StoreResult<Page<Note>>;

    /// Read-modify-write guarded by `id`, `expected_version` and "not deleted".
    ///
    /// `mutate` receives the current snapshot and returns the next one; only
    /// title, content and tags are taken from it. Returns `false` when the
    /// note is missing, deleted, stale, or changed between read and write.
    fn update<F>(
        &self,
        id: NoteId,
        expected_version: u32,
        mutate: F,
        cancel: &Cancellation,
    ) -> StoreResult<bool>
    where
        F: FnOnce(Note) -> Note;

    /// Tombstones an active note; purge becomes allowed after `purge_after`.
    fn soft_delete(
        &self,
        id: NoteId,
        purge_after: ChronoDuration,
        cancel: &Cancellation,
    ) -> StoreResult<bool>;

    /// Clears the tombstone of a deleted note.
    fn restore(&self, id: NoteId, cancel: &Cancellation) -> StoreResult<bool>;

    /// Soft-deleted notes, most recently deleted first.
    fn list_deleted(&self, page: PageRequest, cancel: &Cancellation) -> StoreResult<Page<Note>>;

    /// Physically removes notes whose purge instant is at or before `now`.
    fn purge_expired(&self, now: DateTime<Utc>, cancel: &Cancellation) -> StoreResult<u64>;
}

/// SQLite-backed note store.
pub struct SqliteNoteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        for table in ["notes", "note_tags", "notes_fts"] {
            if !table_exists(conn, table)? {
                return Err(StoreError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    /// Runs `body` with `cancel` armed on the connection and logs the outcome.
    fn run<T>(
        &self,
        op: &'static str,
        cancel: &Cancellation,
        body: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = cancel
            .watch(self.conn)
            .map_err(StoreError::from)
            .and_then(|_guard| body(self.conn))
            .map_err(|err| resolve_interrupt(err, cancel));

        match &result {
            Ok(_) => debug!(
                "event=note_store module=repo op={} status=ok duration_ms={}",
                op,
                started_at.elapsed().as_millis()
            ),
            Err(err) => match err.kind() {
                ErrorKind::SlugConflict | ErrorKind::Cancelled | ErrorKind::TimedOut => warn!(
                    "event=note_store module=repo op={} status=error duration_ms={} error_kind={}",
                    op,
                    started_at.elapsed().as_millis(),
                    err.kind().as_str()
                ),
                kind => error!(
                    "event=note_store module=repo op={} status=error duration_ms={} error_kind={} error={}",
                    op,
                    started_at.elapsed().as_millis(),
                    kind.as_str(),
                    err
                ),
            },
        }
        result
    }
}

impl NoteStore for SqliteNoteStore<'_> {
    fn create(&self, note: &NewNote, cancel: &Cancellation) -> StoreResult<NoteId> {
        if !is_valid_slug(&note.slug) {
            return Err(StoreError::InvalidInput(format!(
                "slug `{}` must be non-empty and match ^[a-z0-9-]+$",
                note.slug
            )));
        }

        self.run("create", cancel, |conn| {
            let id = Uuid::new_v4();
            let id_text = id.to_string();
            let now_ms = now_utc().timestamp_millis();

            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO notes (
                    id,
                    title,
                    content,
                    slug,
                    version,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5);",
                params![
                    id_text.as_str(),
                    note.title.as_str(),
                    note.content.as_str(),
                    note.slug.as_str(),
                    now_ms,
                ],
            )
            .map_err(|err| {
                if is_slug_conflict(&err) {
                    StoreError::SlugConflict(note.slug.clone())
                } else {
                    err.into()
                }
            })?;
            insert_tags(&tx, &id_text, &note.tags)?;
            tx.commit()?;

            Ok(id)
        })
    }

    fn get_active(&self, id: NoteId, cancel: &Cancellation) -> StoreResult<Option<Note>> {
        self.run("get_active", cancel, |conn| {
            select_one(
                conn,
                &format!("{NOTE_SELECT_SQL} WHERE notes.id = ?1 AND notes.deleted_at IS NULL;"),
                &[Value::Text(id.to_string())],
            )
        })
    }

    fn get_by_slug(&self, slug: &str, cancel: &Cancellation) -> StoreResult<Option<Note>> {
        self.run("get_by_slug", cancel, |conn| {
            select_one(
                conn,
                &format!(
                    "{NOTE_SELECT_SQL} WHERE notes.slug = ?1 AND notes.deleted_at IS NULL;"
                ),
                &[Value::Text(slug.to_string())],
            )
        })
    }

    fn search(&self, query: &NoteSearchQuery, cancel: &Cancellation) -> StoreResult<Page<Note>> {
        self.run("search", cancel, |conn| {
            let mut filter_sql = String::from(" WHERE notes.deleted_at IS NULL");
            let mut bind_values: Vec<Value> = Vec::new();

            let match_expr = query.text.as_deref().and_then(build_match_expression);
            if let Some(expr) = match_expr.as_ref() {
                filter_sql.push_str(
                    " AND notes.seq IN (
                        SELECT rowid FROM notes_fts WHERE notes_fts MATCH ?
                    )",
                );
                bind_values.push(Value::Text(expr.clone()));
            }

            let tags = dedup_tags(&query.tags);
            if !tags.is_empty() {
                let placeholders = vec!["?"; tags.len()].join(", ");
                filter_sql.push_str(&format!(
                    " AND (
                        SELECT COUNT(*)
                        FROM note_tags
                        WHERE note_tags.note_id = notes.id
                          AND note_tags.tag IN ({placeholders})
                    ) = ?"
                ));
                let required = tags.len() as i64;
                bind_values.extend(tags.into_iter().map(Value::Text));
                bind_values.push(Value::Integer(required));
            }

            // Count and page come from one read snapshot.
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
            let page = select_page(
                &tx,
                &filter_sql,
                bind_values,
                "notes.created_at DESC, notes.seq DESC",
                query.page,
            )
            .map_err(|err| match err {
                StoreError::Db(DbError::Sqlite(inner)) => {
                    map_query_error(inner, match_expr.as_deref())
                }
                other => other,
            })?;
            tx.commit()?;
            Ok(page)
        })
    }

    fn update<F>(
        &self,
        id: NoteId,
        expected_version: u32,
        mutate: F,
        cancel: &Cancellation,
    ) -> StoreResult<bool>
    where
        F: FnOnce(Note) -> Note,
    {
        self.run("update", cancel, |conn| {
            let id_text = id.to_string();
            let snapshot = select_one(
                conn,
                &format!(
                    "{NOTE_SELECT_SQL}
                     WHERE notes.id = ?1
                       AND notes.version = ?2
                       AND notes.deleted_at IS NULL;"
                ),
                &[
                    Value::Text(id_text.clone()),
                    Value::Integer(i64::from(expected_version)),
                ],
            )?;
            let Some(snapshot) = snapshot else {
                debug!(
                    "event=note_update module=repo status=rejected stage=read expected_version={}",
                    expected_version
                );
                return Ok(false);
            };

            let next = mutate(snapshot);
            cancel.check()?;
            let now_ms = now_utc().timestamp_millis();

            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            let changed = tx.execute(
                "UPDATE notes
                 SET
                    title = ?1,
                    content = ?2,
                    version = version + 1,
                    updated_at = ?3
                 WHERE id = ?4
                   AND version = ?5
                   AND deleted_at IS NULL;",
                params![
                    next.title.as_str(),
                    next.content.as_str(),
                    now_ms,
                    id_text.as_str(),
                    expected_version,
                ],
            )?;
            if changed != 1 {
                debug!(
                    "event=note_update module=repo status=rejected stage=write expected_version={}",
                    expected_version
                );
                return Ok(false);
            }

            tx.execute("DELETE FROM note_tags WHERE note_id = ?1;", [id_text.as_str()])?;
            insert_tags(&tx, &id_text, &next.tags)?;
            tx.commit()?;
            Ok(true)
        })
    }

    fn soft_delete(
        &self,
        id: NoteId,
        purge_after: ChronoDuration,
        cancel: &Cancellation,
    ) -> StoreResult<bool> {
        if purge_after < ChronoDuration::zero() {
            return Err(StoreError::InvalidInput(
                "purge delay must not be negative".to_string(),
            ));
        }
        let now = now_utc();
        let purge_at = now.checked_add_signed(purge_after).ok_or_else(|| {
            StoreError::InvalidInput("purge delay exceeds the timestamp range".to_string())
        })?;

        self.run("soft_delete", cancel, |conn| {
            let changed = conn.execute(
                "UPDATE notes
                 SET
                    deleted_at = ?1,
                    purge_at = ?2,
                    updated_at = ?1
                 WHERE id = ?3
                   AND deleted_at IS NULL;",
                params![
                    now.timestamp_millis(),
                    purge_at.timestamp_millis(),
                    id.to_string(),
                ],
            )?;
            Ok(changed == 1)
        })
    }

    fn restore(&self, id: NoteId, cancel: &Cancellation) -> StoreResult<bool> {
        self.run("restore", cancel, |conn| {
            let id_text = id.to_string();
            let outcome = conn.execute(
                "UPDATE notes
                 SET
                    deleted_at = NULL,
                    purge_at = NULL,
                    updated_at = ?1
                 WHERE id = ?2
                   AND deleted_at IS NOT NULL;",
                params![now_utc().timestamp_millis(), id_text.as_str()],
            );

            match outcome {
                Ok(changed) => Ok(changed == 1),
                Err(err) if is_slug_conflict(&err) => {
                    let slug: Option<String> = conn
                        .query_row(
                            "SELECT slug FROM notes WHERE id = ?1;",
                            [id_text.as_str()],
                            |row| row.get(0),
                        )
                        .optional()?;
                    Err(StoreError::SlugConflict(slug.unwrap_or_default()))
                }
                Err(err) => Err(err.into()),
            }
        })
    }

    fn list_deleted(&self, page: PageRequest, cancel: &Cancellation) -> StoreResult<Page<Note>> {
        self.run("list_deleted", cancel, |conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
            let result = select_page(
                &tx,
                " WHERE notes.deleted_at IS NOT NULL",
                Vec::new(),
                "notes.deleted_at DESC, notes.seq DESC",
                page,
            )?;
            tx.commit()?;
            Ok(result)
        })
    }

    fn purge_expired(&self, now: DateTime<Utc>, cancel: &Cancellation) -> StoreResult<u64> {
        let purged = self.run("purge_expired", cancel, |conn| {
            let now_ms = now.timestamp_millis();
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            tx.execute(
                "DELETE FROM note_tags
                 WHERE note_id IN (
                    SELECT id FROM notes
                    WHERE purge_at IS NOT NULL AND purge_at <= ?1
                 );",
                [now_ms],
            )?;
            let removed = tx.execute(
                "DELETE FROM notes WHERE purge_at IS NOT NULL AND purge_at <= ?1;",
                [now_ms],
            )?;
            tx.commit()?;
            Ok(removed as u64)
        })?;

        if purged > 0 {
            info!(
                "event=note_purge module=repo status=ok purged_count={}",
                purged
            );
        }
        Ok(purged)
    }
}

/// Raw row shape before tag loading and validation.
struct NoteRow {
    id: String,
    title: String,
    content: String,
    slug: String,
    version: i64,
    created_at: i64,
    updated_at: i64,
    deleted_at: Option<i64>,
    purge_at: Option<i64>,
}

impl NoteRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            slug: row.get("slug")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            deleted_at: row.get("deleted_at")?,
            purge_at: row.get("purge_at")?,
        })
    }

    fn into_note(self, tags: Vec<String>) -> StoreResult<Note> {
        let id = Uuid::parse_str(&self.id).map_err(|_| {
            StoreError::InvalidData(format!("invalid uuid value `{}` in notes.id", self.id))
        })?;
        let version = u32::try_from(self.version).map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid version `{}` for note {id}",
                self.version
            ))
        })?;

        let note = Note {
            id,
            title: self.title,
            content: self.content,
            tags,
            slug: self.slug,
            version,
            created_at_utc: parse_epoch_ms(self.created_at, "created_at")?,
            updated_at_utc: parse_epoch_ms(self.updated_at, "updated_at")?,
            deleted_at_utc: self
                .deleted_at
                .map(|value| parse_epoch_ms(value, "deleted_at"))
                .transpose()?,
            purge_at_utc: self
                .purge_at
                .map(|value| parse_epoch_ms(value, "purge_at"))
                .transpose()?,
        };

        if !note.has_consistent_tombstone() {
            return Err(StoreError::InvalidData(format!(
                "note {id} has only one of deleted_at/purge_at set"
            )));
        }
        Ok(note)
    }
}

fn parse_epoch_ms(value: i64, column: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid timestamp `{value}` in notes.{column}"))
    })
}

fn select_one(conn: &Connection, sql: &str, bind_values: &[Value]) -> StoreResult<Option<Note>> {
    let row = conn
        .query_row(sql, params_from_iter(bind_values.iter()), NoteRow::from_row)
        .optional()?;
    match row {
        Some(row) => {
            let tags = load_tags(conn, &row.id)?;
            Ok(Some(row.into_note(tags)?))
        }
        None => Ok(None),
    }
}

fn select_page(
    conn: &Connection,
    filter_sql: &str,
    mut bind_values: Vec<Value>,
    order_sql: &str,
    page: PageRequest,
) -> StoreResult<Page<Note>> {
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM notes{filter_sql};"),
        params_from_iter(bind_values.iter()),
        |row| row.get(0),
    )?;

    bind_values.push(Value::Integer(i64::from(page.page_size)));
    bind_values.push(Value::Integer(page.offset()));
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL}{filter_sql} ORDER BY {order_sql} LIMIT ? OFFSET ?;"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(bind_values.iter()), NoteRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let tags = load_tags(conn, &row.id)?;
        items.push(row.into_note(tags)?);
    }

    Ok(Page {
        items,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

fn load_tags(conn: &Connection, note_id: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT tag
         FROM note_tags
         WHERE note_id = ?1
         ORDER BY position ASC;",
    )?;
    let tags = stmt
        .query_map([note_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

fn insert_tags(tx: &Transaction<'_>, note_id: &str, tags: &[String]) -> StoreResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO note_tags (note_id, tag, position)
         VALUES (?1, ?2, ?3);",
    )?;
    for (position, tag) in dedup_tags(tags).iter().enumerate() {
        stmt.execute(params![note_id, tag.as_str(), position as i64])?;
    }
    Ok(())
}

fn resolve_interrupt(err: StoreError, cancel: &Cancellation) -> StoreError {
    match err {
        StoreError::Db(DbError::Sqlite(inner)) if is_interrupt_error(&inner) => {
            StoreError::Interrupted(cancel.interruption().unwrap_or(Interrupted::Cancelled))
        }
        other => other,
    }
}

fn is_slug_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(inner, Some(message)) => {
            inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && message.contains("notes.slug")
        }
        _ => false,
    }
}

fn is_unavailable_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(inner, _) => matches!(
            inner.code,
            rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::SystemIoFailure
                | rusqlite::ErrorCode::DiskFull
                | rusqlite::ErrorCode::CannotOpen
        ),
        _ => false,
    }
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

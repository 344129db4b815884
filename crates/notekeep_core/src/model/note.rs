//! Note domain model.
//!
//! # Responsibility
//! - Define the persisted `Note` snapshot and the inputs used to create and
//!   change it.
//! - Provide lifecycle helpers for the soft-delete state machine.
//!
//! # Invariants
//! - `deleted_at_utc` and `purge_at_utc` are both `None` or both `Some`.
//! - `version` starts at 0 and only the store increments it.
//! - `slug` never changes after creation.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier assigned by the store when a note is created.
pub type NoteId = Uuid;

/// Lifecycle state derived from the deletion tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteState {
    /// Visible to lookups, search and updates.
    Active,
    /// Soft-deleted; waiting for restore or purge.
    Deleted,
}

/// Persisted note snapshot.
///
/// Values of this type are immutable snapshots of a stored row. Mutations go
/// through the store, which owns `id`, `slug`, `version` and every timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// Unique within the note, kept in insertion order.
    pub tags: Vec<String>,
    pub slug: String,
    /// Optimistic concurrency token.
    pub version: u32,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    pub deleted_at_utc: Option<DateTime<Utc>>,
    /// Instant after which the expiry sweep may remove the record.
    pub purge_at_utc: Option<DateTime<Utc>>,
}

impl Note {
    pub fn state(&self) -> NoteState {
        if self.deleted_at_utc.is_some() {
            NoteState::Deleted
        } else {
            NoteState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == NoteState::Active
    }

    /// Checks the paired tombstone invariant.
    pub fn has_consistent_tombstone(&self) -> bool {
        self.deleted_at_utc.is_some() == self.purge_at_utc.is_some()
    }
}

/// Input accepted by `NoteStore::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Already allocated slug; the store enforces uniqueness on insert.
    pub slug: String,
}

/// Caller-facing create request, before a slug has been allocated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Binds the draft to an allocated slug.
    pub fn into_new_note(self, slug: String) -> NewNote {
        NewNote {
            title: self.title,
            content: self.content,
            tags: self.tags,
            slug,
        }
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl NoteChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.tags.is_none()
    }

    /// Produces the next snapshot from `current` without touching store-owned
    /// fields.
    pub fn apply(self, current: Note) -> Note {
        Note {
            title: self.title.unwrap_or(current.title),
            content: self.content.unwrap_or(current.content),
            tags: self.tags.unwrap_or(current.tags),
            ..current
        }
    }
}

/// Current UTC instant at the millisecond precision the store persists.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Drops exact duplicates while keeping first-seen order.
pub fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(tag) {
            unique.push(tag.clone());
        }
    }
    unique
}

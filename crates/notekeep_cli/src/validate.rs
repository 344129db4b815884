//! Request bounds checked before anything reaches the core.
//!
//! Blank means empty after trimming. Lengths count chars, not bytes.

use notekeep_core::{NoteChanges, NoteDraft};
use thiserror::Error;

pub const TITLE_MAX_CHARS: usize = 200;
pub const CONTENT_MAX_CHARS: usize = 20_000;
pub const TAGS_MAX_ITEMS: usize = 50;
pub const TAG_MAX_CHARS: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be blank")]
    Blank { field: &'static str },
    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("at most {max} tags are allowed, got {0}", max = TAGS_MAX_ITEMS)]
    TooManyTags(usize),
    #[error("duplicate tag `{0}`")]
    DuplicateTag(String),
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_draft(draft: &NoteDraft) -> ValidationResult {
    check_text("title", &draft.title, TITLE_MAX_CHARS)?;
    check_text("content", &draft.content, CONTENT_MAX_CHARS)?;
    check_tags(&draft.tags)
}

/// Only fields present in `changes` are checked; an empty tag list clears tags.
pub fn validate_changes(changes: &NoteChanges) -> ValidationResult {
    if let Some(title) = changes.title.as_deref() {
        check_text("title", title, TITLE_MAX_CHARS)?;
    }
    if let Some(content) = changes.content.as_deref() {
        check_text("content", content, CONTENT_MAX_CHARS)?;
    }
    if let Some(tags) = changes.tags.as_deref() {
        check_tags(tags)?;
    }
    Ok(())
}

fn check_text(field: &'static str, value: &str, max: usize) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank { field });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

fn check_tags(tags: &[String]) -> ValidationResult {
    if tags.len() > TAGS_MAX_ITEMS {
        return Err(ValidationError::TooManyTags(tags.len()));
    }
    for (index, tag) in tags.iter().enumerate() {
        check_text("tag", tag, TAG_MAX_CHARS)?;
        if tags[..index].contains(tag) {
            return Err(ValidationError::DuplicateTag(tag.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        validate_changes, validate_draft, ValidationError, CONTENT_MAX_CHARS, TAGS_MAX_ITEMS,
        TAG_MAX_CHARS, TITLE_MAX_CHARS,
    };
    use notekeep_core::{NoteChanges, NoteDraft};

    fn draft() -> NoteDraft {
        NoteDraft::new("Title", "Body").with_tags(["rust", "notes"])
    }

    #[test]
    fn well_formed_draft_passes() {
        assert_eq!(validate_draft(&draft()), Ok(()));
    }

    #[test]
    fn blank_title_and_content_are_rejected() {
        let mut blank_title = draft();
        blank_title.title = "   ".to_string();
        assert_eq!(
            validate_draft(&blank_title),
            Err(ValidationError::Blank { field: "title" })
        );

        let mut empty_content = draft();
        empty_content.content.clear();
        assert_eq!(
            validate_draft(&empty_content),
            Err(ValidationError::Blank { field: "content" })
        );
    }

    #[test]
    fn lengths_are_counted_in_chars() {
        let mut at_limit = draft();
        at_limit.title = "é".repeat(TITLE_MAX_CHARS);
        assert_eq!(validate_draft(&at_limit), Ok(()));

        let mut over = draft();
        over.content = "x".repeat(CONTENT_MAX_CHARS + 1);
        assert_eq!(
            validate_draft(&over),
            Err(ValidationError::TooLong {
                field: "content",
                max: CONTENT_MAX_CHARS
            })
        );
    }

    #[test]
    fn tag_rules_cover_count_length_blank_and_duplicates() {
        let too_many = draft().with_tags((0..=TAGS_MAX_ITEMS).map(|i| format!("t{i}")));
        assert_eq!(
            validate_draft(&too_many),
            Err(ValidationError::TooManyTags(TAGS_MAX_ITEMS + 1))
        );

        let long_tag = draft().with_tags(["a".repeat(TAG_MAX_CHARS + 1)]);
        assert!(matches!(
            validate_draft(&long_tag),
            Err(ValidationError::TooLong { field: "tag", .. })
        ));

        let blank_tag = draft().with_tags(["ok", ""]);
        assert_eq!(
            validate_draft(&blank_tag),
            Err(ValidationError::Blank { field: "tag" })
        );

        let duplicate = draft().with_tags(["rust", "Rust", "rust"]);
        assert_eq!(
            validate_draft(&duplicate),
            Err(ValidationError::DuplicateTag("rust".to_string()))
        );
    }

    #[test]
    fn changes_check_only_present_fields() {
        let title_only = NoteChanges {
            title: Some("New".to_string()),
            ..NoteChanges::default()
        };
        assert_eq!(validate_changes(&title_only), Ok(()));

        let cleared_tags = NoteChanges {
            tags: Some(Vec::new()),
            ..NoteChanges::default()
        };
        assert_eq!(validate_changes(&cleared_tags), Ok(()));

        let blank_content = NoteChanges {
            content: Some(String::new()),
            ..NoteChanges::default()
        };
        assert_eq!(
            validate_changes(&blank_content),
            Err(ValidationError::Blank { field: "content" })
        );
    }
}

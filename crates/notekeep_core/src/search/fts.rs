//! SQLite FTS5 query shaping for note search.
//!
//! # Responsibility
//! - Build match expressions over the `notes_fts(title, content)` index.
//! - Map FTS5 syntax failures to `StoreError::InvalidQuery`.
//!
//! # Invariants
//! - User text is always quoted per term; it never becomes FTS5 operators.
//! - Blank query text yields no expression (no text filter).

use crate::db::DbError;
use crate::repo::note_store::StoreError;

/// Builds an AND-combined, per-term quoted match expression.
///
/// Returns `None` when `text` has no terms.
pub fn build_match_expression(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }

    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

/// Maps a failure from a statement carrying `match_expr` to a store error.
pub(crate) fn map_query_error(err: rusqlite::Error, match_expr: Option<&str>) -> StoreError {
    match match_expr {
        Some(query) if is_match_syntax_error(&err) => StoreError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        },
        _ => StoreError::from(DbError::Sqlite(err)),
    }
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}

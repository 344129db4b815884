//! Full-text search helpers.
//!
//! # Responsibility
//! - Translate user query text into safe FTS5 match expressions.
//! - Classify FTS5 failures into store errors.

pub mod fts;

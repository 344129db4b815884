//! Slug derivation.
//!
//! # Responsibility
//! - Turn arbitrary titles into URL-safe identifier fragments.
//!
//! # Invariants
//! - Every produced slug matches `^[a-z0-9-]+$` and is non-empty.
//!
//! # See also
//! - `service::slug_service` for uniqueness against stored notes.

pub mod generator;

pub use generator::{is_valid_slug, random_hex, SlugGenerator, MIN_SLUG_MAX_LEN};

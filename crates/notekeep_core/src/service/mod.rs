//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate note store calls into use-case level APIs.
//! - Keep CLI and other adapters decoupled from storage details.

pub mod note_service;
pub mod slug_service;

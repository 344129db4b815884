//! Command-line adapter over the notekeep core.
//!
//! Every command prints JSON on stdout. Failures print one line on stderr and
//! exit with a code derived from the error kind, so scripts can tell a stale
//! version (retry after reload) from a missing note.
//!
//! Configuration via environment:
//! - NOTEKEEP_DB: database file path
//! - NOTEKEEP_LOG_DIR: absolute directory for rotated log files
//! - NOTEKEEP_*: core settings read by `CoreConfig::from_env`

mod validate;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use notekeep_core::{
    default_log_level, init_logging, open_db_with, Cancellation, CoreConfig, ErrorKind,
    NoteChanges, NoteDraft, NoteSearchQuery, NoteService, NoteServiceError, PageRequest,
    SqliteNoteStore,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;
use validate::{validate_changes, validate_draft, ValidationError};

/// Notes with unique slugs, optimistic versions and soft delete.
#[derive(Parser)]
#[command(name = "notekeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "NOTEKEEP_DB", default_value = "notekeep.db", global = true)]
    db: PathBuf,

    /// Absolute directory for log files; logging stays off when unset
    #[arg(long, env = "NOTEKEEP_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a note; its slug is derived from the title
    Create(CreateArgs),

    /// Read an active note by id
    Get {
        id: Uuid,
    },

    /// Read an active note by slug
    GetBySlug {
        slug: String,
    },

    /// Search active notes by text and tags
    Search(SearchArgs),

    /// Change title, content or tags at an expected version
    Update(UpdateArgs),

    /// Soft-delete a note
    Delete(DeleteArgs),

    /// Restore a soft-deleted note
    Restore {
        id: Uuid,
    },

    /// List soft-deleted notes
    Deleted(PageArgs),

    /// Remove soft-deleted notes whose purge time has passed
    Purge,
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    title: String,

    #[arg(long)]
    content: String,

    /// Tag to attach (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,
}

#[derive(Args)]
struct SearchArgs {
    /// Words that must all appear in title or content
    #[arg(long)]
    text: Option<String>,

    /// Required tag (repeatable; all must match)
    #[arg(long = "tag")]
    tags: Vec<String>,

    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct UpdateArgs {
    id: Uuid,

    /// Version the change was prepared against
    #[arg(long)]
    expected_version: u32,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    content: Option<String>,

    /// Replacement tag set (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Remove every tag
    #[arg(long, conflicts_with = "tags")]
    clear_tags: bool,
}

#[derive(Args)]
struct DeleteArgs {
    id: Uuid,

    /// Days before the note may be purged (configured default when omitted)
    #[arg(long)]
    purge_after_days: Option<u32>,
}

#[derive(Args)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = 10)]
    page_size: u32,
}

impl PageArgs {
    fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<serde_json::Value> {
    if let Some(log_dir) = cli.log_dir.as_ref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    let config = CoreConfig::from_env().context("invalid NOTEKEEP_* configuration")?;
    let conn = open_db_with(&cli.db, &config)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    let store = SqliteNoteStore::try_new(&conn)?;
    let service = NoteService::new(store, config);
    let cancel = Cancellation::none();

    let output = match cli.command {
        Commands::Create(args) => {
            let draft = NoteDraft::new(args.title, args.content).with_tags(args.tags);
            validate_draft(&draft)?;
            json!(service.create_note(draft, &cancel)?)
        }
        Commands::Get { id } => json!(service.get_note(id, &cancel)?),
        Commands::GetBySlug { slug } => json!(service.get_note_by_slug(&slug, &cancel)?),
        Commands::Search(args) => {
            let query = NoteSearchQuery {
                text: args.text,
                tags: args.tags,
                page: args.page.request(),
            };
            json!(service.search_notes(&query, &cancel)?)
        }
        Commands::Update(args) => {
            let tags = if args.clear_tags {
                Some(Vec::new())
            } else if args.tags.is_empty() {
                None
            } else {
                Some(args.tags)
            };
            let changes = NoteChanges {
                title: args.title,
                content: args.content,
                tags,
            };
            anyhow::ensure!(!changes.is_empty(), "nothing to update");
            validate_changes(&changes)?;
            json!(service.update_note(args.id, args.expected_version, changes, &cancel)?)
        }
        Commands::Delete(args) => {
            let purge_after = args
                .purge_after_days
                .map(|days| chrono::Duration::days(i64::from(days)));
            service.delete_note(args.id, purge_after, &cancel)?;
            json!({ "id": args.id, "deleted": true })
        }
        Commands::Restore { id } => json!(service.restore_note(id, &cancel)?),
        Commands::Deleted(args) => json!(service.list_deleted(args.request(), &cancel)?),
        Commands::Purge => json!({ "purged": service.purge_expired(&cancel)? }),
    };

    Ok(output)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ValidationError>().is_some() {
        return 5;
    }
    let Some(service_err) = err.downcast_ref::<NoteServiceError>() else {
        return 1;
    };
    match service_err.kind() {
        ErrorKind::NotFound => 2,
        ErrorKind::VersionMismatchOrMissing => 3,
        ErrorKind::SlugConflict => 4,
        ErrorKind::InvalidInput => 5,
        ErrorKind::StorageUnavailable | ErrorKind::TimedOut | ErrorKind::Cancelled => 6,
        ErrorKind::Internal => 1,
    }
}

use chrono::Duration;
use notekeep_core::db::open_db_in_memory;
use notekeep_core::{
    Cancellation, ErrorKind, NewNote, NoteSearchQuery, NoteStore, SqliteNoteStore,
};
use rusqlite::{params, Connection};

fn seed(store: &SqliteNoteStore<'_>, slug: &str, title: &str, content: &str, tags: &[&str]) -> uuid::Uuid {
    store
        .create(
            &NewNote {
                title: title.to_string(),
                content: content.to_string(),
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
                slug: slug.to_string(),
            },
            &Cancellation::none(),
        )
        .unwrap()
}

fn slugs(page: &notekeep_core::Page<notekeep_core::Note>) -> Vec<&str> {
    page.items.iter().map(|note| note.slug.as_str()).collect()
}

#[test]
fn tag_filter_requires_every_requested_tag() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    seed(&store, "only-a", "Only a", "", &["a"]);
    seed(&store, "a-b-c", "All three", "", &["a", "b", "c"]);
    seed(&store, "b-a", "Both", "", &["b", "a"]);
    seed(&store, "none", "Untagged", "", &[]);

    let page = store
        .search(&NoteSearchQuery::new().tags(["a", "b"]), &Cancellation::none())
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(slugs(&page), vec!["b-a", "a-b-c"]);

    let duplicated = store
        .search(&NoteSearchQuery::new().tags(["a", "a"]), &Cancellation::none())
        .unwrap();
    assert_eq!(duplicated.total, 3);
}

#[test]
fn tags_match_exact_strings() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    seed(&store, "upper", "Upper", "", &["Rust"]);

    let lower = store
        .search(&NoteSearchQuery::new().tags(["rust"]), &Cancellation::none())
        .unwrap();
    assert_eq!(lower.total, 0);
    let exact = store
        .search(&NoteSearchQuery::new().tags(["Rust"]), &Cancellation::none())
        .unwrap();
    assert_eq!(exact.total, 1);
}

#[test]
fn pagination_counts_all_matches() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    for index in 0..15 {
        seed(&store, &format!("note-{index}"), "Paged", "", &["bulk"]);
    }

    let second = store
        .search(&NoteSearchQuery::new().page(2, 10), &Cancellation::none())
        .unwrap();
    assert_eq!(second.total, 15);
    assert_eq!(second.items.len(), 5);
    assert_eq!(slugs(&second), vec!["note-4", "note-3", "note-2", "note-1", "note-0"]);

    let beyond = store
        .search(&NoteSearchQuery::new().page(3, 10), &Cancellation::none())
        .unwrap();
    assert_eq!(beyond.total, 15);
    assert!(beyond.items.is_empty());

    let zero = store
        .search(&NoteSearchQuery::new().page(0, 10), &Cancellation::none())
        .unwrap();
    assert_eq!(zero.items.len(), 10);
    assert_eq!(zero.items[0].slug, "note-14");
}

#[test]
fn results_are_ordered_by_creation_time_descending() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let older = seed(&store, "older", "Older", "", &[]);
    let newer = seed(&store, "newer", "Newer", "", &[]);
    set_created_at(&conn, older, 2_000);
    set_created_at(&conn, newer, 1_000);

    let page = store
        .search(&NoteSearchQuery::new(), &Cancellation::none())
        .unwrap();
    assert_eq!(slugs(&page), vec!["older", "newer"]);
}

#[test]
fn text_query_matches_title_and_content_terms() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    seed(&store, "title-hit", "Rust ownership", "borrowing rules", &[]);
    seed(&store, "content-hit", "Memory", "rust lifetimes and ownership", &[]);
    seed(&store, "partial", "Rust", "only one term", &[]);

    let page = store
        .search(&NoteSearchQuery::new().text("rust ownership"), &Cancellation::none())
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(slugs(&page), vec!["content-hit", "title-hit"]);

    let blank = store
        .search(&NoteSearchQuery::new().text("   "), &Cancellation::none())
        .unwrap();
    assert_eq!(blank.total, 3);
}

#[test]
fn text_query_treats_operators_as_plain_words() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    seed(&store, "plain", "Plain", "nothing special", &[]);

    for text in ["NOT", "\"unbalanced", "a OR", "title:*", "(nested"] {
        let page = store
            .search(&NoteSearchQuery::new().text(text), &Cancellation::none())
            .unwrap();
        assert_eq!(page.total, 0, "query `{text}`");
    }
}

#[test]
fn text_index_follows_updates() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let cancel = Cancellation::none();
    let id = seed(&store, "evolving", "Draft", "apples", &[]);

    assert!(store
        .update(
            id,
            0,
            |mut note| {
                note.content = "oranges".to_string();
                note
            },
            &cancel,
        )
        .unwrap());

    let old = store
        .search(&NoteSearchQuery::new().text("apples"), &cancel)
        .unwrap();
    let new = store
        .search(&NoteSearchQuery::new().text("oranges"), &cancel)
        .unwrap();
    assert_eq!(old.total, 0);
    assert_eq!(new.total, 1);
}

#[test]
fn deleted_notes_are_excluded() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let cancel = Cancellation::none();
    let hidden = seed(&store, "hidden", "Shared words", "", &["t"]);
    seed(&store, "visible", "Shared words", "", &["t"]);
    assert!(store.soft_delete(hidden, Duration::days(1), &cancel).unwrap());

    let query = NoteSearchQuery::new().text("shared").tags(["t"]);
    let page = store.search(&query, &cancel).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(slugs(&page), vec!["visible"]);
}

#[test]
fn search_error_kinds_are_typed() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let cancel = Cancellation::none();
    cancel.cancel();

    let err = store.search(&NoteSearchQuery::new(), &cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

fn set_created_at(conn: &Connection, id: uuid::Uuid, created_at_ms: i64) {
    conn.execute(
        "UPDATE notes SET created_at = ?1 WHERE id = ?2;",
        params![created_at_ms, id.to_string()],
    )
    .unwrap();
}

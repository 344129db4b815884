use chrono::Duration;
use notekeep_core::db::open_db_in_memory;
use notekeep_core::{
    is_valid_slug, Cancellation, NewNote, NoteStore, SlugAllocator, SlugGenerator, SlugRules,
    SqliteNoteStore,
};

fn allocator(probe_attempts: u32) -> SlugAllocator {
    SlugAllocator::new(SlugGenerator::new(SlugRules::default()), probe_attempts)
}

fn insert_slug(store: &SqliteNoteStore<'_>, slug: &str) -> uuid::Uuid {
    store
        .create(
            &NewNote {
                title: slug.to_string(),
                content: String::new(),
                tags: Vec::new(),
                slug: slug.to_string(),
            },
            &Cancellation::none(),
        )
        .unwrap()
}

#[test]
fn first_free_candidate_wins() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let allocator = allocator(100);
    let cancel = Cancellation::none();

    let first = allocator.allocate(&store, "Hello World", &cancel).unwrap();
    assert_eq!(first, "hello-world");
    insert_slug(&store, &first);

    let second = allocator.allocate(&store, "Hello World", &cancel).unwrap();
    assert_eq!(second, "hello-world-1");
    insert_slug(&store, &second);

    let third = allocator.allocate(&store, "hello   world!", &cancel).unwrap();
    assert_eq!(third, "hello-world-2");
}

#[test]
fn soft_deleted_notes_do_not_block_allocation() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let cancel = Cancellation::none();
    let id = insert_slug(&store, "draft");
    assert!(store.soft_delete(id, Duration::days(7), &cancel).unwrap());

    assert_eq!(allocator(100).allocate(&store, "Draft", &cancel).unwrap(), "draft");
}

#[test]
fn exhausted_probes_fall_back_to_random_suffix() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let cancel = Cancellation::none();
    insert_slug(&store, "busy");
    insert_slug(&store, "busy-1");
    insert_slug(&store, "busy-2");

    let allocator = allocator(3);
    let first = allocator.allocate(&store, "Busy", &cancel).unwrap();
    let second = allocator.allocate(&store, "Busy", &cancel).unwrap();

    for slug in [&first, &second] {
        assert!(slug.starts_with("busy-"), "unexpected slug `{slug}`");
        assert!(is_valid_slug(slug));
        assert!(slug.len() <= SlugRules::default().max_len);
        assert_eq!(slug.len(), "busy-".len() + 32);
    }
    assert_ne!(first, second);
    assert!(store.get_by_slug(&first, &cancel).unwrap().is_none());
}

#[test]
fn suffixed_candidates_respect_max_length() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let cancel = Cancellation::none();
    let generator = SlugGenerator::new(SlugRules {
        min_len: 3,
        max_len: 12,
    });
    let allocator = SlugAllocator::new(generator, 100);

    let base = allocator
        .allocate(&store, "A rather long title", &cancel)
        .unwrap();
    assert_eq!(base, "a-rather-lon");
    insert_slug(&store, &base);

    let next = allocator
        .allocate(&store, "A rather long title", &cancel)
        .unwrap();
    assert_eq!(next, "a-rather-l-1");
}

#[test]
fn cancelled_signal_stops_probing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let cancel = Cancellation::none();
    cancel.cancel();

    assert!(allocator(100).allocate(&store, "Any", &cancel).is_err());
}

//! Tests for the SQLite session store.

use tempfile::NamedTempFile;

use postal_chess::{Difficulty, Session, SessionStore, SqliteSessionStore, ThreadHandle};
use postal_chess_notation::Side;

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready store.
fn setup_test_db() -> (NamedTempFile, SqliteSessionStore) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let store = SqliteSessionStore::new(db_path);
    store.initialize().expect("Migrations failed");
    (db_file, store)
}

#[test]
fn test_empty_store_has_no_session() {
    let (_db, store) = setup_test_db();
    assert!(store.load_session().expect("Load failed").is_none());
}

#[test]
fn test_session_roundtrip() {
    let (_db, store) = setup_test_db();
    let mut session = Session::new(Side::Black, Difficulty::Advanced, 50);
    session.record_move(
        Side::White,
        "e4",
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".to_string(),
    );
    session.bind_thread(ThreadHandle::new("18c2f0a9b7d3e411"), 2);
    session.set_paused(true);

    store.save_session(&session).expect("Save failed");
    let loaded = store
        .load_session()
        .expect("Load failed")
        .expect("Session missing");
    assert_eq!(loaded, session);
}

#[test]
fn test_save_overwrites_previous_session() {
    let (_db, store) = setup_test_db();
    let first = Session::new(Side::White, Difficulty::Beginner, 50);
    store.save_session(&first).expect("Save failed");

    let mut second = Session::new(Side::White, Difficulty::Beginner, 50);
    second.advance_cursor(7);
    store.save_session(&second).expect("Save failed");

    let loaded = store.load_session().unwrap().unwrap();
    assert_eq!(loaded.session_token(), second.session_token());
    assert_eq!(*loaded.cursor(), 7);
}

#[test]
fn test_unrelated_keys_do_not_disturb_the_session() {
    let (_db, store) = setup_test_db();
    let session = Session::new(Side::White, Difficulty::Expert, 50);
    store.save_session(&session).expect("Save failed");
    store
        .put("rate_limit:oracle", "2026-10-05T10:00:00+00:00")
        .expect("Put failed");

    assert_eq!(
        store.get("rate_limit:oracle").unwrap().as_deref(),
        Some("2026-10-05T10:00:00+00:00")
    );
    assert_eq!(store.load_session().unwrap().unwrap(), session);
}

#[test]
fn test_initialize_is_idempotent() {
    let (_db, store) = setup_test_db();
    store.initialize().expect("Second initialize failed");
    store.put("k", "v").expect("Put failed");
    store.initialize().expect("Third initialize failed");
    assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
}

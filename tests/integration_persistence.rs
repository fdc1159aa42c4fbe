// Saves, passes and restores against the SQLite store.

use assert_matches::assert_matches;
use tempfile::tempdir;

use typecast::clock::ManualClock;
use typecast::error::{PassError, RestoreError};
use typecast::keys::Key;
use typecast::pass::{BackstagePass, PassSnapshot, Tier};
use typecast::persistence::{self, EXPIRY_MS};
use typecast::scripts::Act;
use typecast::state::{RoleId, SessionState};
use typecast::storage::{KeyValueStore, SqliteStore};
use typecast::Theatre;

fn perform(theatre: &mut Theatre<SqliteStore, &ManualClock>) {
    theatre.raise_curtain();
    let script = theatre.engine().session().target_text();
    for c in script.chars() {
        theatre.on_key(Key::Char(c), false);
    }
}

#[test]
fn progress_survives_reopening_the_database() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("typecast.db");
    let clock = ManualClock::new(1_000_000);

    let code = {
        let mut theatre = Theatre::new(SqliteStore::open(&db).unwrap(), &clock, Act::single("take one"));
        theatre.set_role(RoleId::ConfidentExecutive, Some("Ada".into()));
        perform(&mut theatre);
        clock.advance(persistence::DEBOUNCE_MS);
        theatre.tick();
        theatre.state().actor.continuation_code.clone().unwrap()
    };

    let mut theatre = Theatre::new(SqliteStore::open(&db).unwrap(), &clock, Act::single("take one"));
    theatre.resume(&code.to_lowercase()).unwrap();
    let state = theatre.state();
    assert_eq!(state.actor.name, "Ada");
    assert_eq!(state.actor.role, Some(RoleId::ConfidentExecutive));
    assert_eq!(state.actor.reviews.len(), 1);
    assert_eq!(state.actor.repertoire, vec!["improv-custom"]);
    assert!(!state.production.curtains_open);
}

#[test]
fn expired_saves_are_swept_on_start() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("typecast.db");
    let clock = ManualClock::new(0);

    let code = {
        let mut theatre = Theatre::new(SqliteStore::open(&db).unwrap(), &clock, Act::single("x"));
        theatre.set_role(RoleId::RisingStar, None);
        theatre.flush().unwrap();
        theatre.state().actor.continuation_code.clone().unwrap()
    };

    clock.advance(EXPIRY_MS + 1);
    let mut theatre = Theatre::new(SqliteStore::open(&db).unwrap(), &clock, Act::single("x"));
    assert_eq!(theatre.sweep(), 1);
    assert_eq!(theatre.resume(&code), Err(RestoreError::NotFound));
}

#[test]
fn passes_round_trip_and_reject_garbage() {
    let mut storage = SqliteStore::open_in_memory().unwrap();
    let mut state = SessionState::default();
    state.actor.role = Some(RoleId::MethodActor);
    state.actor.experience = 60;
    let snapshot = PassSnapshot::from_state(&state, 42);

    let pass = BackstagePass::new(&mut storage)
        .generate(&snapshot, Tier::from_level(state.actor.experience))
        .unwrap();
    assert!(pass.starts_with("STAR-"), "{pass}");

    let codec = BackstagePass::new(&mut storage);
    assert_eq!(codec.parse(&pass).unwrap(), snapshot);
    assert_matches!(codec.parse("GARBAGE-0000-NOPE-0000"), Err(PassError::Invalid));
    assert_matches!(codec.parse("LEGEND-ZZZZ-SHOW-ZZZZ"), Err(PassError::Invalid));
    assert_eq!(
        PassError::Invalid.to_string(),
        "Invalid Backstage Pass. Please check your ticket!"
    );
}

#[test]
fn corrupt_save_is_reported() {
    let mut storage = SqliteStore::open_in_memory().unwrap();
    storage
        .set(&persistence::save_key("BROK-0000-SHOW-0000"), r#"{"code":"x","savedAt":0}"#)
        .unwrap();
    assert_eq!(
        persistence::restore(&storage, "BROK-0000-SHOW-0000"),
        Err(RestoreError::Corrupt)
    );
    assert_eq!(RestoreError::Corrupt.to_string(), "Corrupted save data.");
}

#[test]
fn redeemed_pass_is_saved_as_progress() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("typecast.db");
    let clock = ManualClock::new(5_000);

    let pass = {
        let mut theatre = Theatre::new(SqliteStore::open(&db).unwrap(), &clock, Act::single("take two"));
        theatre.set_role(RoleId::MethodActor, None);
        perform(&mut theatre);
        theatre.issue_pass().unwrap()
    };

    let mut theatre = Theatre::new(SqliteStore::open(&db).unwrap(), &clock, Act::single("take two"));
    let snapshot = theatre.redeem_pass(&pass).unwrap();
    assert_eq!(snapshot.show_count, 1);
    theatre.flush().unwrap();

    let code = theatre.state().actor.continuation_code.clone().unwrap();
    let restored = persistence::restore(theatre.storage(), &code).unwrap();
    assert_eq!(restored.actor.role, Some(RoleId::MethodActor));
    assert_eq!(restored.actor.repertoire, vec!["improv-custom"]);
    assert!((restored.actor.personal_best.accuracy - 100.0).abs() < 1e-9);
}

use flagledger::core::authz::{Actor, Role};
use flagledger::core::db;
use flagledger::core::error::LedgerError;
use flagledger::core::store::Store;
use flagledger::ledger::{captures, flags, requests, stats, users};
use tempfile::TempDir;

fn setup() -> (TempDir, Store) {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::new(tmp.path().join("data"));
    db::initialize_ledger_db(&store.root).expect("init db");
    (tmp, store)
}

fn register(store: &Store, name: &str, role: Role) -> Actor {
    let email = format!("{}@example.com", name.to_lowercase());
    users::add_user(store, name, &email, role)
        .expect("add user")
        .into()
}

/// Approve a fresh request for `owner` and return the minted flag number.
fn mint_flag(store: &Store, owner: &Actor, admin: &Actor) -> i64 {
    let request = requests::submit_request(store, owner).expect("submit");
    requests::approve_request(store, &request.id, admin).expect("approve")
}

#[test]
fn capture_transfers_ownership() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let bob = register(&store, "Bob", Role::Player);
    let admin = register(&store, "Root", Role::Admin);
    let n = mint_flag(&store, &alice, &admin);

    let capture = captures::record_capture(&store, n, &bob, "2024-01-01T10:00:00Z", None, None)
        .expect("capture");
    assert_eq!(capture.captured_by_user_id, bob.id);
    assert_eq!(capture.captured_at, "2024-01-01T10:00:00Z");

    let view = flags::get_flag(&store, n).expect("get flag");
    assert_eq!(view.flag.current_owner_id, bob.id);
    assert_eq!(
        view.flag.last_captured_at.as_deref(),
        Some("2024-01-01T10:00:00Z")
    );
    assert_eq!(view.capture_history.len(), 1);
    assert_eq!(view.capture_history[0].captured_by_name.as_deref(), Some("Bob"));
}

#[test]
fn self_capture_is_rejected() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let bob = register(&store, "Bob", Role::Player);
    let admin = register(&store, "Root", Role::Admin);
    let n = mint_flag(&store, &alice, &admin);

    // Alice holds her own freshly minted flag.
    let err = captures::record_capture(&store, n, &alice, "2024-01-01T10:00:00Z", None, None)
        .expect_err("self capture");
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err}");

    // After Bob takes it, Alice is no longer the owner and may capture.
    captures::record_capture(&store, n, &bob, "2024-01-02T10:00:00Z", None, None)
        .expect("bob captures");
    let err = captures::record_capture(&store, n, &bob, "2024-01-03T10:00:00Z", None, None)
        .expect_err("bob self capture");
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err}");
    captures::record_capture(&store, n, &alice, "2024-01-03T10:00:00Z", None, None)
        .expect("alice recaptures");

    let view = flags::get_flag(&store, n).expect("get flag");
    assert_eq!(view.flag.current_owner_id, alice.id);
    assert_eq!(view.capture_history.len(), 2);
}

#[test]
fn failed_capture_leaves_no_row() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let admin = register(&store, "Root", Role::Admin);
    let n = mint_flag(&store, &alice, &admin);

    let _ = captures::record_capture(&store, n, &alice, "2024-01-01T10:00:00Z", None, None)
        .expect_err("self capture");

    let all = captures::list_all_captures(&store, &admin).expect("list");
    assert!(all.is_empty(), "rolled-back capture must not persist");
}

#[test]
fn unknown_flag_is_not_found() {
    let (_tmp, store) = setup();
    let bob = register(&store, "Bob", Role::Player);

    let err = captures::record_capture(&store, 99, &bob, "2024-01-01T10:00:00Z", None, None)
        .expect_err("missing flag");
    assert!(matches!(err, LedgerError::NotFound(_)), "{err}");
}

#[test]
fn backdated_captures_are_accepted() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let bob = register(&store, "Bob", Role::Player);
    let admin = register(&store, "Root", Role::Admin);
    let n = mint_flag(&store, &alice, &admin);

    // A capture recorded days after the fact, with an offset timezone.
    let capture =
        captures::record_capture(&store, n, &bob, "2020-06-01T14:30:00+02:00", None, None)
            .expect("backdated capture");
    assert_eq!(capture.captured_at, "2020-06-01T12:30:00Z");

    let view = flags::get_flag(&store, n).expect("get flag");
    assert_eq!(
        view.flag.last_captured_at.as_deref(),
        Some("2020-06-01T12:30:00Z")
    );
}

#[test]
fn malformed_timestamp_is_a_validation_error() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let bob = register(&store, "Bob", Role::Player);
    let admin = register(&store, "Root", Role::Admin);
    let n = mint_flag(&store, &alice, &admin);

    let err = captures::record_capture(&store, n, &bob, "yesterday", None, None)
        .expect_err("bad timestamp");
    assert!(matches!(err, LedgerError::ValidationError(_)), "{err}");
}

#[test]
fn notes_and_photo_reference_round_trip() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let bob = register(&store, "Bob", Role::Player);
    let admin = register(&store, "Root", Role::Admin);
    let n = mint_flag(&store, &alice, &admin);

    captures::record_capture(
        &store,
        n,
        &bob,
        "2024-01-01T10:00:00Z",
        Some("found it behind the shed"),
        Some("/photos/abc.jpg"),
    )
    .expect("capture");

    let view = flags::get_flag(&store, n).expect("get flag");
    let c = &view.capture_history[0].capture;
    assert_eq!(c.notes.as_deref(), Some("found it behind the shed"));
    assert_eq!(c.photo_url.as_deref(), Some("/photos/abc.jpg"));
}

#[test]
fn history_is_newest_first() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let bob = register(&store, "Bob", Role::Player);
    let admin = register(&store, "Root", Role::Admin);
    let n = mint_flag(&store, &alice, &admin);

    captures::record_capture(&store, n, &bob, "2024-01-01T00:00:00Z", None, None).expect("c1");
    captures::record_capture(&store, n, &alice, "2024-02-01T00:00:00Z", None, None).expect("c2");
    captures::record_capture(&store, n, &bob, "2024-03-01T00:00:00Z", None, None).expect("c3");

    let view = flags::get_flag(&store, n).expect("get flag");
    let times: Vec<&str> = view
        .capture_history
        .iter()
        .map(|c| c.capture.captured_at.as_str())
        .collect();
    assert_eq!(
        times,
        vec![
            "2024-03-01T00:00:00Z",
            "2024-02-01T00:00:00Z",
            "2024-01-01T00:00:00Z"
        ]
    );
}

#[test]
fn stats_are_derived_from_counts() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let bob = register(&store, "Bob", Role::Player);
    let admin = register(&store, "Root", Role::Admin);

    let n1 = mint_flag(&store, &alice, &admin);
    let n2 = mint_flag(&store, &bob, &admin);

    // Bob takes Alice's flag; Alice takes it back; Bob keeps his own.
    captures::record_capture(&store, n1, &bob, "2024-01-01T00:00:00Z", None, None).expect("c1");
    captures::record_capture(&store, n1, &alice, "2024-01-02T00:00:00Z", None, None).expect("c2");

    let alice_stats = stats::compute_stats(&store, &alice.id).expect("alice stats");
    assert_eq!(
        alice_stats,
        stats::UserStats {
            flags_owned: 1,
            total_captures: 1,
            flags_requested: 1,
        }
    );

    let bob_stats = stats::compute_stats(&store, &bob.id).expect("bob stats");
    assert_eq!(
        bob_stats,
        stats::UserStats {
            flags_owned: 1,
            total_captures: 1,
            flags_requested: 1,
        }
    );

    let _ = n2;
}

#[test]
fn owned_flags_listing_follows_ownership() {
    let (_tmp, store) = setup();
    let alice = register(&store, "Alice", Role::Player);
    let bob = register(&store, "Bob", Role::Player);
    let admin = register(&store, "Root", Role::Admin);

    let n = mint_flag(&store, &alice, &admin);
    assert_eq!(flags::list_flags_owned_by(&store, &alice.id).unwrap().len(), 1);
    assert!(flags::list_flags_owned_by(&store, &bob.id).unwrap().is_empty());

    captures::record_capture(&store, n, &bob, "2024-01-01T00:00:00Z", None, None).expect("c1");
    assert!(flags::list_flags_owned_by(&store, &alice.id).unwrap().is_empty());
    assert_eq!(flags::list_flags_owned_by(&store, &bob.id).unwrap().len(), 1);
}

use chrono::{DateTime, Duration, TimeZone, Utc};
use deckard_core::{CoreError, ManualClock, Rating, Repository, ReviewSession, SessionState};
use deckard_fs::FsStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

const CARD: &str = "---\ntags: [rust]\ncreated: 2025-01-01\n---\n\n# Question\n\nWhat does `?` do?\n\n## Answer\n\nPropagates errors.\n";

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

fn seeded() -> TempDir {
    let dir = TempDir::new().unwrap();
    let rust = dir.path().join("rust");
    fs::create_dir_all(rust.join("async")).unwrap();
    fs::write(rust.join("question_mark.md"), CARD).unwrap();
    fs::write(rust.join("async").join("pin.md"), CARD.replace("`?`", "`Pin`")).unwrap();
    fs::write(dir.path().join("top.md"), CARD).unwrap();
    dir
}

fn open(dir: &TempDir) -> (FsStore, ManualClock) {
    let clock = ManualClock::new(start());
    let (store, errors) = FsStore::open_with_clock(dir.path(), clock.clone()).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    (store, clock)
}

fn under(store: &FsStore, rel: &str) -> PathBuf {
    rel.split('/').fold(store.root().to_path_buf(), |p, c| p.join(c))
}

#[test]
fn open_loads_every_readable_card_and_skips_hidden_entries() {
    let dir = seeded();
    fs::write(dir.path().join("rust").join("broken.md"), "no front matter\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    fs::create_dir_all(dir.path().join(".git")).unwrap();
    fs::write(dir.path().join(".git").join("hidden.md"), CARD).unwrap();

    let (store, errors) = FsStore::open(dir.path()).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], CoreError::Parse { .. }));

    assert_eq!(store.tree().deck_count(), 3);
    assert_eq!(store.all_cards(store.root()).unwrap().len(), 3);
    let rust = under(&store, "rust");
    assert_eq!(store.all_cards(&rust).unwrap().len(), 2);
    assert_eq!(store.deck(&under(&store, "rust/async")).unwrap().full_name, format!(
        "{}/rust/async",
        store.tree().root().name
    ));
}

#[test]
fn open_rejects_missing_root() {
    let dir = TempDir::new().unwrap();
    assert!(FsStore::open(dir.path().join("nope")).is_err());
}

#[test]
fn rate_persists_schedule_and_history() {
    let dir = seeded();
    let (mut store, clock) = open(&dir);
    let id = under(&store, "rust/question_mark.md");

    let rated = store.rate(&id, Rating::Easy).unwrap();
    assert_eq!(rated.interval_days, 2);
    assert_eq!(store.due_cards(store.root()).unwrap().len(), 2);

    let text = fs::read_to_string(&id).unwrap();
    assert!(text.contains("review_interval: 2"));
    assert!(text.contains("tags:\n- rust"));

    clock.advance(Duration::days(1));
    let (reopened, errors) = FsStore::open_with_clock(dir.path(), clock.clone()).unwrap();
    assert!(errors.is_empty());
    let card = reopened.card(&id).unwrap();
    assert_eq!(card.interval_days, 2);
    assert_eq!(card.ease, 2.65);
    assert_eq!(card.last_reviewed, Some(start()));
    assert_eq!(card.created_at, Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
    assert_eq!(reopened.reviews().len(), 1);
    assert_eq!(reopened.reviews()[0].card, id);
    assert_eq!(reopened.deck(&under(&reopened, "rust")).unwrap().last_studied, Some(start()));

    let stats = reopened.stats(reopened.root()).unwrap();
    assert_eq!(stats.total_cards, 3);
    assert_eq!(stats.due_cards, 2);
    assert_eq!(stats.reviews_30d, 1);
    assert_eq!(stats.streak_days, 1);
}

#[test]
fn rate_refuses_to_overwrite_newer_file() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let id = under(&store, "top.md");

    let f = fs::File::options().write(true).open(&id).unwrap();
    f.set_modified(SystemTime::now() + std::time::Duration::from_secs(120)).unwrap();
    drop(f);

    let err = store.rate(&id, Rating::Good).unwrap_err();
    assert!(matches!(err, CoreError::StaleWrite { .. }));
    assert!(store.reviews().is_empty());
    assert!(store.refresh().is_empty());
    assert!(store.rate(&id, Rating::Good).is_ok());
}

#[test]
fn create_card_picks_a_free_name() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let rust = under(&store, "rust");
    let tags = vec!["Rust".to_string(), "rust".to_string()];

    let a = store.create_card(&rust, "What is Rust?", "q", "a", &tags).unwrap();
    let b = store.create_card(&rust, "What is Rust?", "q2", "a2", &[]).unwrap();
    assert_eq!(a.path, rust.join("What_is_Rust-.md"));
    assert_eq!(b.path, rust.join("What_is_Rust-_2.md"));
    assert_eq!(a.tags, ["Rust"]);
    assert_eq!(a.created_at, Some(start()));

    let (reopened, _) = FsStore::open(dir.path()).unwrap();
    assert_eq!(reopened.card(&b.path).unwrap().title, "What is Rust?");
    assert_eq!(reopened.card(&b.path).unwrap().question, "q2");

    assert!(store.create_card(&rust.join("nope"), "x", "q", "a", &[]).unwrap_err().is_not_found());
}

#[test]
fn edit_card_replaces_text_and_tags() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let id = under(&store, "top.md");

    let edited = store
        .edit_card(&id, "New question\n\n", "New answer", &["errors".to_string()])
        .unwrap();
    assert_eq!(edited.tags, ["errors"]);

    let (reopened, _) = FsStore::open(dir.path()).unwrap();
    let card = reopened.card(&id).unwrap();
    assert_eq!(card.question, "New question");
    assert_eq!(card.answer, "New answer");
    assert_eq!(card.tags, ["errors"]);
}

#[test]
fn move_card_changes_identity_and_history() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let id = under(&store, "top.md");
    let target = under(&store, "rust/async");
    store.rate(&id, Rating::Good).unwrap();

    let moved = store.move_card(&id, &target).unwrap();
    assert_eq!(moved.path, target.join("top.md"));
    assert!(!id.exists());
    assert!(moved.path.exists());
    assert!(store.card(&id).unwrap_err().is_not_found());
    assert_eq!(store.reviews()[0].card, moved.path);

    let (reopened, _) = FsStore::open(dir.path()).unwrap();
    assert_eq!(reopened.reviews()[0].card, moved.path);
    assert_eq!(reopened.card(&moved.path).unwrap().interval_days, 1);

    let outside = Path::new("/definitely/not/here");
    assert!(matches!(store.move_card(&moved.path, outside), Err(CoreError::Invariant(_))));
}

#[test]
fn rename_deck_moves_subtree_and_history() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let pin = under(&store, "rust/async/pin.md");
    store.rate(&pin, Rating::Hard).unwrap();

    let old = under(&store, "rust");
    let new = store.rename_deck(&old, "Rust Lang").unwrap();
    assert_eq!(new, under(&store, "Rust_Lang"));
    assert!(store.deck(&old).is_err());
    assert!(store.deck(&new.join("async")).is_ok());
    let new_pin = new.join("async").join("pin.md");
    assert_eq!(store.card(&new_pin).unwrap().last_rating, None);
    assert_eq!(store.reviews()[0].card, new_pin);

    let root = store.root().to_path_buf();
    assert!(matches!(store.rename_deck(&root, "x"), Err(CoreError::Invariant(_))));
}

#[test]
fn create_and_delete_decks() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let root = store.root().to_path_buf();

    let path = store.create_deck(&root, "  go  ").unwrap().path.clone();
    assert!(path.is_dir());
    assert!(matches!(store.create_deck(&root, "go"), Err(CoreError::Invariant(_))));
    assert!(matches!(store.create_deck(&root, " .. "), Err(CoreError::Invariant(_))));

    let rust = under(&store, "rust");
    store.delete_deck(&rust).unwrap();
    assert!(!rust.exists());
    assert!(store.deck(&rust.join("async")).is_err());
    assert_eq!(store.all_cards(&root).unwrap().len(), 1);
    assert!(matches!(store.delete_deck(&root), Err(CoreError::Invariant(_))));
    assert!(store.delete_deck(&rust).unwrap_err().is_not_found());
}

#[test]
fn delete_card_removes_file() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let id = under(&store, "top.md");
    store.delete_card(&id).unwrap();
    assert!(!id.exists());
    assert!(store.delete_card(&id).unwrap_err().is_not_found());
}

#[test]
fn search_spans_the_tree() {
    let dir = seeded();
    let (store, _) = open(&dir);
    let hits = store.search("pin");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file_name(), "pin.md");
    assert_eq!(store.search("RUST").len(), 3);
}

#[test]
fn session_over_the_store_writes_every_rating() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let rust = under(&store, "rust");

    let mut session = ReviewSession::new(&store, &rust).unwrap();
    assert_eq!(session.len(), 2);
    while session.state() != SessionState::Finished {
        session.reveal().unwrap();
        session.rate(&mut store, Rating::Good).unwrap();
    }
    assert_eq!(session.summary().rated, 2);
    assert!(store.due_cards(&rust).unwrap().is_empty());

    let (reopened, _) = FsStore::open(dir.path()).unwrap();
    assert_eq!(reopened.reviews().len(), 2);
    assert!(reopened.all_cards(&rust).unwrap().iter().all(|c| c.interval_days == 1));
}

// Sorted deck and card paths, for comparing memory with a fresh open.
#[cfg(unix)]
fn layout(store: &FsStore) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut decks: Vec<PathBuf> = store.all_decks().iter().map(|d| d.path.clone()).collect();
    let mut cards: Vec<PathBuf> = store
        .all_cards(store.root())
        .unwrap()
        .iter()
        .map(|c| c.path.clone())
        .collect();
    decks.sort();
    cards.sort();
    (decks, cards)
}

// Makes `dir` read-only. Returns false when permissions are not enforced
// (for example when the tests run as root).
#[cfg(unix)]
fn lock_dir(dir: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
    let check = dir.join(".write_check");
    if fs::write(&check, "x").is_ok() {
        let _ = fs::remove_file(&check);
        unlock_dir(dir);
        return false;
    }
    true
}

#[cfg(unix)]
fn unlock_dir(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn failed_move_leaves_memory_matching_disk() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let root = store.root().to_path_buf();
    let rust = under(&store, "rust");
    let id = rust.join("question_mark.md");
    if !lock_dir(&rust) {
        return;
    }

    let err = store.move_card(&id, &root);
    unlock_dir(&rust);
    assert!(matches!(err, Err(CoreError::Io { .. })));

    assert!(id.exists());
    assert!(store.card(&id).is_ok());
    assert!(store.card(&under(&store, "question_mark.md")).is_ok());
    let (fresh, _) = FsStore::open(dir.path()).unwrap();
    assert_eq!(layout(&store), layout(&fresh));
}

#[cfg(unix)]
#[test]
fn failed_deck_delete_leaves_memory_matching_disk() {
    let dir = seeded();
    let (mut store, _) = open(&dir);
    let rust = under(&store, "rust");
    let nested = rust.join("async");
    if !lock_dir(&nested) {
        return;
    }

    let err = store.delete_deck(&rust);
    unlock_dir(&nested);
    assert!(matches!(err, Err(CoreError::Io { .. })));

    assert!(store.deck(&nested).is_ok());
    assert!(store.card(&nested.join("pin.md")).is_ok());
    let (fresh, _) = FsStore::open(dir.path()).unwrap();
    assert_eq!(layout(&store), layout(&fresh));
}

use chrono::{DateTime, Utc};
use deckard_core::{
    apply_rating, Card, Clock, CoreError, Deck, DeckId, DeckTree, Rating, Repository, Review, SystemClock,
};
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub mod codec;
pub mod paths;
pub mod review_log;

use codec::TagPolicy;
use review_log::ReviewLog;

/// Card store backed by a directory tree: every directory is a deck and
/// every `*.md` file directly inside it is a card.
pub struct FsStore {
    tree: DeckTree,
    clock: Box<dyn Clock>,
    log: ReviewLog,
    reviews: Vec<Review>,
}

impl FsStore {
    /// Opens `root` with the system clock. Files that fail to parse are
    /// skipped and returned alongside the store.
    pub fn open(root: impl AsRef<Path>) -> Result<(Self, Vec<CoreError>), CoreError> {
        Self::open_with_clock(root, SystemClock)
    }

    pub fn open_with_clock(
        root: impl AsRef<Path>,
        clock: impl Clock + 'static,
    ) -> Result<(Self, Vec<CoreError>), CoreError> {
        let given = root.as_ref();
        let root = fs::canonicalize(given).map_err(|e| CoreError::io(given, e))?;
        if !root.is_dir() {
            let e = io::Error::new(io::ErrorKind::InvalidInput, "not a directory");
            return Err(CoreError::io(&root, e));
        }

        let mut store = Self {
            tree: DeckTree::new(&root, dir_created(&root)),
            clock: Box::new(clock),
            log: ReviewLog::new(&root),
            reviews: Vec::new(),
        };
        let errors = store.load_all();
        info!(
            "opened {} with {} deck(s), {} card(s), {} unreadable file(s)",
            root.display(),
            store.tree.deck_count(),
            store.all_cards(&root).map(|c| c.len()).unwrap_or(0),
            errors.len()
        );
        Ok((store, errors))
    }

    pub fn root(&self) -> &Path {
        self.tree.root_path()
    }

    /// Re-reads the whole tree and the review history from disk.
    pub fn refresh(&mut self) -> Vec<CoreError> {
        let root = self.tree.root_path().to_path_buf();
        self.tree = DeckTree::new(&root, dir_created(&root));
        self.load_all()
    }

    fn load_all(&mut self) -> Vec<CoreError> {
        let root = self.tree.root_path().to_path_buf();
        let mut errors = Vec::new();
        self.load_subtree(&root, &mut errors);
        match self.log.load() {
            Ok(r) => self.reviews = r,
            Err(e) => {
                warn!("review history unavailable: {e}");
                self.reviews.clear();
                errors.push(e);
            }
        }
        errors
    }

    // `dir` must already be a deck of the tree.
    fn load_subtree(&mut self, dir: &Path, errors: &mut Vec<CoreError>) {
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    let err = CoreError::io(&path, e.into());
                    warn!("{err}");
                    errors.push(err);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let path = entry.path();
            if entry.file_type().is_dir() {
                let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
                    continue;
                };
                if let Err(e) = self.tree.add_deck(parent, &name.to_string_lossy(), dir_created(path)) {
                    warn!("skipping directory {}: {e}", path.display());
                }
            } else if entry.file_type().is_file() && codec::is_card_file(path) {
                match codec::parse(path).and_then(|c| self.attach(c)) {
                    Ok(()) => {}
                    Err(e) => {
                        warn!("skipping {}: {e}", path.display());
                        errors.push(e);
                    }
                }
            }
        }
    }

    fn attach(&mut self, card: Card) -> Result<(), CoreError> {
        let studied = card.last_reviewed;
        let deck = card.deck_path().to_path_buf();
        self.tree.insert_card(card)?;
        if let (Some(at), Some(d)) = (studied, self.tree.deck_mut(&deck)) {
            if d.last_studied.map_or(true, |prev| at > prev) {
                d.last_studied = Some(at);
            }
        }
        Ok(())
    }

    // Re-reads the card files directly inside `dir` so memory matches disk.
    fn reload_cards(&mut self, dir: &Path) {
        let Some(deck) = self.tree.deck_mut(dir) else {
            return;
        };
        deck.cards.clear();
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("cannot re-read {}: {e}", dir.display());
                return;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| codec::is_card_file(p) && !p.file_name().map(is_hidden).unwrap_or(true))
            .collect();
        paths.sort();
        for p in paths {
            if let Err(e) = codec::parse(&p).and_then(|c| self.attach(c)) {
                warn!("skipping {}: {e}", p.display());
            }
        }
    }

    // Rebuilds the subtree at `dir` from disk, dropping it if it is gone.
    fn reload_subtree(&mut self, dir: &Path) {
        let mut errors = Vec::new();
        if dir == self.tree.root_path() {
            errors = self.refresh();
        } else {
            let _ = self.tree.remove_subtree(dir);
            if let (Some(parent), Some(name), true) = (dir.parent(), dir.file_name(), dir.is_dir()) {
                let added = self
                    .tree
                    .add_deck(parent, &name.to_string_lossy(), dir_created(dir))
                    .map(|_| ());
                match added {
                    Ok(()) => self.load_subtree(dir, &mut errors),
                    Err(e) => warn!("cannot restore deck {}: {e}", dir.display()),
                }
            }
        }
        for e in errors {
            warn!("while re-reading {}: {e}", dir.display());
        }
    }

    fn record(&mut self, review: Review) {
        if let Err(e) = self.log.append(&review) {
            warn!("review of {} not logged: {e}", review.card.display());
        }
        self.reviews.push(review);
    }

    fn relocate_history(&mut self, from: &Path, to: &Path) {
        if review_log::relocate(&mut self.reviews, from, to) {
            if let Err(e) = self.log.rewrite(&self.reviews) {
                warn!("review history still points at {}: {e}", from.display());
            }
        }
    }

    fn free_path(&self, dir: &Path, file_name: &str) -> PathBuf {
        let tree = &self.tree;
        codec::unique_path(dir, file_name, |p| p.exists() || tree.card(p).is_some())
    }

    /// Writes a new card into `deck`, naming the file after `title`.
    pub fn create_card(
        &mut self,
        deck: &Path,
        title: &str,
        question: &str,
        answer: &str,
        tags: &[String],
    ) -> Result<Card, CoreError> {
        if !self.tree.contains_deck(deck) {
            return Err(CoreError::not_found(deck));
        }
        let now = self.now();
        let path = self.free_path(deck, &codec::sanitize_filename(title));

        let mut card = Card::new(&path, question.trim_end(), answer.trim_end());
        if !title.trim().is_empty() {
            card.title = title.trim().to_string();
        }
        card.merge_tags(tags);
        card.created_at = Some(now);

        let written = codec::emit_with(&card, &path, now, TagPolicy::Replace)?;
        self.tree.insert_card(written.clone())?;
        info!("created card {}", path.display());
        Ok(written)
    }

    /// Replaces the question, answer and tags of a card.
    pub fn edit_card(&mut self, id: &Path, question: &str, answer: &str, tags: &[String]) -> Result<Card, CoreError> {
        let now = self.now();
        let card = self.tree.card(id).ok_or_else(|| CoreError::not_found(id))?;
        ensure_fresh(card)?;

        let mut edited = card.clone();
        edited.question = question.trim_end().to_string();
        edited.answer = answer.trim_end().to_string();
        edited.tags.clear();
        edited.merge_tags(tags);

        let written = codec::emit_with(&edited, id, now, TagPolicy::Replace)?;
        self.tree.insert_card(written.clone())?;
        info!("edited card {}", id.display());
        Ok(written)
    }

    pub fn delete_card(&mut self, id: &Path) -> Result<(), CoreError> {
        if self.tree.card(id).is_none() {
            return Err(CoreError::not_found(id));
        }
        match fs::remove_file(id) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => warn!("{} was already gone", id.display()),
            Err(e) => return Err(CoreError::io(id, e)),
        }
        self.tree.remove_card(id);
        info!("deleted card {}", id.display());
        Ok(())
    }

    /// Moves a card into `target`. The card's identity becomes its new path.
    pub fn move_card(&mut self, id: &Path, target: &Path) -> Result<Card, CoreError> {
        let card = self.tree.card(id).ok_or_else(|| CoreError::not_found(id))?.clone();
        if !self.tree.contains_deck(target) {
            return Err(CoreError::invariant(format!(
                "{} is not a deck of this store",
                target.display()
            )));
        }
        if card.deck_path() == target {
            return Ok(card);
        }
        ensure_fresh(&card)?;

        let now = self.now();
        let new_path = self.free_path(target, &card.file_name());
        let written = codec::emit_with(&card, &new_path, now, TagPolicy::Replace)?;
        if let Err(e) = fs::remove_file(id) {
            let err = CoreError::io(id, e);
            warn!("moving {} left the original in place: {err}", id.display());
            self.reload_cards(card.deck_path());
            self.reload_cards(target);
            return Err(err);
        }

        self.tree.remove_card(id);
        self.tree.insert_card(written.clone())?;
        self.relocate_history(id, &new_path);
        info!("moved card {} to {}", id.display(), new_path.display());
        Ok(written)
    }

    pub fn create_deck(&mut self, parent: &Path, name: &str) -> Result<&Deck, CoreError> {
        if !self.tree.contains_deck(parent) {
            return Err(CoreError::not_found(parent));
        }
        let name = codec::sanitize_dir_name(name).ok_or_else(|| CoreError::invariant("deck name is empty"))?;
        let path = parent.join(&name);
        if self.tree.contains_deck(&path) || path.exists() {
            return Err(CoreError::invariant(format!("{} already exists", path.display())));
        }
        fs::create_dir(&path).map_err(|e| CoreError::io(&path, e))?;
        info!("created deck {}", path.display());
        let now = self.now();
        self.tree.add_deck(parent, &name, Some(now))
    }

    /// Renames a deck directory and re-reads its subtree. Returns the new
    /// deck path.
    pub fn rename_deck(&mut self, deck: &Path, new_name: &str) -> Result<DeckId, CoreError> {
        let node = self.tree.deck(deck).ok_or_else(|| CoreError::not_found(deck))?;
        let Some(parent) = node.parent.clone() else {
            return Err(CoreError::invariant("the root deck cannot be renamed"));
        };
        let created = node.created_at;
        let name = codec::sanitize_dir_name(new_name).ok_or_else(|| CoreError::invariant("deck name is empty"))?;
        let new_path = parent.join(&name);
        if new_path == deck {
            return Ok(new_path);
        }
        if self.tree.contains_deck(&new_path) || new_path.exists() {
            return Err(CoreError::invariant(format!("{} already exists", new_path.display())));
        }

        fs::rename(deck, &new_path).map_err(|e| CoreError::io(deck, e))?;
        self.tree.remove_subtree(deck)?;
        self.tree.add_deck(&parent, &name, created).map(|_| ())?;
        let mut errors = Vec::new();
        self.load_subtree(&new_path, &mut errors);
        for e in errors {
            warn!("after renaming {}: {e}", deck.display());
        }
        self.relocate_history(deck, &new_path);
        info!("renamed deck {} to {}", deck.display(), new_path.display());
        Ok(new_path)
    }

    /// Removes a deck directory with everything below it.
    pub fn delete_deck(&mut self, deck: &Path) -> Result<(), CoreError> {
        if deck == self.tree.root_path() {
            return Err(CoreError::invariant("the root deck cannot be deleted"));
        }
        if !self.tree.contains_deck(deck) {
            return Err(CoreError::not_found(deck));
        }
        if let Err(e) = fs::remove_dir_all(deck) {
            let err = CoreError::io(deck, e);
            warn!("partial delete of {}: {err}", deck.display());
            self.reload_subtree(deck);
            return Err(err);
        }
        self.tree.remove_subtree(deck)?;
        info!("deleted deck {}", deck.display());
        Ok(())
    }
}

impl Repository for FsStore {
    fn tree(&self) -> &DeckTree {
        &self.tree
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    fn rate(&mut self, id: &Path, rating: Rating) -> Result<Card, CoreError> {
        let now = self.now();
        let card = self.tree.card(id).ok_or_else(|| CoreError::not_found(id))?;
        ensure_fresh(card)?;
        let out = apply_rating(card, rating, now);

        let written = codec::emit(&out.updated_card, id, now)?;
        self.tree.insert_card(written.clone())?;
        self.tree.touch(written.deck_path(), now);
        self.record(out.review);
        debug!(
            "rated {} {} -> interval {}d, ease {:.2}",
            id.display(),
            rating.as_score(),
            written.interval_days,
            written.ease
        );
        Ok(written)
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn dir_created(path: &Path) -> Option<DateTime<Utc>> {
    let meta = fs::metadata(path).ok()?;
    meta.created().or_else(|_| meta.modified()).ok().map(DateTime::<Utc>::from)
}

// Refuses to overwrite a file that changed on disk after it was read.
fn ensure_fresh(card: &Card) -> Result<(), CoreError> {
    let Some(loaded) = card.modified else {
        return Ok(());
    };
    match fs::metadata(&card.path).and_then(|m| m.modified()) {
        Ok(on_disk) if on_disk > loaded => Err(CoreError::StaleWrite {
            path: card.path.clone(),
        }),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CoreError::not_found(&card.path)),
        Err(e) => Err(CoreError::io(&card.path, e)),
    }
}

//! In-memory deck tree.
//!
//! Every deck is keyed by its directory path. A deck's `parent` and
//! `sub_decks` are paths into the same index, so the tree owns all nodes
//! and nothing holds a reference across mutations.

use crate::{Card, CardId, CoreError, DeckId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct Deck {
    pub path: DeckId,
    pub name: String,
    pub full_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_studied: Option<DateTime<Utc>>,
    pub parent: Option<DeckId>,
    pub sub_decks: BTreeSet<DeckId>,
    pub cards: BTreeMap<CardId, Card>,
}

impl Deck {
    fn new(path: PathBuf, full_name: String, parent: Option<DeckId>, created_at: Option<DateTime<Utc>>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            full_name,
            created_at,
            last_studied: None,
            parent,
            sub_decks: BTreeSet::new(),
            cards: BTreeMap::new(),
        }
    }

    /// Number of path components below the root.
    pub fn depth(&self) -> usize {
        self.full_name.matches('/').count()
    }
}

#[derive(Clone, Debug)]
pub struct DeckTree {
    root: DeckId,
    decks: BTreeMap<DeckId, Deck>,
}

impl DeckTree {
    pub fn new(root: impl Into<PathBuf>, created_at: Option<DateTime<Utc>>) -> Self {
        let root = root.into();
        let mut deck = Deck::new(root.clone(), String::new(), None, created_at);
        deck.full_name = deck.name.clone();
        let mut decks = BTreeMap::new();
        decks.insert(root.clone(), deck);
        Self { root, decks }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn root(&self) -> &Deck {
        &self.decks[&self.root]
    }

    pub fn deck(&self, path: &Path) -> Option<&Deck> {
        self.decks.get(path)
    }

    pub fn deck_mut(&mut self, path: &Path) -> Option<&mut Deck> {
        self.decks.get_mut(path)
    }

    pub fn contains_deck(&self, path: &Path) -> bool {
        self.decks.contains_key(path)
    }

    pub fn deck_count(&self) -> usize {
        self.decks.len()
    }

    pub fn full_name(&self, path: &Path) -> Option<&str> {
        self.decks.get(path).map(|d| d.full_name.as_str())
    }

    /// Adds a child deck named `name` under `parent`.
    pub fn add_deck(&mut self, parent: &Path, name: &str, created_at: Option<DateTime<Utc>>) -> Result<&Deck, CoreError> {
        let parent_full = match self.decks.get(parent) {
            Some(p) => p.full_name.clone(),
            None => return Err(CoreError::not_found(parent)),
        };
        let path = parent.join(name);
        if self.decks.contains_key(&path) {
            return Err(CoreError::invariant(format!("deck {} already exists", path.display())));
        }
        let deck = Deck::new(
            path.clone(),
            format!("{parent_full}/{name}"),
            Some(parent.to_path_buf()),
            created_at,
        );
        if let Some(p) = self.decks.get_mut(parent) {
            p.sub_decks.insert(path.clone());
        }
        let deck = self.decks.entry(path).or_insert(deck);
        Ok(&*deck)
    }

    /// Attaches `card` to the deck of its containing directory, replacing
    /// any card with the same path.
    pub fn insert_card(&mut self, card: Card) -> Result<(), CoreError> {
        let deck_path = card.deck_path().to_path_buf();
        let Some(deck) = self.decks.get_mut(&deck_path) else {
            return Err(CoreError::invariant(format!(
                "{} is not inside a deck of this store",
                card.path.display()
            )));
        };
        deck.cards.insert(card.path.clone(), card);
        Ok(())
    }

    pub fn card(&self, id: &Path) -> Option<&Card> {
        self.decks.get(id.parent()?)?.cards.get(id)
    }

    pub fn card_mut(&mut self, id: &Path) -> Option<&mut Card> {
        self.decks.get_mut(id.parent()?)?.cards.get_mut(id)
    }

    pub fn remove_card(&mut self, id: &Path) -> Option<Card> {
        self.decks.get_mut(id.parent()?)?.cards.remove(id)
    }

    /// Records that `deck` was studied at `at`.
    pub fn touch(&mut self, deck: &Path, at: DateTime<Utc>) {
        if let Some(d) = self.decks.get_mut(deck) {
            d.last_studied = Some(at);
        }
    }

    /// Detaches `path` and all its descendants, returning the removed decks.
    pub fn remove_subtree(&mut self, path: &Path) -> Result<Vec<Deck>, CoreError> {
        if path == self.root {
            return Err(CoreError::invariant("the root deck cannot be removed"));
        }
        let Some(parent) = self.decks.get(path).map(|d| d.parent.clone()) else {
            return Err(CoreError::not_found(path));
        };
        let doomed: Vec<DeckId> = self.walk(path).into_iter().cloned().collect();
        let removed = doomed.iter().filter_map(|p| self.decks.remove(p)).collect();
        if let Some(p) = parent.and_then(|p| self.decks.get_mut(&p)) {
            p.sub_decks.remove(path);
        }
        Ok(removed)
    }

    fn walk(&self, from: &Path) -> Vec<&DeckId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(p) = stack.pop() {
            let Some(deck) = self.decks.get(p) else { continue };
            out.push(&deck.path);
            stack.extend(deck.sub_decks.iter().rev().map(PathBuf::as_path));
        }
        out
    }

    /// Pre-order traversal starting at `from`, siblings sorted by name.
    pub fn all_decks(&self, from: &Path) -> Option<Vec<&Deck>> {
        if !self.decks.contains_key(from) {
            return None;
        }
        Some(self.walk(from).into_iter().filter_map(|p| self.decks.get(p)).collect())
    }

    /// Cards of `from` and all of its descendants, sorted by path.
    pub fn all_cards(&self, from: &Path) -> Option<Vec<&Card>> {
        let mut cards: Vec<&Card> = self
            .all_decks(from)?
            .into_iter()
            .flat_map(|d| d.cards.values())
            .collect();
        cards.sort_by(|a, b| a.path.cmp(&b.path));
        Some(cards)
    }
}

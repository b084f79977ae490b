use crate::{filters, stats, Card, Clock, CoreError, Deck, DeckTree, Rating, Review, Stats};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;

pub mod memory;

/// Read access to a deck tree plus the one mutation a review needs.
///
/// The review session and the presentation layer are written against this
/// trait; the filesystem store and [`memory::MemoryRepo`] implement it.
pub trait Repository {
    fn tree(&self) -> &DeckTree;
    fn clock(&self) -> &dyn Clock;
    fn reviews(&self) -> &[Review];

    /// Schedules the card, persists it and returns the stored result.
    fn rate(&mut self, id: &Path, rating: Rating) -> Result<Card, CoreError>;

    fn now(&self) -> DateTime<Utc> {
        self.clock().now()
    }

    fn root_path(&self) -> &Path {
        self.tree().root_path()
    }

    fn card(&self, id: &Path) -> Result<&Card, CoreError> {
        self.tree().card(id).ok_or_else(|| CoreError::not_found(id))
    }

    fn deck(&self, path: &Path) -> Result<&Deck, CoreError> {
        self.tree().deck(path).ok_or_else(|| CoreError::not_found(path))
    }

    fn all_decks(&self) -> Vec<&Deck> {
        self.tree().all_decks(self.root_path()).unwrap_or_default()
    }

    fn all_cards(&self, deck: &Path) -> Result<Vec<&Card>, CoreError> {
        self.tree().all_cards(deck).ok_or_else(|| CoreError::not_found(deck))
    }

    /// Due cards under `deck`, earliest next review first, then by path.
    fn due_cards(&self, deck: &Path) -> Result<Vec<&Card>, CoreError> {
        let cards = self.all_cards(deck)?;
        Ok(filters::due_sorted(&cards, self.now()))
    }

    /// Cards anywhere in the tree matching `text`, ordered by deck full
    /// name and then path.
    fn search(&self, text: &str) -> Vec<&Card> {
        let tree = self.tree();
        let all = tree.all_cards(tree.root_path()).unwrap_or_default();
        let mut hits = filters::filter_by_text(&all, text);
        hits.sort_by(|a, b| {
            let da = tree.full_name(a.deck_path()).unwrap_or_default();
            let db = tree.full_name(b.deck_path()).unwrap_or_default();
            da.cmp(db).then_with(|| a.path.cmp(&b.path))
        });
        hits
    }

    fn stats(&self, deck: &Path) -> Result<Stats, CoreError> {
        stats::deck_stats(self.tree(), deck, self.reviews(), self.now()).ok_or_else(|| CoreError::not_found(deck))
    }

    fn forecast(&self, deck: &Path, days: u32) -> Result<Vec<(NaiveDate, usize)>, CoreError> {
        let cards = self.all_cards(deck)?;
        Ok(stats::forecast(&cards, self.now(), days))
    }
}

use crate::{scheduler::apply_rating, Card, Clock, CoreError, DeckId, DeckTree, Rating, Review};
use std::path::{Path, PathBuf};

/// A repository that never touches the disk.
pub struct MemoryRepo {
    tree: DeckTree,
    clock: Box<dyn Clock>,
    reviews: Vec<Review>,
}

impl MemoryRepo {
    pub fn new(root: impl Into<PathBuf>, clock: impl Clock + 'static) -> Self {
        let clock: Box<dyn Clock> = Box::new(clock);
        let tree = DeckTree::new(root, Some(clock.now()));
        Self {
            tree,
            clock,
            reviews: Vec::new(),
        }
    }

    pub fn add_deck(&mut self, parent: &Path, name: &str) -> Result<DeckId, CoreError> {
        let now = self.clock.now();
        Ok(self.tree.add_deck(parent, name, Some(now))?.path.clone())
    }

    pub fn add_card(&mut self, mut card: Card) -> Result<(), CoreError> {
        card.created_at.get_or_insert(self.clock.now());
        self.tree.insert_card(card)
    }

    pub fn remove_card(&mut self, id: &Path) -> Result<Card, CoreError> {
        self.tree.remove_card(id).ok_or_else(|| CoreError::not_found(id))
    }
}

impl crate::repo::Repository for MemoryRepo {
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
        let now = self.clock.now();
        let Some(card) = self.tree.card_mut(id) else {
            return Err(CoreError::not_found(id));
        };
        let out = apply_rating(card, rating, now);
        *card = out.updated_card.clone();
        self.tree.touch(out.updated_card.deck_path(), now);
        self.reviews.push(out.review);
        Ok(out.updated_card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Repository;
    use crate::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn repo() -> (MemoryRepo, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap());
        let mut r = MemoryRepo::new("/decks", clock.clone());
        let lang = r.add_deck(Path::new("/decks"), "lang").unwrap();
        r.add_card(Card::new(lang.join("hola.md"), "hola", "hello")).unwrap();
        let mut adios = Card::new(lang.join("adios.md"), "adios", "goodbye");
        adios.tags = vec!["farewell".into()];
        r.add_card(adios).unwrap();
        r.add_card(Card::new("/decks/top.md", "top", "level")).unwrap();
        (r, clock)
    }

    #[test]
    fn rate_updates_card_deck_and_history() {
        let (mut r, clock) = repo();
        let id = PathBuf::from("/decks/lang/hola.md");
        let updated = r.rate(&id, Rating::Good).unwrap();
        assert_eq!(updated.interval_days, 1);
        assert_eq!(r.card(&id).unwrap().last_rating, Some(Rating::Good));
        assert_eq!(r.deck(Path::new("/decks/lang")).unwrap().last_studied, Some(clock.now()));
        assert_eq!(r.reviews().len(), 1);

        assert_eq!(r.due_cards(Path::new("/decks")).unwrap().len(), 2);
        clock.advance(Duration::days(1));
        assert_eq!(r.due_cards(Path::new("/decks")).unwrap().len(), 3);
    }

    #[test]
    fn rate_unknown_card_is_not_found() {
        let (mut r, _) = repo();
        let err = r.rate(Path::new("/decks/missing.md"), Rating::Easy).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn search_orders_by_deck_then_path() {
        let (r, _) = repo();
        let hits: Vec<String> = r.search("o").iter().map(|c| c.file_name()).collect();
        assert_eq!(hits, ["top.md", "adios.md", "hola.md"]);
        assert_eq!(r.search("FAREWELL").len(), 1);
    }

    #[test]
    fn stats_for_unknown_deck_is_not_found() {
        let (r, _) = repo();
        assert!(r.stats(Path::new("/nowhere")).unwrap_err().is_not_found());
        assert_eq!(r.stats(Path::new("/decks")).unwrap().total_cards, 3);
    }
}

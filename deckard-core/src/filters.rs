use crate::{Card, DueStatus};
use chrono::{DateTime, Utc};

/// Case-insensitive substring match on title, question, answer and tags.
pub fn matches_text(card: &Card, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    card.title.to_lowercase().contains(&q)
        || card.question.to_lowercase().contains(&q)
        || card.answer.to_lowercase().contains(&q)
        || card.tags.iter().any(|t| t.to_lowercase().contains(&q))
}

pub fn filter_by_text<'a>(cards: &[&'a Card], query: &str) -> Vec<&'a Card> {
    cards.iter().copied().filter(|c| matches_text(c, query)).collect()
}

pub fn filter_by_tag<'a>(cards: &[&'a Card], tag: &str) -> Vec<&'a Card> {
    cards.iter().copied().filter(|c| c.has_tag(tag)).collect()
}

pub fn filter_by_due<'a>(cards: &[&'a Card], now: DateTime<Utc>, want: DueStatus) -> Vec<&'a Card> {
    cards
        .iter()
        .copied()
        .filter(|c| c.due_status(now) == want)
        .collect()
}

/// Cards due at `now`, earliest next review first, ties broken by path.
pub fn due_sorted<'a>(cards: &[&'a Card], now: DateTime<Utc>) -> Vec<&'a Card> {
    let mut due: Vec<&Card> = cards.iter().copied().filter(|c| c.is_due(now)).collect();
    due.sort_by(|a, b| {
        a.next_review(now)
            .cmp(&b.next_review(now))
            .then_with(|| a.path.cmp(&b.path))
    });
    due
}

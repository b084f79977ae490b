use crate::{Card, Rating, Review, EASE_MAX, EASE_MIN, EASE_STEP, EASY_BONUS, MAX_INTERVAL};
use chrono::{DateTime, Utc};

pub struct ScheduleOutcome {
    pub updated_card: Card,
    pub review: Review,
}

fn clamp_ease(x: f64) -> f64 {
    x.clamp(EASE_MIN, EASE_MAX)
}

fn scaled(prev: u32, factor: f64) -> u32 {
    (prev as f64 * factor + 1e-9).floor() as u32
}

/// Computes the new metadata for `card` after it was rated at `now`.
///
/// Only `ease`, `interval_days`, `last_reviewed` and `last_rating` change.
pub fn schedule(card: &Card, rating: Rating, now: DateTime<Utc>) -> Card {
    let prev = card.interval_days;
    let ease = card.ease;

    let (interval, new_ease) = match rating {
        Rating::Again | Rating::Blackout => (1, ease - 2.0 * EASE_STEP),
        Rating::Wrong => (1, ease - 0.20),
        Rating::Hard => {
            let i = if prev == 0 { 1 } else { scaled(prev, 1.2) };
            (i, ease - EASE_STEP)
        }
        Rating::Good => {
            let i = match prev {
                0 => 1,
                1 => 3,
                _ => scaled(prev, ease),
            };
            (i, ease)
        }
        Rating::Easy => {
            let i = match prev {
                0 => 2,
                1 => 4,
                _ => scaled(prev, ease * EASY_BONUS),
            };
            (i, ease + EASE_STEP)
        }
    };

    let mut next = card.clone();
    next.ease = clamp_ease(new_ease);
    next.interval_days = interval.min(MAX_INTERVAL);
    next.last_reviewed = Some(now);
    next.last_rating = Some(rating);
    next
}

/// Like [`schedule`], also producing the history entry for the rating.
pub fn apply_rating(card: &Card, rating: Rating, now: DateTime<Utc>) -> ScheduleOutcome {
    let updated_card = schedule(card, rating, now);
    let review = Review::new(
        updated_card.path.clone(),
        rating,
        now,
        updated_card.interval_days,
        updated_card.ease,
    );
    ScheduleOutcome { updated_card, review }
}

/// A card is due once its next review time has been reached.
/// Cards that were never reviewed are always due.
pub fn is_due(card: &Card, now: DateTime<Utc>) -> bool {
    card.next_review(now) <= now
}

use chrono::{Duration, TimeZone, Utc};
use deckard_core::{apply_rating, Card, Rating, EASE_DEFAULT, EASE_MAX, EASE_MIN, MAX_INTERVAL};

fn card() -> Card {
    Card::new("/decks/lang/hola.md", "hola", "hello")
}

#[test]
fn easy_from_new() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    let out = apply_rating(&card(), Rating::Easy, now);
    let c = out.updated_card;

    assert_eq!(c.interval_days, 2);
    assert!(c.ease > EASE_DEFAULT && c.ease <= EASE_MAX);
    assert_eq!(c.last_reviewed, Some(now));
    assert_eq!(c.last_rating, Some(Rating::Easy));
    assert_eq!(c.next_review(now), now + Duration::days(2));
    assert_eq!(out.review.interval_days, 2);
    assert_eq!(out.review.card, c.path);
}

#[test]
fn good_progression() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    let mut c = card();
    let mut seen = Vec::new();
    for day in 0..5 {
        c = apply_rating(&c, Rating::Good, now + Duration::days(day)).updated_card;
        seen.push(c.interval_days);
    }
    // 1, 3, then multiplied by an unchanged ease of 2.5
    assert_eq!(seen, [1, 3, 7, 17, 42]);
    assert_eq!(c.ease, EASE_DEFAULT);
}

#[test]
fn failure_resets_interval() {
    let now = Utc::now();
    let mut c = card();
    c.interval_days = 40;
    c.last_reviewed = Some(now - Duration::days(40));

    let c2 = apply_rating(&c, Rating::Blackout, now).updated_card;
    assert_eq!(c2.interval_days, 1);
    assert!(c2.ease >= EASE_MIN && c2.ease <= EASE_MAX);
    assert_eq!(c2.last_rating, Some(Rating::Blackout));
    assert!(!c2.is_due(now));
    assert!(c2.is_due(now + Duration::days(1)));
}

#[test]
fn ease_and_interval_stay_in_bounds() {
    let now = Utc::now();
    let mut c = card();
    for _ in 0..30 {
        c = apply_rating(&c, Rating::Easy, now).updated_card;
    }
    assert_eq!(c.ease, EASE_MAX);
    assert_eq!(c.interval_days, MAX_INTERVAL);

    for _ in 0..30 {
        c = apply_rating(&c, Rating::Again, now).updated_card;
    }
    assert_eq!(c.ease, EASE_MIN);
    assert_eq!(c.interval_days, 1);
}

use crate::{Card, DeckTree, Rating, Review};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const RECENT_WINDOW_DAYS: i64 = 30;
pub const YOUNG_MAX_INTERVAL: u32 = 7;

#[derive(Clone, Debug, Default)]
pub struct Totals {
    pub total: u32,
    pub by_rating: [u32; 6],
}

impl Totals {
    pub fn record(&mut self, r: Rating) {
        self.total += 1;
        self.by_rating[r.as_score() as usize] += 1;
    }

    fn count_where(&self, pred: impl Fn(Rating) -> bool) -> u32 {
        Rating::ALL
            .iter()
            .filter(|r| pred(**r))
            .map(|r| self.by_rating[r.as_score() as usize])
            .sum()
    }

    /// Share of ratings of 3 or more, as a whole percent.
    pub fn success_rate(&self) -> u32 {
        percent(self.count_where(|r| r.is_success()), self.total)
    }

    /// Share of ratings of 4 or more, as a whole percent.
    pub fn retention_rate(&self) -> u32 {
        percent(self.count_where(|r| r.is_retained()), self.total)
    }

    /// Counts keyed 1..=5; a 0 is reported together with 1.
    pub fn distribution(&self) -> BTreeMap<u8, u32> {
        let mut m: BTreeMap<u8, u32> = (1..=5).map(|k| (k, 0)).collect();
        for r in Rating::ALL {
            let key = r.as_score().max(1);
            *m.entry(key).or_default() += self.by_rating[r.as_score() as usize];
        }
        m
    }
}

fn percent(part: u32, total: u32) -> u32 {
    if total == 0 {
        0
    } else {
        part * 100 / total
    }
}

#[derive(Clone, Debug, Default)]
pub struct StatsSummary {
    pub totals: Totals,
    pub per_day: BTreeMap<NaiveDate, Totals>,
}

pub fn summarize<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> StatsSummary {
    let mut summary = StatsSummary::default();
    for r in reviews {
        summary.totals.record(r.rating);
        let d = r.reviewed_at.date_naive();
        summary.per_day.entry(d).or_default().record(r.rating);
    }
    summary
}

/// Consecutive study days ending today, or yesterday when nothing has
/// been reviewed yet today.
pub fn daily_streak<'a>(reviews: impl IntoIterator<Item = &'a Review>, today: NaiveDate) -> u32 {
    let per_day = summarize(reviews).per_day;
    let studied = |d: &NaiveDate| per_day.get(d).map(|t| t.total > 0).unwrap_or(false);

    let mut day = today;
    if !studied(&day) {
        day -= Duration::days(1);
    }
    let mut streak = 0u32;
    while studied(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Stats {
    pub total_cards: usize,
    pub direct_cards: usize,
    pub sub_decks: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    pub young_cards: usize,
    pub mature_cards: usize,
    pub success_rate_30d: u32,
    pub retention_rate_30d: u32,
    pub average_interval_days: f64,
    pub rating_distribution_30d: BTreeMap<u8, u32>,
    pub last_studied_at: Option<DateTime<Utc>>,
    pub reviews_30d: u32,
    pub streak_days: u32,
}

/// Statistics for the subtree rooted at `deck`, or `None` if the deck is unknown.
pub fn deck_stats(tree: &DeckTree, deck: &Path, reviews: &[Review], now: DateTime<Utc>) -> Option<Stats> {
    let node = tree.deck(deck)?;
    let decks = tree.all_decks(deck)?;
    let cards = tree.all_cards(deck)?;

    let mut s = Stats {
        total_cards: cards.len(),
        direct_cards: node.cards.len(),
        sub_decks: node.sub_decks.len(),
        last_studied_at: decks.iter().filter_map(|d| d.last_studied).max(),
        ..Stats::default()
    };

    let mut interval_sum = 0u64;
    let mut interval_n = 0u64;
    for c in &cards {
        if c.is_due(now) {
            s.due_cards += 1;
        }
        if c.is_new() {
            s.new_cards += 1;
        }
        match c.interval_days {
            0 => {}
            1..=YOUNG_MAX_INTERVAL => s.young_cards += 1,
            _ => s.mature_cards += 1,
        }
        if c.interval_days > 0 && !c.is_new() {
            interval_sum += c.interval_days as u64;
            interval_n += 1;
        }
    }
    if interval_n > 0 {
        s.average_interval_days = interval_sum as f64 / interval_n as f64;
    }

    let in_scope: Vec<&Review> = reviews.iter().filter(|r| r.card.starts_with(deck)).collect();
    let since = now - Duration::days(RECENT_WINDOW_DAYS);
    let recent = summarize(
        in_scope
            .iter()
            .copied()
            .filter(|r| r.reviewed_at > since && r.reviewed_at <= now),
    );
    s.reviews_30d = recent.totals.total;
    s.success_rate_30d = recent.totals.success_rate();
    s.retention_rate_30d = recent.totals.retention_rate();
    s.rating_distribution_30d = recent.totals.distribution();
    s.streak_days = daily_streak(in_scope, now.date_naive());

    Some(s)
}

/// Number of cards becoming due on each of the next `days` days. Overdue
/// and never-reviewed cards count toward today.
pub fn forecast(cards: &[&Card], now: DateTime<Utc>, days: u32) -> Vec<(NaiveDate, usize)> {
    let today = now.date_naive();
    let mut buckets: Vec<(NaiveDate, usize)> = (0..days)
        .map(|i| (today + Duration::days(i as i64), 0))
        .collect();
    for c in cards {
        let next = c.next_review(now);
        let offset = if next <= now {
            0
        } else {
            (next.date_naive() - today).num_days()
        };
        if let Some(b) = usize::try_from(offset).ok().and_then(|i| buckets.get_mut(i)) {
            b.1 += 1;
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn review(card: &str, rating: Rating, days_ago: i64) -> Review {
        Review::new(card, rating, now() - Duration::days(days_ago), 1, 2.5)
    }

    #[test]
    fn totals_rates_and_distribution() {
        let mut t = Totals::default();
        for r in [Rating::Again, Rating::Wrong, Rating::Hard, Rating::Good, Rating::Easy] {
            t.record(r);
        }
        assert_eq!(t.success_rate(), 60);
        assert_eq!(t.retention_rate(), 40);
        let d = t.distribution();
        assert_eq!(d.len(), 5);
        assert_eq!(d[&1], 1);
        assert_eq!(d[&5], 1);
        assert_eq!(Totals::default().success_rate(), 0);
    }

    #[test]
    fn streak_counts_back_from_yesterday_when_today_is_empty() {
        let reviews = vec![
            review("/d/a.md", Rating::Good, 1),
            review("/d/a.md", Rating::Good, 2),
            review("/d/a.md", Rating::Good, 4),
        ];
        assert_eq!(daily_streak(&reviews, now().date_naive()), 2);
        assert_eq!(daily_streak(&reviews[..0], now().date_naive()), 0);
    }

    #[test]
    fn deck_stats_cover_subtree() {
        let root = PathBuf::from("/d");
        let mut tree = DeckTree::new(&root, None);
        tree.add_deck(&root, "sub", None).unwrap();

        let fresh = Card::new("/d/fresh.md", "q", "a");
        let mut young = Card::new("/d/young.md", "q", "a");
        young.last_reviewed = Some(now() - Duration::days(1));
        young.interval_days = 3;
        let mut mature = Card::new("/d/sub/mature.md", "q", "a");
        mature.last_reviewed = Some(now() - Duration::days(40));
        mature.interval_days = 21;
        for c in [fresh, young, mature] {
            tree.insert_card(c).unwrap();
        }
        tree.touch(Path::new("/d/sub"), now() - Duration::days(1));

        let reviews = vec![
            review("/d/young.md", Rating::Good, 1),
            review("/d/sub/mature.md", Rating::Hard, 2),
            review("/d/sub/mature.md", Rating::Again, 3),
            review("/d/sub/mature.md", Rating::Easy, 45),
        ];

        let s = deck_stats(&tree, &root, &reviews, now()).unwrap();
        assert_eq!(s.total_cards, 3);
        assert_eq!(s.direct_cards, 2);
        assert_eq!(s.sub_decks, 1);
        assert_eq!(s.due_cards, 2);
        assert_eq!(s.new_cards, 1);
        assert_eq!(s.young_cards, 1);
        assert_eq!(s.mature_cards, 1);
        assert_eq!(s.reviews_30d, 3);
        assert_eq!(s.success_rate_30d, 66);
        assert_eq!(s.retention_rate_30d, 33);
        assert_eq!(s.average_interval_days, 12.0);
        assert_eq!(s.last_studied_at, Some(now() - Duration::days(1)));
        assert_eq!(s.streak_days, 3);

        let sub = deck_stats(&tree, Path::new("/d/sub"), &reviews, now()).unwrap();
        assert_eq!(sub.total_cards, 1);
        assert_eq!(sub.reviews_30d, 2);
        assert_eq!(sub.rating_distribution_30d[&1], 1);
        assert_eq!(sub.rating_distribution_30d[&3], 1);

        assert!(deck_stats(&tree, Path::new("/nope"), &reviews, now()).is_none());
    }

    #[test]
    fn forecast_buckets_by_day() {
        let fresh = Card::new("/d/a.md", "q", "a");
        let mut tomorrow = Card::new("/d/b.md", "q", "a");
        tomorrow.last_reviewed = Some(now());
        tomorrow.interval_days = 1;
        let mut far = Card::new("/d/c.md", "q", "a");
        far.last_reviewed = Some(now());
        far.interval_days = 30;

        let f = forecast(&[&fresh, &tomorrow, &far], now(), 7);
        assert_eq!(f.len(), 7);
        assert_eq!(f[0], (now().date_naive(), 1));
        assert_eq!(f[1].1, 1);
        assert_eq!(f.iter().map(|(_, n)| n).sum::<usize>(), 2);
    }
}

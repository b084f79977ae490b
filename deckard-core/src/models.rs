use crate::CoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A card is identified by the absolute path of its backing file.
pub type CardId = PathBuf;
/// A deck is identified by the absolute path of its directory.
pub type DeckId = PathBuf;

pub const EASE_MIN: f64 = 1.3;
pub const EASE_MAX: f64 = 4.0;
pub const EASE_DEFAULT: f64 = 2.5;
pub const EASE_STEP: f64 = 0.15;
pub const MAX_INTERVAL: u32 = 365;
pub const EASY_BONUS: f64 = 1.3;

/// Quality of recall entered after the answer is revealed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rating {
    Again = 0,
    Blackout = 1,
    Wrong = 2,
    Hard = 3,
    Good = 4,
    Easy = 5,
}

impl Rating {
    pub const ALL: [Rating; 6] = [
        Rating::Again,
        Rating::Blackout,
        Rating::Wrong,
        Rating::Hard,
        Rating::Good,
        Rating::Easy,
    ];

    pub fn from_score(score: u8) -> Result<Self, CoreError> {
        Self::ALL
            .get(score as usize)
            .copied()
            .ok_or_else(|| CoreError::invariant(format!("rating must be 0-5, got {score}")))
    }

    pub fn as_score(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Again | Rating::Blackout => "blackout",
            Rating::Wrong => "wrong",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    /// Ratings of 3 and above count as a successful recall.
    pub fn is_success(&self) -> bool {
        self.as_score() >= 3
    }

    pub fn is_retained(&self) -> bool {
        self.as_score() >= 4
    }
}

impl TryFrom<u8> for Rating {
    type Error = CoreError;

    fn try_from(score: u8) -> Result<Self, Self::Error> {
        Rating::from_score(score)
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> u8 {
        r.as_score()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    New,
    Due,
    Future,
}

#[derive(Clone, Debug, Serialize)]
pub struct Card {
    pub path: CardId,
    pub title: String,
    pub question: String,
    pub answer: String,
    pub tags: Vec<String>,

    pub created_at: Option<DateTime<Utc>>,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub interval_days: u32,
    pub ease: f64,
    pub last_rating: Option<Rating>,

    /// Front-matter keys this program does not interpret, kept for rewrites.
    #[serde(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Modification time of the backing file when it was last read or written.
    #[serde(skip)]
    pub modified: Option<SystemTime>,
}

impl Card {
    pub fn new(path: impl Into<PathBuf>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            title: title_from_path(&path),
            path,
            question: question.into(),
            answer: answer.into(),
            tags: Vec::new(),
            created_at: None,
            last_reviewed: None,
            interval_days: 0,
            ease: crate::EASE_DEFAULT,
            last_rating: None,
            extra: BTreeMap::new(),
            modified: None,
        }
    }

    /// Directory of the deck that owns this card.
    pub fn deck_path(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_new(&self) -> bool {
        self.last_reviewed.is_none()
    }

    pub fn next_review(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_reviewed {
            Some(at) => at + Duration::days(self.interval_days as i64),
            None => now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        crate::scheduler::is_due(self, now)
    }

    pub fn due_status(&self, now: DateTime<Utc>) -> DueStatus {
        if self.is_new() {
            DueStatus::New
        } else if self.is_due(now) {
            DueStatus::Due
        } else {
            DueStatus::Future
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim()))
    }

    /// Adds tags not already present, keeping first-seen order.
    pub fn merge_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for t in tags {
            let t = t.into();
            let t = t.trim();
            if !t.is_empty() && !self.has_tag(t) {
                self.tags.push(t.to_string());
            }
        }
    }
}

/// The filename stem, used when a card carries no explicit title.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One entry of the review history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub card: CardId,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    pub interval_days: u32,
    pub ease: f64,
}

impl Review {
    pub fn new(card: impl Into<CardId>, rating: Rating, reviewed_at: DateTime<Utc>, interval_days: u32, ease: f64) -> Self {
        Self {
            card: card.into(),
            rating,
            reviewed_at,
            interval_days,
            ease,
        }
    }
}

//! Review session over a frozen snapshot of due cards.
//!
//! The session holds card paths only and resolves them through the
//! repository on demand, so renames and moves elsewhere never leave it
//! holding a dangling card.

use crate::repo::Repository;
use crate::{Card, CardId, CoreError, DeckId, Rating};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    ShowingQuestion,
    ShowingAnswer,
    Finished,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub total: usize,
    pub rated: usize,
    pub skipped: usize,
    pub remaining: usize,
    pub ratings: [u32; 6],
    pub aborted: bool,
}

impl SessionSummary {
    pub fn correct(&self) -> u32 {
        self.ratings[3..].iter().sum()
    }
}

#[derive(Debug)]
pub struct ReviewSession {
    deck: DeckId,
    snapshot: Vec<CardId>,
    studied: Vec<bool>,
    current: usize,
    state: SessionState,
    aborted: bool,
    skipped: usize,
    ratings: [u32; 6],
    started_at: DateTime<Utc>,
}

impl ReviewSession {
    /// Starts a session over every card currently due under `deck`.
    pub fn new<R: Repository + ?Sized>(repo: &R, deck: &Path) -> Result<Self, CoreError> {
        Self::with_limit(repo, deck, usize::MAX)
    }

    /// Like [`ReviewSession::new`] but keeps at most `max` cards.
    pub fn with_limit<R: Repository + ?Sized>(repo: &R, deck: &Path, max: usize) -> Result<Self, CoreError> {
        let snapshot: Vec<CardId> = repo
            .due_cards(deck)?
            .into_iter()
            .take(max)
            .map(|c| c.path.clone())
            .collect();
        let state = if snapshot.is_empty() {
            SessionState::Finished
        } else {
            SessionState::ShowingQuestion
        };
        info!("review session for {} with {} due card(s)", deck.display(), snapshot.len());
        Ok(Self {
            deck: deck.to_path_buf(),
            studied: vec![false; snapshot.len()],
            snapshot,
            current: 0,
            state,
            aborted: false,
            skipped: 0,
            ratings: [0; 6],
            started_at: repo.now(),
        })
    }

    pub fn deck(&self) -> &Path {
        &self.deck
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Identity of the card on screen, or `None` once finished.
    pub fn current_id(&self) -> Option<&Path> {
        if self.is_finished() {
            None
        } else {
            self.snapshot.get(self.current).map(|p| p.as_path())
        }
    }

    pub fn current_card<'r, R: Repository + ?Sized>(&self, repo: &'r R) -> Result<&'r Card, CoreError> {
        let id = self
            .current_id()
            .ok_or_else(|| CoreError::invariant("session is finished"))?;
        repo.card(id)
    }

    /// One-based position of the current card in the snapshot.
    pub fn position(&self) -> usize {
        self.current + 1
    }

    pub fn remaining(&self) -> usize {
        self.studied.iter().filter(|s| !**s).count()
    }

    pub fn reveal(&mut self) -> Result<(), CoreError> {
        match self.state {
            SessionState::ShowingQuestion | SessionState::ShowingAnswer => {
                self.state = SessionState::ShowingAnswer;
                Ok(())
            }
            SessionState::Finished => Err(CoreError::invariant("session is finished")),
        }
    }

    /// Persists `rating` for the current card and moves on. On error the
    /// card stays unstudied and the state is left untouched.
    pub fn rate<R: Repository + ?Sized>(&mut self, repo: &mut R, rating: Rating) -> Result<Card, CoreError> {
        if self.state != SessionState::ShowingAnswer {
            return Err(CoreError::invariant("rate is only valid while the answer is shown"));
        }
        let id = self.snapshot[self.current].clone();
        let card = repo.rate(&id, rating)?;
        debug!("rated {} as {}", id.display(), rating.as_score());

        self.studied[self.current] = true;
        self.ratings[rating.as_score() as usize] += 1;
        self.advance();
        Ok(card)
    }

    pub fn skip(&mut self) -> Result<(), CoreError> {
        if self.state != SessionState::ShowingQuestion {
            return Err(CoreError::invariant("skip is only valid while the question is shown"));
        }
        self.skipped += 1;
        self.advance();
        Ok(())
    }

    /// Ends the session without touching any more cards.
    pub fn abort(&mut self) {
        if !self.is_finished() {
            info!("review session for {} aborted", self.deck.display());
            self.aborted = true;
            self.state = SessionState::Finished;
        }
    }

    // Next unstudied card after the current one, wrapping around.
    fn advance(&mut self) {
        let n = self.snapshot.len();
        let next = (1..=n)
            .map(|step| (self.current + step) % n)
            .find(|&i| !self.studied[i]);
        match next {
            Some(i) => {
                self.current = i;
                self.state = SessionState::ShowingQuestion;
            }
            None => {
                info!("review session for {} finished", self.deck.display());
                self.state = SessionState::Finished;
            }
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            total: self.snapshot.len(),
            rated: self.studied.iter().filter(|s| **s).count(),
            skipped: self.skipped,
            remaining: self.remaining(),
            ratings: self.ratings,
            aborted: self.aborted,
        }
    }
}

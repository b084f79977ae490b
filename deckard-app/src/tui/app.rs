use crate::tui::{
    inputs::{map_event, Action},
    views::{self, DeckRow, RightPane, Status},
};
use crossterm::{
    event::{self},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use deckard_core::{DeckId, Rating, Repository, ReviewSession, SessionState, SessionSummary};
use deckard_fs::FsStore;
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{stdout, Stdout};
use std::path::Path;

pub struct TuiApp {
    store: FsStore,
    max_cards: Option<usize>,
    decks: Vec<DeckId>,
    sel: usize,
    session: Option<ReviewSession>,
    summary: Option<SessionSummary>,
    status: Option<(String, bool)>,
}

impl TuiApp {
    pub fn new(store: FsStore, max_cards: Option<usize>) -> Self {
        let mut app = Self {
            store,
            max_cards,
            decks: vec![],
            sel: 0,
            session: None,
            summary: None,
            status: None,
        };
        app.load_decks();
        app
    }

    fn load_decks(&mut self) {
        self.decks = self.store.all_decks().into_iter().map(|d| d.path.clone()).collect();
        self.sel = self.sel.min(self.decks.len().saturating_sub(1));
    }

    fn selected(&self) -> Option<&Path> {
        self.decks.get(self.sel).map(|p| p.as_path())
    }

    fn in_review(&self) -> bool {
        self.session.as_ref().map_or(false, |s| !s.is_finished())
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.status = Some((msg.into(), false));
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.status = Some((msg.into(), true));
    }

    fn start_session(&mut self) {
        let Some(deck) = self.selected().map(Path::to_path_buf) else {
            return;
        };
        let max = self.max_cards.unwrap_or(usize::MAX);
        match ReviewSession::with_limit(&self.store, &deck, max) {
            Ok(s) if s.is_empty() => self.info("No cards due in this deck."),
            Ok(s) => {
                info!("tui review of {} with {} card(s)", deck.display(), s.len());
                self.summary = None;
                self.status = None;
                self.session = Some(s);
            }
            Err(e) => self.error(e.to_string()),
        }
    }

    fn rate(&mut self, score: u8) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let result = Rating::from_score(score).and_then(|r| session.rate(&mut self.store, r));
        match result {
            Ok(card) => self.info(format!("{}: next review in {} day(s)", card.title, card.interval_days)),
            Err(e) => {
                warn!("tui rating failed: {e}");
                self.error(format!("not saved: {e}"));
            }
        }
    }

    fn finish_if_done(&mut self) {
        let done = match &self.session {
            Some(s) if s.is_finished() => s.summary(),
            _ => return,
        };
        self.session = None;
        self.summary = Some(done);
        self.load_decks();
    }

    /// Applies one user action. Returns `false` when the app should exit.
    pub fn handle(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => {
                if let Some(s) = self.session.as_mut() {
                    s.abort();
                }
                return false;
            }
            Action::Up => {
                if !self.in_review() {
                    self.sel = self.sel.saturating_sub(1);
                }
            }
            Action::Down => {
                if !self.in_review() && self.sel + 1 < self.decks.len() {
                    self.sel += 1;
                }
            }
            Action::Enter => {
                if !self.in_review() {
                    self.start_session();
                }
            }
            Action::Reveal => {
                if let Some(Err(e)) = self.session.as_mut().map(|s| s.reveal()) {
                    self.error(e.to_string());
                }
            }
            Action::Skip => {
                if let Some(Err(e)) = self.session.as_mut().map(|s| s.skip()) {
                    self.error(e.to_string());
                }
            }
            Action::Rate(n) => self.rate(n),
            Action::Abort => {
                if let Some(s) = self.session.as_mut() {
                    s.abort();
                }
            }
            Action::None => {}
        }
        self.finish_if_done();
        true
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.mainloop(&mut terminal);

        disable_raw_mode().ok();
        let mut out: Stdout = std::io::stdout();
        execute!(out, LeaveAlternateScreen).ok();
        terminal.show_cursor().ok();

        res
    }

    fn mainloop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
        loop {
            terminal.draw(|f| {
                let rows: Vec<DeckRow> = self
                    .decks
                    .iter()
                    .filter_map(|p| self.store.tree().deck(p))
                    .map(|d| DeckRow {
                        name: d.name.clone(),
                        depth: d.depth(),
                        due: self.store.due_cards(&d.path).map(|c| c.len()).unwrap_or(0),
                    })
                    .collect();

                let stats = self.selected().and_then(|p| self.store.stats(p).ok());
                let current = self
                    .session
                    .as_ref()
                    .filter(|s| !s.is_finished())
                    .and_then(|s| s.current_card(&self.store).ok().map(|c| (s, c)));
                let right = match (current, &self.summary) {
                    (Some((s, card)), _) => RightPane::Card {
                        card,
                        reveal: s.state() == SessionState::ShowingAnswer,
                        position: s.position(),
                        total: s.len(),
                    },
                    (None, Some(summary)) => RightPane::Summary(summary),
                    (None, None) => RightPane::Idle(stats.as_ref()),
                };
                let status = self.status.as_ref().map(|(msg, is_err)| {
                    if *is_err {
                        Status::Error(msg)
                    } else {
                        Status::Info(msg)
                    }
                });
                let area = f.size();
                views::draw_ui(f, area, &rows, self.sel, right, status);
            })?;

            if event::poll(std::time::Duration::from_millis(100))? {
                let action = map_event(event::read()?);
                if !self.handle(action) {
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn app(cards: usize) -> (TempDir, TuiApp) {
        let dir = TempDir::new().unwrap();
        let (mut store, _) = FsStore::open(dir.path()).unwrap();
        let root = store.root().to_path_buf();
        let deck = store.create_deck(&root, "lang").unwrap().path.clone();
        for i in 0..cards {
            store.create_card(&deck, &format!("card {i}"), "q", "a", &[]).unwrap();
        }
        (dir, TuiApp::new(store, None))
    }

    #[test]
    fn selection_is_clamped() {
        let (_dir, mut app) = app(1);
        assert_eq!(app.decks.len(), 2);
        app.handle(Action::Up);
        assert_eq!(app.sel, 0);
        app.handle(Action::Down);
        app.handle(Action::Down);
        assert_eq!(app.sel, 1);
    }

    #[test]
    fn full_session_rates_every_card() {
        let (_dir, mut app) = app(2);
        app.handle(Action::Down);
        app.handle(Action::Enter);
        assert!(app.in_review());

        app.handle(Action::Rate(4));
        assert!(app.status.as_ref().map_or(false, |(_, err)| *err));

        for _ in 0..2 {
            app.handle(Action::Reveal);
            app.handle(Action::Rate(4));
        }
        assert!(!app.in_review());
        let summary = app.summary.clone().unwrap();
        assert_eq!(summary.rated, 2);
        assert_eq!(app.store.reviews().len(), 2);
        assert!(app.store.due_cards(app.store.root()).unwrap().is_empty());
    }

    #[test]
    fn esc_stops_session_and_empty_deck_does_not_start() {
        let (_dir, mut app) = app(1);
        app.handle(Action::Down);
        app.handle(Action::Enter);
        app.handle(Action::Abort);
        assert!(!app.in_review());
        assert!(app.summary.as_ref().unwrap().aborted);

        app.handle(Action::Enter);
        app.handle(Action::Reveal);
        app.handle(Action::Rate(5));
        app.handle(Action::Enter);
        assert!(app.session.is_none());
        assert!(!app.handle(Action::Quit));
    }
}

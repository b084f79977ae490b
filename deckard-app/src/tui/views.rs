use crate::tui::theme::*;
use deckard_core::{Card, Rating, SessionSummary, Stats};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

/// One line of the deck list.
pub struct DeckRow {
    pub name: String,
    pub depth: usize,
    pub due: usize,
}

pub enum RightPane<'a> {
    Idle(Option<&'a Stats>),
    Card {
        card: &'a Card,
        reveal: bool,
        position: usize,
        total: usize,
    },
    Summary(&'a SessionSummary),
}

pub enum Status<'a> {
    Info(&'a str),
    Error(&'a str),
}

pub fn draw_ui(f: &mut Frame, area: Rect, decks: &[DeckRow], sel: usize, right: RightPane, status: Option<Status>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
        .split(area);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[0]);
    draw_decks(f, chunks[0], decks, sel);
    draw_right(f, chunks[1], right);

    if let Some(status) = status {
        let line = match status {
            Status::Info(msg) => Line::from(Span::raw(msg)),
            Status::Error(msg) => Line::from(Span::raw(msg).style(error_style())),
        };
        f.render_widget(Paragraph::new(line), rows[1]);
    }

    let foot = Paragraph::new(Line::from(vec![
        Span::raw(" ↑/k ↓/j select  "),
        Span::raw(" Enter start  "),
        Span::raw(" space reveal  "),
        Span::raw(" 0-5 rate  "),
        Span::raw(" s skip  "),
        Span::raw(" Esc stop  "),
        Span::raw(" q quit "),
    ]))
    .style(footer_style());
    f.render_widget(foot, rows[2]);
}

fn draw_decks(f: &mut Frame, area: Rect, decks: &[DeckRow], sel: usize) {
    let items: Vec<_> = decks
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let name = format!("{}{}", "  ".repeat(d.depth), d.name);
            let name = if i == sel {
                Span::raw(name).style(selected_style())
            } else {
                Span::raw(name)
            };
            let mut spans = vec![name];
            if d.due > 0 {
                spans.push(Span::raw(format!("  {}", d.due)).style(due_style()));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items).block(Block::default().title("Decks").borders(Borders::ALL));
    f.render_widget(list, area);
}

fn draw_right(f: &mut Frame, area: Rect, pane: RightPane) {
    match pane {
        RightPane::Idle(stats) => {
            let mut text = vec![Line::from("Press Enter to review the selected deck.")];
            if let Some(s) = stats {
                text.push(Line::from(""));
                text.push(Line::from(format!(
                    "{} card(s), {} due, {} new",
                    s.total_cards, s.due_cards, s.new_cards
                )));
                text.push(Line::from(format!(
                    "last 30 days: {} review(s), {}% success",
                    s.reviews_30d, s.success_rate_30d
                )));
                text.push(Line::from(format!("streak: {} day(s)", s.streak_days)).style(hint_style()));
            }
            let p = Paragraph::new(text)
                .wrap(Wrap { trim: true })
                .block(Block::default().title("Review").borders(Borders::ALL));
            f.render_widget(p, area);
        }
        RightPane::Summary(s) => {
            let verb = if s.aborted { "Session stopped" } else { "Session finished" };
            let text = vec![
                Line::from(Span::raw(verb).style(title_style())),
                Line::from(""),
                Line::from(format!("rated {} of {}, skipped {}", s.rated, s.total, s.skipped)),
                Line::from(format!("correct (3+): {}", s.correct())),
                Line::from(
                    Rating::ALL
                        .iter()
                        .map(|r| {
                            let n = s.ratings[r.as_score() as usize];
                            Span::raw(format!("{}:{}  ", r.as_score(), n)).style(rating_style(*r))
                        })
                        .collect::<Vec<_>>(),
                ),
            ];
            let p = Paragraph::new(text)
                .wrap(Wrap { trim: true })
                .block(Block::default().title("Review").borders(Borders::ALL));
            f.render_widget(p, area);
        }
        RightPane::Card {
            card,
            reveal,
            position,
            total,
        } => {
            let title = format!("Review {position}/{total}: {}", card.title);
            let mut text = vec![
                Line::from(Span::raw("Q").style(title_style())),
                Line::from(""),
            ];
            text.extend(card.question.lines().map(Line::from));
            if reveal {
                text.push(Line::from(""));
                text.push(Line::from(Span::raw("A").style(title_style())));
                text.push(Line::from(""));
                text.extend(card.answer.lines().map(Line::from));
                text.push(Line::from(""));
                text.push(Line::from("rate 0 (again) .. 5 (easy)").style(hint_style()));
            } else {
                text.push(Line::from(""));
                text.push(Line::from("space to reveal, s to skip").style(hint_style()));
            }
            let p = Paragraph::new(text)
                .wrap(Wrap { trim: false })
                .block(Block::default().title(title).borders(Borders::ALL));
            f.render_widget(p, area);
        }
    }
}

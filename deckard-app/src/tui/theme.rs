use deckard_core::Rating;
use ratatui::style::{Color, Modifier, Style};

const ACCENT: Color = Color::Cyan;
const MUTED: Color = Color::DarkGray;

pub fn title_style() -> Style { Style::default().fg(ACCENT).add_modifier(Modifier::BOLD) }
pub fn hint_style() -> Style { Style::default().fg(MUTED) }
pub fn selected_style() -> Style { Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD) }
pub fn footer_style() -> Style { Style::default().fg(Color::Gray) }
pub fn due_style() -> Style { Style::default().fg(Color::Green) }
pub fn error_style() -> Style { Style::default().fg(Color::Red) }

/// Red for a lapse, yellow for a hard recall, green otherwise.
pub fn rating_style(r: Rating) -> Style {
    let fg = match r {
        Rating::Again | Rating::Blackout | Rating::Wrong => Color::Red,
        Rating::Hard => Color::Yellow,
        Rating::Good | Rating::Easy => Color::Green,
    };
    Style::default().fg(fg)
}

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Enter,
    Reveal,
    Rate(u8),
    Skip,
    Abort,
    None,
}

pub fn map_event(ev: Event) -> Action {
    if let Event::Key(KeyEvent {
        code, modifiers, kind, ..
    }) = ev
    {
        if kind == KeyEventKind::Release {
            return Action::None;
        }
        match (code, modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Action::Quit,
            (KeyCode::Char('q'), _) => Action::Quit,
            (KeyCode::Esc, _) => Action::Abort,
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Action::Up,
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Action::Down,
            (KeyCode::Enter, _) => Action::Enter,
            (KeyCode::Char(' '), _) => Action::Reveal,
            (KeyCode::Char(c @ '0'..='5'), _) => Action::Rate(c as u8 - b'0'),
            (KeyCode::Char('s'), KeyModifiers::NONE) => Action::Skip,
            _ => Action::None,
        }
    } else {
        Action::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn digits_map_to_ratings() {
        assert_eq!(map_event(key(KeyCode::Char('0'))), Action::Rate(0));
        assert_eq!(map_event(key(KeyCode::Char('5'))), Action::Rate(5));
        assert_eq!(map_event(key(KeyCode::Char('6'))), Action::None);
    }

    #[test]
    fn esc_aborts_and_q_quits() {
        assert_eq!(map_event(key(KeyCode::Esc)), Action::Abort);
        assert_eq!(map_event(key(KeyCode::Char('q'))), Action::Quit);
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(map_event(ctrl_c), Action::Quit);
    }
}

//! Input dispatch layer for Elm Architecture (TEA) pattern.
//!
//! Maps key events to messages based on the current screen.
//! Handles the `gg` chord with a non-blocking state machine.

use super::{App, Message};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;

/// State machine for handling key chords (gg).
///
/// Instead of blocking inline, we track the pending key and check for
/// timeout in the main event loop.
#[derive(Debug, Default)]
pub struct InputState {
    /// The first key of a potential chord sequence
    pub pending: Option<KeyCode>,
    /// When the pending key was pressed (for timeout detection)
    pub pending_since: Option<Instant>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if there's a pending chord that has timed out (500ms).
    pub fn has_timed_out(&self) -> bool {
        if let Some(since) = self.pending_since {
            since.elapsed().as_millis() > 500
        } else {
            false
        }
    }

    /// Clear the pending chord state.
    pub fn clear(&mut self) {
        self.pending = None;
        self.pending_since = None;
    }

    /// Set a pending chord key.
    pub fn set_pending(&mut self, key: KeyCode) {
        self.pending = Some(key);
        self.pending_since = Some(Instant::now());
    }
}

/// Map key events to messages based on the current screen.
pub fn dispatch(app: &App, input: &mut InputState, key: KeyEvent) -> Message {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Message::Quit;
    }

    if let Some(pending) = input.pending.take() {
        input.pending_since = None;
        return handle_chord(pending, key.code);
    }

    if app.show_help() {
        dispatch_help_modal(key)
    } else if app.is_observing() {
        dispatch_observation(key)
    } else {
        dispatch_directory(input, key)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Screen-specific dispatch functions
// ─────────────────────────────────────────────────────────────────────────────

/// Handle keys on the session directory screen.
fn dispatch_directory(input: &mut InputState, key: KeyEvent) -> Message {
    match key.code {
        KeyCode::Char('q') => Message::Quit,
        KeyCode::Char('j') | KeyCode::Down => Message::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => Message::MoveUp,
        KeyCode::Char('G') | KeyCode::End => Message::GotoBottom,
        KeyCode::Home => Message::GotoTop,
        KeyCode::Char('g') => {
            input.set_pending(KeyCode::Char('g'));
            Message::None
        }
        KeyCode::Enter => Message::SelectHighlighted,
        KeyCode::Char('n') => Message::SelectNew,
        KeyCode::Char('?') => Message::ToggleHelp,
        KeyCode::Esc => Message::DismissError,
        _ => Message::None,
    }
}

/// Handle keys while observing a session.
fn dispatch_observation(key: KeyEvent) -> Message {
    match key.code {
        KeyCode::Esc | KeyCode::Char('l') => Message::Leave,
        KeyCode::Char('t') => Message::OpenTerminal,
        KeyCode::Char('a') => Message::OpenAudio,
        KeyCode::Char('?') => Message::ToggleHelp,
        KeyCode::Char('q') => Message::Quit,
        _ => Message::None,
    }
}

/// Handle keys in help modal.
fn dispatch_help_modal(key: KeyEvent) -> Message {
    match key.code {
        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => Message::CloseModal,
        _ => Message::None,
    }
}

/// Handle the second key of a chord sequence.
fn handle_chord(first: KeyCode, second: KeyCode) -> Message {
    match (first, second) {
        (KeyCode::Char('g'), KeyCode::Char('g')) => Message::GotoTop,
        _ => Message::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::empty(),
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        }
    }

    #[test]
    fn test_directory_quit() {
        let mut input = InputState::new();
        let msg = dispatch_directory(&mut input, key_event(KeyCode::Char('q')));
        assert_eq!(msg, Message::Quit);
    }

    #[test]
    fn test_directory_navigation() {
        let mut input = InputState::new();
        assert_eq!(
            dispatch_directory(&mut input, key_event(KeyCode::Char('j'))),
            Message::MoveDown
        );
        assert_eq!(
            dispatch_directory(&mut input, key_event(KeyCode::Up)),
            Message::MoveUp
        );
        assert_eq!(
            dispatch_directory(&mut input, key_event(KeyCode::Char('G'))),
            Message::GotoBottom
        );
    }

    #[test]
    fn test_directory_selection_intents() {
        let mut input = InputState::new();
        assert_eq!(
            dispatch_directory(&mut input, key_event(KeyCode::Enter)),
            Message::SelectHighlighted
        );
        assert_eq!(
            dispatch_directory(&mut input, key_event(KeyCode::Char('n'))),
            Message::SelectNew
        );
    }

    #[test]
    fn test_chord_pending_state() {
        let mut input = InputState::new();
        let msg = dispatch_directory(&mut input, key_event(KeyCode::Char('g')));
        assert_eq!(msg, Message::None);
        assert!(input.pending.is_some());
        assert_eq!(
            handle_chord(KeyCode::Char('g'), KeyCode::Char('g')),
            Message::GotoTop
        );
    }

    #[test]
    fn test_observation_keys() {
        assert_eq!(dispatch_observation(key_event(KeyCode::Esc)), Message::Leave);
        assert_eq!(
            dispatch_observation(key_event(KeyCode::Char('t'))),
            Message::OpenTerminal
        );
        assert_eq!(
            dispatch_observation(key_event(KeyCode::Char('a'))),
            Message::OpenAudio
        );
    }

    #[test]
    fn test_help_modal_closes() {
        assert_eq!(dispatch_help_modal(key_event(KeyCode::Esc)), Message::CloseModal);
        assert_eq!(dispatch_help_modal(key_event(KeyCode::Char('j'))), Message::None);
    }
}

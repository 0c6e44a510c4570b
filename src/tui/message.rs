//! Message enum for Elm Architecture (TEA) pattern.
//!
//! All user intents are represented as messages, dispatched from key events
//! and processed by `App::update()`.

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // ─────────────────────────────────────────────────────────────────────────
    // App lifecycle
    // ─────────────────────────────────────────────────────────────────────────
    /// Quit the application
    Quit,

    // ─────────────────────────────────────────────────────────────────────────
    // Directory navigation
    // ─────────────────────────────────────────────────────────────────────────
    MoveUp,
    MoveDown,
    GotoTop,
    GotoBottom,

    // ─────────────────────────────────────────────────────────────────────────
    // Selection intents
    // ─────────────────────────────────────────────────────────────────────────
    /// Observe the highlighted row (a session or "start new")
    SelectHighlighted,
    /// Observe a fresh session
    SelectNew,
    /// Leave the current observation
    Leave,

    // ─────────────────────────────────────────────────────────────────────────
    // Observation actions
    // ─────────────────────────────────────────────────────────────────────────
    /// Open the terminal endpoint in the browser
    OpenTerminal,
    /// Open the audio endpoint in the browser
    OpenAudio,

    // ─────────────────────────────────────────────────────────────────────────
    // Modals
    // ─────────────────────────────────────────────────────────────────────────
    ToggleHelp,
    CloseModal,
    DismissError,

    /// No operation (for unhandled keys or pending chords)
    None,
}

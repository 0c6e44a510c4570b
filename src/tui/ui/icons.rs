//! Nerd Font icons used throughout the UI.

// Session states
pub const STATE_IDLE: &str = "○"; // Empty circle - waiting for a visitor
pub const STATE_STARTING: &str = "◔"; // 1/4 filled
pub const STATE_RUNNING: &str = "●"; // Full circle
pub const STATE_STOPPING: &str = "◌"; // Dotted circle
pub const STATE_FAILED: &str = "⊘"; // Slashed circle

pub const KEYBOARD: &str = "󰌌"; // nf-md-keyboard
pub const ACTIVITY: &str = "󰖙"; // nf-md-flash
pub const NEW_SESSION: &str = "󰐕"; // nf-md-plus

// Directory link
pub const LINK_LIVE: &str = "󰖩"; // nf-md-wifi
pub const LINK_IDLE: &str = "󰖪"; // nf-md-wifi_off
pub const LINK_LOST: &str = "󰅚"; // nf-md-close_circle

// Observation endpoints
pub const TERMINAL: &str = "󰆍"; // nf-md-console
pub const AUDIO: &str = "󰝚"; // nf-md-music_note

pub const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

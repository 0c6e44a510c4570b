//! TUI rendering module.
//!
//! - `icons` - Nerd Font icons used throughout the UI
//! - `layout` - Layout calculations and text utilities
//! - `status` - Status configuration, status bar and help popup
//! - `directory` - Session list screen
//! - `observation` - Single session screen

mod directory;
pub mod icons;
pub mod layout;
mod observation;
mod status;

// Re-export the main draw function
pub use self::draw::draw;

mod draw {
    use super::directory::{draw_header, draw_sessions};
    use super::observation::draw_observation;
    use super::status::{draw_help_popup, draw_status_bar};
    use crate::tui::App;
    use ratatui::{
        layout::{Constraint, Direction, Layout},
        Frame,
    };

    /// Main draw function - renders the entire TUI.
    pub fn draw(f: &mut Frame, app: &App) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Main content
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        draw_header(f, app, chunks[0]);
        if app.is_observing() {
            draw_observation(f, app, chunks[1]);
        } else {
            draw_sessions(f, app, chunks[1]);
        }
        draw_status_bar(f, app, chunks[2]);

        // Overlays
        if app.show_help() {
            draw_help_popup(f);
        }
    }
}

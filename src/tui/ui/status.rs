//! Status configuration and status bar rendering.

use super::icons;
use super::layout::{fit_lines_to_area, popup_rect};
use crate::data::{LinkStatus, SessionState};
use crate::tui::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// Unified status configuration - single source of truth for icon and style.
pub struct StatusConfig {
    pub icon: &'static str,
    pub style: Style,
}

/// Trait for types that can provide their display configuration (icon + style).
pub trait StatusConfigurable {
    fn status_config(&self) -> StatusConfig;
}

impl StatusConfigurable for SessionState {
    fn status_config(&self) -> StatusConfig {
        match self {
            SessionState::Idle => StatusConfig {
                icon: icons::STATE_IDLE,
                style: Style::default().fg(Color::Cyan),
            },
            SessionState::Starting => StatusConfig {
                icon: icons::STATE_STARTING,
                style: Style::default().fg(Color::Yellow),
            },
            SessionState::Running => StatusConfig {
                icon: icons::STATE_RUNNING,
                style: Style::default().fg(Color::Green),
            },
            SessionState::Stopping => StatusConfig {
                icon: icons::STATE_STOPPING,
                style: Style::default().fg(Color::DarkGray),
            },
            SessionState::Failed => StatusConfig {
                icon: icons::STATE_FAILED,
                style: Style::default().fg(Color::Red),
            },
        }
    }
}

impl StatusConfigurable for LinkStatus {
    fn status_config(&self) -> StatusConfig {
        match self {
            LinkStatus::Idle => StatusConfig {
                icon: icons::LINK_IDLE,
                style: Style::default().fg(Color::DarkGray),
            },
            LinkStatus::Live => StatusConfig {
                icon: icons::LINK_LIVE,
                style: Style::default().fg(Color::Green),
            },
            LinkStatus::Disconnected => StatusConfig {
                icon: icons::LINK_LOST,
                style: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            },
        }
    }
}

fn generate_keyboard_shortcuts() -> Vec<&'static str> {
    vec![
        "  DIRECTORY",
        "  ─────────",
        "  j/k ↑/↓      Move selection",
        "  gg/G         First / last row",
        "  Enter        Observe highlighted session",
        "  n            Start a new playground",
        "  Esc          Dismiss error",
        "  q            Quit",
        "",
        "  OBSERVATION",
        "  ───────────",
        "  t            Open terminal in browser",
        "  a            Open audio stream in browser",
        "  Esc/l        Leave",
        "",
        "  ?            Toggle this help",
    ]
}

fn generate_status_legend() -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "  SESSION STATE".to_string(),
        "  ─────────────".to_string(),
    ];
    for state in SessionState::all() {
        let joinable = if state.is_joinable() { "joinable" } else { "" };
        lines.push(format!(
            "  {}  {:<10} {}",
            state.status_config().icon,
            state.display_name(),
            joinable
        ));
    }
    lines.push(format!("  {}  Keyboard attached", icons::KEYBOARD));
    lines.push(format!("  {}  Someone is typing", icons::ACTIVITY));
    lines
}

/// Draw the status bar at the bottom of the screen.
pub fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let width = area.width as usize;

    let status = if let Some(err) = &app.error_message {
        Span::styled(format!(" {} ", err), Style::default().fg(Color::Red))
    } else if app.is_observing() {
        let text = if width >= 60 {
            " t: terminal | a: audio | Esc/l: leave | ?: help "
        } else if width >= 30 {
            " t a Esc ? "
        } else {
            " ? help "
        };
        Span::styled(text, Style::default().fg(Color::DarkGray))
    } else {
        let text = if width >= 70 {
            " j/k: nav | Enter: observe | n: new playground | ?: help | q: quit "
        } else if width >= 40 {
            " j/k Enter:observe n:new ?:help "
        } else {
            " ? help "
        };
        Span::styled(text, Style::default().fg(Color::DarkGray))
    };

    let paragraph = Paragraph::new(Line::from(status));
    f.render_widget(paragraph, area);
}

/// Draw the help popup.
pub fn draw_help_popup(f: &mut Frame) {
    let area = popup_rect(65, 80, 40, 12, f.area());

    f.render_widget(Clear, area);

    let mut lines: Vec<Line> = generate_keyboard_shortcuts()
        .into_iter()
        .map(Line::from)
        .collect();
    lines.extend(generate_status_legend().into_iter().map(Line::from));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  Esc: Close",
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .title(" 󰋗 Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    let lines = fit_lines_to_area(lines, inner, 1);
    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(Color::White));

    f.render_widget(paragraph, area);
}

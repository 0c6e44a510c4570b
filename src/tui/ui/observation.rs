//! Observation screen: progress, endpoints and banners for one session.

use super::icons;
use crate::observation::{CloseReason, ObservationController, ObservationState};
use crate::tui::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

fn title(observation: &ObservationController) -> String {
    match observation.session_id() {
        Some("new") | None => " New playground ".to_string(),
        Some(id) => format!(" Playground {} ", id),
    }
}

pub fn draw_observation(f: &mut Frame, app: &App, area: Rect) {
    let Some(observation) = app.observation() else {
        return;
    };

    let label = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();

    match observation.state() {
        None | Some(ObservationState::Connecting) => {
            lines.push(Line::from(vec![
                Span::styled(format!("{} ", app.spinner()), Style::default().fg(Color::Cyan)),
                Span::raw("Connecting to the playground..."),
            ]));
        }
        Some(ObservationState::Connected {
            terminal_endpoint,
            audio_endpoint,
            keyboard_lost,
        }) => {
            if *keyboard_lost {
                lines.push(Line::from(Span::styled(
                    " The keyboard is lost. You can still watch. ",
                    Style::default()
                        .fg(Color::White)
                        .bg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(""));
            }
            lines.push(Line::from(vec![
                Span::styled(format!("{} Terminal  ", icons::TERMINAL), label),
                Span::styled(
                    terminal_endpoint.to_string(),
                    Style::default().fg(Color::Green),
                ),
            ]));
            lines.push(Line::from(vec![
                Span::styled(format!("{} Audio     ", icons::AUDIO), label),
                Span::styled(
                    audio_endpoint.to_string(),
                    Style::default().fg(Color::Green),
                ),
            ]));
        }
        Some(ObservationState::Closed) => {
            let text = match observation.close_reason() {
                Some(CloseReason::ChannelLost {
                    reason: Some(reason),
                }) => format!(" Disconnected: {} ", reason),
                Some(CloseReason::ChannelLost { reason: None }) => " Disconnected ".to_string(),
                _ => " Observation ended ".to_string(),
            };
            lines.push(Line::from(Span::styled(
                text,
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Red)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled("Press Esc to go back", label)));
        }
    }

    if let Some(status) = observation.last_status() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Server status: ", label),
            Span::raw(status.to_string()),
        ]));
    }

    let block = Block::default()
        .title(title(observation))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

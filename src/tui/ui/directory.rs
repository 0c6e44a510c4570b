//! Session directory screen: header and the session list.

use super::icons;
use super::layout::truncate_with_ellipsis;
use super::status::StatusConfigurable;
use crate::data::SessionRecord;
use crate::tui::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

pub fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let link = app.link().status_config();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(link.style);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let active = app.sessions.iter().filter(|s| s.activity_pulse).count();
    let count = match app.sessions.len() {
        1 => "There is currently 1 active playground".to_string(),
        n => format!("There are currently {} active playgrounds", n),
    };

    let mut spans = vec![
        Span::styled(format!("{} ", link.icon), link.style),
        Span::styled(
            "Tidewatch",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {} ", app.config.server.url),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!(" {} ({} typing) ", count, active),
            Style::default().fg(Color::Cyan),
        ),
    ];
    if let Some(at) = app.last_update {
        spans.push(Span::styled(
            format!(" updated {}", at.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn session_line(record: &SessionRecord, width: usize) -> Line<'static> {
    let state = record.state.status_config();
    let dim = !record.is_joinable();

    let id_style = if record.activity_pulse {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else if dim {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    };

    let id = truncate_with_ellipsis(record.id.as_str(), width.saturating_sub(24).max(4));
    let mut spans = vec![
        Span::styled(format!(" {} ", state.icon), state.style),
        Span::styled(id, id_style),
        Span::styled(format!("  {}", record.state.display_name()), state.style),
    ];
    if record.kb {
        spans.push(Span::styled(
            format!("  {}", icons::KEYBOARD),
            Style::default().fg(Color::Magenta),
        ));
    }
    if record.activity_pulse {
        spans.push(Span::styled(
            format!(" {}", icons::ACTIVITY),
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

pub fn draw_sessions(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Playgrounds ")
        .borders(Borders::ALL);
    let inner = block.inner(area);
    let width = inner.width as usize;

    let mut items: Vec<ListItem> = app
        .sessions
        .iter()
        .map(|record| ListItem::new(session_line(record, width)))
        .collect();

    let new_row = Line::from(vec![
        Span::styled(
            format!(" {} ", icons::NEW_SESSION),
            Style::default().fg(Color::Green),
        ),
        Span::styled("Start a new playground", Style::default().fg(Color::Green)),
    ]);
    if app.sessions.is_empty() {
        items.push(ListItem::new(vec![
            new_row,
            Line::from(Span::styled(
                "   You're the first one here",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )),
        ]));
    } else {
        items.push(ListItem::new(new_row));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Rgb(40, 40, 60)))
        .highlight_symbol("▌");

    let mut state = ListState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}

mod app;
mod input;
mod message;
mod ui;

use crate::channel::WsConnector;
use crate::config::Config;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub use app::{App, Background, ModalState};
pub use input::{dispatch, InputState};
pub use message::Message;

pub async fn run(config: Config) -> Result<()> {
    // Check if stdout is a terminal
    if !std::io::IsTerminal::is_terminal(&io::stdout()) {
        anyhow::bail!("tidewatch requires an interactive terminal");
    }

    let connector = WsConnector::new(config.server.base_url()?);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config);
    app.start(&connector).await;

    let result = run_app(&mut terminal, &mut app, &connector).await;

    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    connector: &WsConnector,
) -> Result<()> {
    let mut ticker = tokio::time::interval(app.config.ui.tick_rate());
    let mut input_state = InputState::new();

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut events = spawn_event_reader(shutdown.clone());

    let result = loop {
        if let Err(e) = terminal.draw(|f| ui::draw(f, app)) {
            break Err(e.into());
        }

        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break Err(anyhow::anyhow!("terminal input closed"));
                };
                match event {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        let msg = dispatch(app, &mut input_state, key);
                        match app.update(msg, connector).await {
                            Ok(true) => break Ok(()), // Quit requested
                            Ok(false) => {}
                            Err(e) => break Err(e),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => break Err(e.into()),
                }
            }
            background = app.next_background() => {
                app.on_background(background);
            }
            _ = ticker.tick() => {
                app.on_tick();
            }
        }

        // Handle pending chord timeout (non-blocking)
        if input_state.has_timed_out() {
            input_state.clear();
        }
    };

    shutdown.store(true, Ordering::Relaxed);
    result
}

/// Read terminal events on a blocking thread and forward them.
///
/// Polls with a short timeout so the thread notices `shutdown`.
fn spawn_event_reader(shutdown: Arc<AtomicBool>) -> mpsc::Receiver<io::Result<Event>> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::spawn(move || loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let next = match event::poll(Duration::from_millis(100)) {
            Ok(false) => continue,
            Ok(true) => event::read(),
            Err(e) => Err(e),
        };
        let failed = next.is_err();
        if tx.blocking_send(next).is_err() || failed {
            break;
        }
    });
    rx
}

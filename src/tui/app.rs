use super::message::Message;
use crate::channel::{Connector, Delivery};
use crate::config::Config;
use crate::data::{LinkStatus, SessionId, SessionRecord, Selection};
use crate::directory::LiveDirectory;
use crate::observation::{ObservationController, ObservationState};
use crate::timer::TimerExpiry;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalState {
    #[default]
    None,
    Help,
}

/// Something that happened off the keyboard: a channel delivery or an
/// activity timer firing.
#[derive(Debug)]
pub enum Background {
    Directory(Delivery),
    Expiry(TimerExpiry),
    Observation(Delivery),
}

pub struct App {
    pub config: Config,
    directory: LiveDirectory,
    expiries: mpsc::UnboundedReceiver<TimerExpiry>,
    observation: Option<ObservationController>,
    /// Last directory snapshot, in server order
    pub sessions: Vec<SessionRecord>,
    /// Highlighted row; `sessions.len()` is the "start new" row
    pub selected: usize,
    pub modal: ModalState,
    pub error_message: Option<String>,
    pub spinner_frame: usize,
    pub last_update: Option<DateTime<Local>>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let (directory, expiries) = LiveDirectory::with_tokio_timers(config.activity.pulse_delay());
        Self {
            config,
            directory,
            expiries,
            observation: None,
            sessions: Vec::new(),
            selected: 0,
            modal: ModalState::None,
            error_message: None,
            spinner_frame: 0,
            last_update: None,
        }
    }

    /// Open the directory channel. Failure is shown, not fatal.
    pub async fn start<C: Connector>(&mut self, connector: &C) {
        if let Err(e) = self.directory.start(connector).await {
            tracing::error!("Could not open session directory: {}", e);
            self.error_message = Some(format!("Could not reach server: {}", e));
        }
    }

    /// Close every channel and cancel pending timers.
    pub fn shutdown(&mut self) {
        if let Some(observation) = self.observation.as_mut() {
            observation.disconnect();
        }
        self.directory.stop();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read access for the view
    // ─────────────────────────────────────────────────────────────────────────

    pub fn show_help(&self) -> bool {
        self.modal == ModalState::Help
    }

    pub fn is_observing(&self) -> bool {
        self.observation.is_some()
    }

    pub fn observation(&self) -> Option<&ObservationController> {
        self.observation.as_ref()
    }

    pub fn observation_state(&self) -> Option<&ObservationState> {
        self.observation.as_ref().and_then(ObservationController::state)
    }

    pub fn link(&self) -> LinkStatus {
        self.directory.link()
    }

    /// Number of selectable rows, including "start new".
    pub fn row_count(&self) -> usize {
        self.sessions.len() + 1
    }

    pub fn is_new_row_selected(&self) -> bool {
        self.selected >= self.sessions.len()
    }

    pub fn selected_session(&self) -> Option<&SessionRecord> {
        self.sessions.get(self.selected)
    }

    /// Browser address of the terminal (or audio) endpoint, once connected.
    pub fn endpoint_url(&self, terminal: bool) -> Result<Option<Url>> {
        let Some(ObservationState::Connected {
            terminal_endpoint,
            audio_endpoint,
            ..
        }) = self.observation_state()
        else {
            return Ok(None);
        };
        let endpoint = if terminal {
            terminal_endpoint
        } else {
            audio_endpoint
        };
        let server = self.config.server.base_url()?;
        let url = endpoint
            .resolve(&server)
            .with_context(|| format!("Bad endpoint {}", endpoint))?;
        Ok(Some(url))
    }

    pub fn spinner(&self) -> &'static str {
        super::ui::icons::SPINNER[self.spinner_frame % super::ui::icons::SPINNER.len()]
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background events
    // ─────────────────────────────────────────────────────────────────────────

    /// Wait for the next delivery or timer expiry.
    ///
    /// Never resolves while nothing is connected and no timer is pending.
    pub async fn next_background(&mut self) -> Background {
        tokio::select! {
            delivery = self.directory.next_delivery() => Background::Directory(delivery),
            Some(expiry) = self.expiries.recv() => Background::Expiry(expiry),
            delivery = next_observation_delivery(&mut self.observation) => {
                Background::Observation(delivery)
            }
        }
    }

    /// Apply a background event. Returns true if anything visible changed.
    pub fn on_background(&mut self, event: Background) -> bool {
        match event {
            Background::Directory(delivery) => {
                let lost = matches!(delivery, Delivery::Closed { .. });
                let changed = self.directory.on_delivery(delivery);
                if lost {
                    self.error_message = Some("Lost connection to the session directory".into());
                }
                if changed {
                    self.refresh_sessions();
                }
                changed
            }
            Background::Expiry(expiry) => {
                let changed = self.directory.on_timer_expired(expiry);
                if changed {
                    self.refresh_sessions();
                }
                changed
            }
            Background::Observation(delivery) => match self.observation.as_mut() {
                Some(observation) => observation.on_delivery(delivery),
                None => false,
            },
        }
    }

    /// Re-read the directory snapshot, keeping the highlight on the same session.
    fn refresh_sessions(&mut self) {
        let previous = if self.is_new_row_selected() {
            None
        } else {
            self.selected_session().map(|s| s.id.clone())
        };

        self.sessions = self.directory.snapshot();
        self.last_update = Some(Local::now());

        self.selected = match previous {
            Some(id) => self
                .sessions
                .iter()
                .position(|s| s.id == id)
                .unwrap_or_else(|| self.selected.min(self.sessions.len())),
            None => self.sessions.len(),
        };
    }

    pub fn on_tick(&mut self) {
        if matches!(self.observation_state(), Some(ObservationState::Connecting)) {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Selection intents
    // ─────────────────────────────────────────────────────────────────────────

    /// Observe a listed session by id. Only idle or running sessions qualify.
    pub async fn select<C: Connector>(&mut self, connector: &C, id: &SessionId) {
        let Some(record) = self.directory.get(id).cloned() else {
            self.error_message = Some(format!("Session {} is no longer listed", id));
            return;
        };
        if !record.is_joinable() {
            self.error_message = Some(format!(
                "Session {} is {}; pick an idle or running one",
                id,
                record.state.display_name()
            ));
            return;
        }
        self.observe(connector, Selection::Existing(record)).await;
    }

    /// Observe a freshly started session.
    pub async fn select_new<C: Connector>(&mut self, connector: &C) {
        self.observe(connector, Selection::New).await;
    }

    /// Stop observing and return to the directory.
    pub fn leave(&mut self) {
        if let Some(mut observation) = self.observation.take() {
            observation.disconnect();
        }
        self.spinner_frame = 0;
    }

    async fn observe<C: Connector>(&mut self, connector: &C, selection: Selection) {
        self.leave();
        let mut observation = ObservationController::new();
        match observation.connect(connector, selection).await {
            Ok(()) => {
                self.error_message = None;
                self.observation = Some(observation);
            }
            Err(e) => {
                tracing::error!("Could not start observation: {}", e);
                self.error_message = Some(format!("Could not observe: {}", e));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Update
    // ─────────────────────────────────────────────────────────────────────────

    /// Process a message. Returns true if the app should quit.
    pub async fn update<C: Connector>(&mut self, msg: Message, connector: &C) -> Result<bool> {
        match msg {
            Message::Quit => return Ok(true),

            Message::MoveUp => {
                self.selected = self.selected.saturating_sub(1);
            }
            Message::MoveDown => {
                if self.selected + 1 < self.row_count() {
                    self.selected += 1;
                }
            }
            Message::GotoTop => self.selected = 0,
            Message::GotoBottom => self.selected = self.row_count() - 1,

            Message::SelectHighlighted => {
                if let Some(id) = self.selected_session().map(|s| s.id.clone()) {
                    self.select(connector, &id).await;
                } else {
                    self.select_new(connector).await;
                }
            }
            Message::SelectNew => self.select_new(connector).await,
            Message::Leave => self.leave(),

            Message::OpenTerminal | Message::OpenAudio => {
                match self.endpoint_url(msg == Message::OpenTerminal) {
                    Ok(Some(url)) => {
                        tracing::info!("Opening {}", url);
                        if let Err(e) = open_url(url.as_str()) {
                            self.error_message = Some(format!("Could not open {}: {}", url, e));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => self.error_message = Some(format!("{:#}", e)),
                }
            }

            Message::ToggleHelp => {
                self.modal = match self.modal {
                    ModalState::Help => ModalState::None,
                    ModalState::None => ModalState::Help,
                };
            }
            Message::CloseModal => self.modal = ModalState::None,
            Message::DismissError => self.error_message = None,

            Message::None => {}
        }
        Ok(false)
    }
}

async fn next_observation_delivery(observation: &mut Option<ObservationController>) -> Delivery {
    match observation {
        Some(observation) => observation.next_delivery().await,
        None => std::future::pending().await,
    }
}

fn open_url(url: &str) -> Result<()> {
    // Use xdg-open on Linux, which works in WSL
    std::process::Command::new("xdg-open")
        .arg(url)
        .spawn()
        .or_else(|_| {
            // Fallback to wslview for WSL
            std::process::Command::new("wslview").arg(url).spawn()
        })?;
    Ok(())
}

//! Print the decoded event feed of a playground server, one line per event.
//!
//! Without `--observe` this follows the session directory; with it, a single
//! observation channel.

use anyhow::Result;
use clap::Parser;
use tidewatch::channel::{Delivery, WsConnector};
use tidewatch::config;
use tidewatch::data::{SessionRecord, SessionState, Selection};
use tidewatch::directory::LiveDirectory;
use tidewatch::observation::ObservationController;
use tidewatch::protocol::{DirectoryEvent, ObservationEvent};

#[derive(Parser, Debug)]
#[command(name = "tidewatch-feed")]
#[command(about = "Print decoded playground events")]
struct Args {
    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,

    /// Server url, overriding the config file (ws:// or wss://)
    #[arg(long, short)]
    server: Option<String>,

    /// Observe one session id (or `new`) instead of the directory
    #[arg(long)]
    observe: Option<String>,

    /// Treat the observed session as having a keyboard attached
    #[arg(long, requires = "observe")]
    kb: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tidewatch=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::load(args.config.as_deref())?;
    if let Some(server) = args.server {
        config.server.url = server;
    }
    let connector = WsConnector::new(config.server.base_url()?);

    match args.observe {
        Some(id) => observe(&connector, selection_for(&id, args.kb)).await,
        None => follow_directory(&connector, &config).await,
    }
}

fn print_snapshot(directory: &LiveDirectory) {
    let rows: Vec<String> = directory
        .snapshot()
        .iter()
        .map(|s| {
            format!(
                "{}:{}{}{}",
                s.id,
                s.state,
                if s.kb { ":kb" } else { "" },
                if s.activity_pulse { "*" } else { "" }
            )
        })
        .collect();
    println!("snapshot [{}]", rows.join(", "));
}

async fn follow_directory(connector: &WsConnector, config: &config::Config) -> Result<()> {
    let (mut directory, mut expiries) =
        LiveDirectory::with_tokio_timers(config.activity.pulse_delay());
    directory.start(connector).await?;

    loop {
        tokio::select! {
            delivery = directory.next_delivery() => match delivery {
                Delivery::Message(payload) => {
                    let event = DirectoryEvent::decode(&payload);
                    println!("event {:?}", event);
                    if directory.on_event(event) {
                        print_snapshot(&directory);
                    }
                }
                closed @ Delivery::Closed { .. } => {
                    println!("{:?}", closed);
                    directory.on_delivery(closed);
                    break;
                }
            },
            Some(expiry) = expiries.recv() => {
                if directory.on_timer_expired(expiry) {
                    print_snapshot(&directory);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                directory.stop();
                break;
            }
        }
    }
    Ok(())
}

/// `new` starts a fresh session; anything else names a listed one.
fn selection_for(id: &str, kb: bool) -> Selection {
    if id == "new" {
        Selection::New
    } else {
        Selection::Existing(SessionRecord::new(id, SessionState::Running).with_keyboard(kb))
    }
}

async fn observe(connector: &WsConnector, selection: Selection) -> Result<()> {
    let mut observation = ObservationController::new();
    observation.connect(connector, selection).await?;

    loop {
        tokio::select! {
            delivery = observation.next_delivery() => {
                match &delivery {
                    Delivery::Message(payload) => {
                        println!("event {:?}", ObservationEvent::decode(payload));
                    }
                    closed => println!("{:?}", closed),
                }
                if observation.on_delivery(delivery) {
                    println!("state {:?}", observation.state());
                }
                if observation.is_closed() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                observation.disconnect();
                break;
            }
        }
    }

    if let Some(reason) = observation.close_reason() {
        println!("closed {:?}", reason);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kb_flag_reaches_selection() {
        let args = Args::parse_from(["tidewatch-feed", "--observe", "12", "--kb"]);
        let selection = selection_for(args.observe.as_deref().unwrap(), args.kb);
        assert!(selection.had_keyboard());
        assert_eq!(selection.path_id(), "12");
    }

    #[test]
    fn test_kb_defaults_off() {
        let args = Args::parse_from(["tidewatch-feed", "--observe", "12"]);
        let selection = selection_for(args.observe.as_deref().unwrap(), args.kb);
        assert!(matches!(selection, Selection::Existing(_)));
        assert!(!selection.had_keyboard());
    }

    #[test]
    fn test_new_ignores_kb() {
        assert!(matches!(selection_for("new", true), Selection::New));
    }
}

//! Rendezvous tracker for Six Card Golf: players register, query the roster
//! and start or end numbered games over a line-oriented TCP protocol.

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod listener;
pub mod registry;
pub mod sessions;
pub mod tracker;


use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub use config::Config;
pub use error::{RegistryError, SessionError, TrackerError};
pub use events::{EndReason, GameEvent};
pub use listener::TrackerServer;
pub use tracker::{StartedGame, Tracker};

/// `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Bind and serve until Ctrl-C. Game events are logged as JSON in place of a
/// presentation layer.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<GameEvent>();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!("[GAME] {}", json),
                Err(e) => warn!("[GAME] unserializable event {:?}: {}", event, e),
            }
        }
    });

    let tracker = Tracker::new(&config).with_events(events_tx);
    let server = TrackerServer::bind(config, tracker).await?;

    tokio::select! {
        _ = server.run() => {}
        res = tokio::signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            info!("[SHUTDOWN] interrupted, closing listener");
        }
    }
    Ok(())
}

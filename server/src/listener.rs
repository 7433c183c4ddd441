use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::connection::handle_connection;
use crate::error::{Result, TrackerError};
use crate::tracker::Tracker;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bound listening socket plus the one `Tracker` every connection shares.
pub struct TrackerServer {
    listener: TcpListener,
    tracker: Tracker,
    config: Arc<Config>,
}

impl TrackerServer {
    pub async fn bind(config: Config, tracker: Tracker) -> Result<Self> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TrackerError::Bind { addr: addr.clone(), source })?;
        info!("[LISTEN] tracker listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            tracker,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept forever, one task per connection.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        self.tracker.clone(),
                        self.config.clone(),
                    ));
                }
                Err(e) => {
                    warn!("[ACCEPT] {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

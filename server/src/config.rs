use clap::Args;
use std::time::Duration;

/// Tracker settings. Every flag has an environment fallback.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "TRACKER_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 27000)]
    pub port: u16,
    /// Host written into roster lines for players registered without an endpoint
    #[arg(long, env = "TRACKER_ADVERTISE_HOST", default_value = "127.0.0.1")]
    pub advertise_host: String,
    /// Peer port given to a colocated dealer; other colocated players get the next one
    #[arg(long, default_value_t = 5000)]
    pub peer_base_port: u16,
    /// Longest accepted request line in bytes
    #[arg(long, default_value_t = 4096)]
    pub max_line_len: usize,
    /// Drop a connection after this many idle seconds (0 = never)
    #[arg(long, env = "TRACKER_IDLE_TIMEOUT", default_value_t = 0)]
    pub idle_timeout_secs: u64,
    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 27000,
            advertise_host: "127.0.0.1".into(),
            peer_base_port: 5000,
            max_line_len: 4096,
            idle_timeout_secs: 0,
            log_level: "info".into(),
        }
    }
}

impl Config {
    /// Loopback on an OS-assigned port.
    pub fn ephemeral() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ..Self::default()
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Registry failures. The messages are the wire failure texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate player.")]
    Duplicate,
    #[error("Player not found.")]
    NotFound,
    #[error("Player in ongoing game.")]
    Busy,
}

/// Session failures. Nothing is mutated when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Not enough free players.")]
    NotEnoughFree,
    #[error("Invalid game or dealer.")]
    InvalidSessionOrDealer,
    #[error("Dealer not registered.")]
    UnknownDealer,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connection i/o: {0}")]
    Io(#[from] io::Error),
    #[error("request line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("no request within {0:?}")]
    IdleTimeout(Duration),
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;

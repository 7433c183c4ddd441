use golf_protocol::{GameId, RosterEntry};
use serde::Serialize;

/// Signals for whatever presents the game. The tracker only emits these; it
/// never drives a presentation layer itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Started {
        game_id: GameId,
        dealer: String,
        holes: u32,
        roster: Vec<RosterEntry>,
    },
    Ended {
        game_id: GameId,
        dealer: String,
        reason: EndReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Requested,
    DealerDisconnected,
    ParticipantDisconnected,
}

impl GameEvent {
    pub fn game_id(&self) -> GameId {
        match self {
            GameEvent::Started { game_id, .. } | GameEvent::Ended { game_id, .. } => *game_id,
        }
    }
}

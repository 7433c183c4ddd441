use chrono::{DateTime, Utc};
use golf_protocol::{GameId, GameStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// CREATED → ACTIVE → ENDED. ENDED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Created,
    Active,
    Ended,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: GameId,
    pub dealer: String,
    /// Fixed at creation. Dealer first when the dealer plays.
    pub participants: Vec<String>,
    pub holes: u32,
    pub created_at: DateTime<Utc>,
    phase: SessionPhase,
}

impl Session {
    fn new(id: GameId, dealer: String, participants: Vec<String>, holes: u32) -> Self {
        Self {
            id,
            dealer,
            participants,
            holes,
            created_at: Utc::now(),
            phase: SessionPhase::Created,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn involves(&self, name: &str) -> bool {
        self.dealer == name || self.participants.iter().any(|p| p == name)
    }

    fn activate(&mut self) {
        debug_assert_eq!(self.phase, SessionPhase::Created);
        self.phase = SessionPhase::Active;
    }

    fn conclude(&mut self) {
        debug_assert_ne!(self.phase, SessionPhase::Ended);
        self.phase = SessionPhase::Ended;
    }
}

/// Live sessions by id. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct SessionTable {
    next_id: GameId,
    live: BTreeMap<GameId, Session>,
    ended: u64,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self {
            next_id: 1,
            live: BTreeMap::new(),
            ended: 0,
        }
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new session and move it straight to ACTIVE.
    pub(crate) fn open(&mut self, dealer: &str, participants: Vec<String>, holes: u32) -> &Session {
        let id = self.next_id;
        self.next_id += 1;
        let mut session = Session::new(id, dealer.to_string(), participants, holes);
        session.activate();
        self.live.entry(id).or_insert(session)
    }

    /// Remove a live session, returning it in the ENDED phase.
    pub(crate) fn close(&mut self, id: GameId) -> Option<Session> {
        let mut session = self.live.remove(&id)?;
        session.conclude();
        self.ended += 1;
        Some(session)
    }

    pub fn get(&self, id: GameId) -> Option<&Session> {
        self.live.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.live.values()
    }

    pub fn involving(&self, name: &str) -> Vec<GameId> {
        self.live
            .values()
            .filter(|s| s.involves(name))
            .map(|s| s.id)
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn ended_count(&self) -> u64 {
        self.ended
    }

    pub fn participant_total(&self) -> usize {
        self.live.values().map(|s| s.participants.len()).sum()
    }

    /// Coarse global status: any live session means a game is in progress.
    pub fn status(&self) -> GameStatus {
        if !self.live.is_empty() {
            GameStatus::InProgress
        } else if self.ended > 0 {
            GameStatus::Ended
        } else {
            GameStatus::Waiting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut table = SessionTable::new();
        let first = table.open("A", names(&["A", "B"]), 9).id;
        assert_eq!(first, 1);
        table.close(first).unwrap();
        let second = table.open("A", names(&["A", "B"]), 9).id;
        assert_eq!(second, 2);
        assert!(table.get(first).is_none());
    }

    #[test]
    fn opened_sessions_are_active_and_closed_ones_ended() {
        let mut table = SessionTable::new();
        let id = table.open("A", names(&["A"]), 3).id;
        assert_eq!(table.get(id).unwrap().phase(), SessionPhase::Active);
        let closed = table.close(id).unwrap();
        assert_eq!(closed.phase(), SessionPhase::Ended);
        assert!(table.close(id).is_none());
        assert_eq!(table.ended_count(), 1);
    }

    #[test]
    fn status_tracks_live_and_ended_sessions() {
        let mut table = SessionTable::new();
        assert_eq!(table.status(), GameStatus::Waiting);
        let a = table.open("A", names(&["A", "B"]), 9).id;
        let b = table.open("C", names(&["C"]), 9).id;
        assert_eq!(table.status(), GameStatus::InProgress);
        assert_eq!(table.participant_total(), 3);
        table.close(a);
        assert_eq!(table.status(), GameStatus::InProgress);
        table.close(b);
        assert_eq!(table.status(), GameStatus::Ended);
    }

    #[test]
    fn involving_matches_dealer_or_participant() {
        let mut table = SessionTable::new();
        // a busy dealer can run a game it does not play in
        let id = table.open("D", names(&["B", "C"]), 9).id;
        assert_eq!(table.involving("D"), vec![id]);
        assert_eq!(table.involving("C"), vec![id]);
        assert!(table.involving("Z").is_empty());
    }
}

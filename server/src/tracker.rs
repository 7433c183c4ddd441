use golf_protocol::{Endpoint, GameId, GameStatus, PlayerInfo, PlayerState, RosterEntry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{RegistryError, SessionError};
use crate::events::{EndReason, GameEvent};
use crate::registry::{ConnectionId, Player, Registry};
use crate::sessions::{Session, SessionTable};

/// Outgoing lines for one connection. Drained by that connection's writer task.
pub type Mailbox = mpsc::UnboundedSender<String>;

/// Everything guarded by the tracker lock. Registry and session table share
/// one lock because starting a game reads the registry and writes both.
#[derive(Debug, Default)]
pub struct TrackerState {
    pub registry: Registry,
    pub sessions: SessionTable,
    mailboxes: HashMap<ConnectionId, Mailbox>,
}

/// Result of a successful `start_game`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedGame {
    pub game_id: GameId,
    pub dealer: String,
    pub holes: u32,
    pub participants: Vec<String>,
    pub roster: Vec<RosterEntry>,
}

#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Mutex<TrackerState>>,
    events: Option<mpsc::UnboundedSender<GameEvent>>,
    next_conn: Arc<AtomicU64>,
    advertise_host: String,
    peer_base_port: u16,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Tracker {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerState::default())),
            events: None,
            next_conn: Arc::new(AtomicU64::new(0)),
            advertise_host: config.advertise_host.clone(),
            peer_base_port: config.peer_base_port,
        }
    }

    /// Route game start/end signals to a presentation layer.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<GameEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Read-only access to the locked state.
    pub fn with_state<R>(&self, f: impl FnOnce(&TrackerState) -> R) -> R {
        f(&*self.inner.lock())
    }

    pub fn connect(&self, mailbox: Mailbox) -> ConnectionId {
        let id = self.next_conn.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.lock().mailboxes.insert(id, mailbox);
        id
    }

    pub fn register(
        &self,
        name: &str,
        endpoint: Option<Endpoint>,
        owner: Option<ConnectionId>,
    ) -> Result<(), RegistryError> {
        let mut state = self.inner.lock();
        if let Err(e) = state.registry.register(name, endpoint, owner) {
            warn!("[REGISTER] rejected {}: {}", name, e);
            return Err(e);
        }
        info!("[REGISTER] {} (players={})", name, state.registry.len());
        Ok(())
    }

    pub fn deregister(&self, name: &str) -> Result<(), RegistryError> {
        let mut state = self.inner.lock();
        // a FREE dealer still owns its live games
        if state.registry.contains(name) && !state.sessions.involving(name).is_empty() {
            warn!("[DEREGISTER] rejected {}: still dealing a live game", name);
            return Err(RegistryError::Busy);
        }
        match state.registry.deregister(name) {
            Ok(_) => {
                info!("[DEREGISTER] {} (players={})", name, state.registry.len());
                Ok(())
            }
            Err(e) => {
                warn!("[DEREGISTER] rejected {}: {}", name, e);
                Err(e)
            }
        }
    }

    pub fn list_players(&self) -> Vec<PlayerInfo> {
        self.inner.lock().registry.list()
    }

    pub fn query_state(&self) -> GameStatus {
        self.inner.lock().sessions.status()
    }

    /// Pick `count` free players (the dealer first when free), flip them to
    /// IN_SESSION and record the session, all under one lock acquisition.
    pub fn start_game(
        &self,
        dealer: &str,
        count: usize,
        holes: u32,
    ) -> Result<StartedGame, SessionError> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;

        let free_total = state.registry.free_players().count();
        if free_total < count {
            warn!(
                "[START] rejected: dealer={} wanted={} free={}",
                dealer, count, free_total
            );
            return Err(SessionError::NotEnoughFree);
        }
        let dealer_free = match state.registry.get(dealer) {
            Some(p) => p.is_free(),
            None => {
                warn!("[START] rejected: dealer {} not registered", dealer);
                return Err(SessionError::UnknownDealer);
            }
        };

        let mut selected = Vec::with_capacity(count);
        if dealer_free && count > 0 {
            selected.push(dealer.to_string());
        }
        let wanted = count - selected.len();
        selected.extend(
            state
                .registry
                .free_players()
                .filter(|p| p.name != dealer)
                .take(wanted)
                .map(|p| p.name.clone()),
        );
        debug_assert_eq!(selected.len(), count);

        for name in &selected {
            state.registry.set_state(name, PlayerState::InSession);
        }
        let roster = self.resolve_roster(&state.registry, dealer, &selected);
        let session = state.sessions.open(dealer, selected, holes);
        info!(
            "[START] game {} dealer={} players={:?} holes={}",
            session.id, dealer, session.participants, holes
        );

        Ok(StartedGame {
            game_id: session.id,
            dealer: session.dealer.clone(),
            holes,
            participants: session.participants.clone(),
            roster,
        })
    }

    /// Push the roster to the dealer's connection and signal the start.
    /// Called after the requester has been answered.
    pub fn announce(&self, started: &StartedGame) {
        let mailbox = {
            let state = self.inner.lock();
            state
                .registry
                .get(&started.dealer)
                .and_then(|p| p.owner)
                .and_then(|conn| state.mailboxes.get(&conn).cloned())
        };
        match mailbox {
            Some(tx) => {
                let lines: Vec<String> = started.roster.iter().map(|r| r.to_string()).collect();
                if tx.send(lines.join("\n")).is_err() {
                    debug!("[ROSTER] dealer {} went away before the push", started.dealer);
                }
            }
            None => debug!("[ROSTER] dealer {} has no live connection", started.dealer),
        }
        self.emit(GameEvent::Started {
            game_id: started.game_id,
            dealer: started.dealer.clone(),
            holes: started.holes,
            roster: started.roster.clone(),
        });
    }

    /// End a game on behalf of its dealer and free every participant.
    pub fn end_game(&self, game_id: GameId, dealer: &str) -> Result<(), SessionError> {
        let session = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            if !state.sessions.get(game_id).is_some_and(|s| s.dealer == dealer) {
                warn!("[END] rejected: game={} dealer={}", game_id, dealer);
                return Err(SessionError::InvalidSessionOrDealer);
            }
            let session = state
                .sessions
                .close(game_id)
                .ok_or(SessionError::InvalidSessionOrDealer)?;
            release(&mut state.registry, &session);
            session
        };
        info!("[END] game {} ended by {}", game_id, dealer);
        self.emit(GameEvent::Ended {
            game_id,
            dealer: session.dealer,
            reason: EndReason::Requested,
        });
        Ok(())
    }

    /// Remove a player whatever its state. Any live game it deals or plays in
    /// is concluded and its other participants go back to FREE.
    pub fn forced_remove(&self, name: &str) -> Option<Player> {
        let (removed, concluded) = {
            let mut state = self.inner.lock();
            force_remove_locked(&mut state, name)?
        };
        self.report_removal(&removed, concluded);
        Some(removed)
    }

    /// Disconnect cleanup: drop the mailbox and force-remove every player the
    /// connection registered.
    pub fn disconnect(&self, conn: ConnectionId) -> Vec<Player> {
        let removals = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            state.mailboxes.remove(&conn);
            let owned = state.registry.owned_by(conn);
            let removals: Vec<_> = owned
                .iter()
                .filter_map(|name| force_remove_locked(state, name))
                .collect();
            removals
        };
        removals
            .into_iter()
            .map(|(removed, concluded)| {
                self.report_removal(&removed, concluded);
                removed
            })
            .collect()
    }

    fn report_removal(&self, removed: &Player, concluded: Vec<(Session, EndReason)>) {
        if removed.is_free() {
            info!("[DISCONNECT] removed {}", removed.name);
        } else {
            warn!("[DISCONNECT] removed {} while in a game", removed.name);
        }
        for (session, reason) in concluded {
            info!(
                "[END] game {} concluded ({:?}), released {:?}",
                session.id, reason, session.participants
            );
            self.emit(GameEvent::Ended {
                game_id: session.id,
                dealer: session.dealer,
                reason,
            });
        }
    }

    /// Dealer line first, then the other participants in seating order.
    fn resolve_roster(&self, registry: &Registry, dealer: &str, selected: &[String]) -> Vec<RosterEntry> {
        std::iter::once(dealer)
            .chain(selected.iter().map(String::as_str).filter(|name| *name != dealer))
            .filter_map(|name| registry.get(name))
            .map(|p| match &p.endpoint {
                Some(ep) => RosterEntry {
                    name: p.name.clone(),
                    host: ep.host().to_string(),
                    port: ep.peer_port(),
                },
                None => RosterEntry {
                    name: p.name.clone(),
                    host: self.advertise_host.clone(),
                    port: if p.name == dealer {
                        self.peer_base_port
                    } else {
                        self.peer_base_port.saturating_add(1)
                    },
                },
            })
            .collect()
    }

    fn emit(&self, event: GameEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                debug!("[EVENT] no presentation listener");
            }
        }
    }
}

fn release(registry: &mut Registry, session: &Session) {
    for name in &session.participants {
        registry.set_state(name, PlayerState::Free);
    }
}

fn force_remove_locked(
    state: &mut TrackerState,
    name: &str,
) -> Option<(Player, Vec<(Session, EndReason)>)> {
    let removed = state.registry.remove(name)?;
    let mut concluded = Vec::new();
    for id in state.sessions.involving(name) {
        if let Some(session) = state.sessions.close(id) {
            release(&mut state.registry, &session);
            let reason = if session.dealer == name {
                EndReason::DealerDisconnected
            } else {
                EndReason::ParticipantDisconnected
            };
            concluded.push((session, reason));
        }
    }
    Some((removed, concluded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionPhase;
    use std::sync::Barrier;
    use std::thread;

    fn tracker_with(names: &[&str]) -> Tracker {
        let tracker = Tracker::default();
        for name in names {
            tracker.register(name, None, None).unwrap();
        }
        tracker
    }

    fn state_of(tracker: &Tracker, name: &str) -> Option<PlayerState> {
        tracker.with_state(|s| s.registry.get(name).map(|p| p.state))
    }

    fn assert_balanced(tracker: &Tracker) {
        tracker.with_state(|s| {
            assert_eq!(s.registry.in_session_count(), s.sessions.participant_total());
            assert!(s.sessions.iter().all(|g| g.phase() == SessionPhase::Active));
        });
    }

    #[test]
    fn start_game_fails_on_empty_registry() {
        let tracker = Tracker::default();
        assert_eq!(tracker.start_game("A", 3, 9), Err(SessionError::NotEnoughFree));
        tracker.register("A", None, None).unwrap();
        assert_eq!(tracker.start_game("A", 3, 9), Err(SessionError::NotEnoughFree));
        assert_eq!(state_of(&tracker, "A"), Some(PlayerState::Free));
        assert_eq!(tracker.query_state(), GameStatus::Waiting);
    }

    #[test]
    fn start_game_requires_a_registered_dealer() {
        let tracker = tracker_with(&["B", "C", "D"]);
        assert_eq!(tracker.start_game("A", 2, 9), Err(SessionError::UnknownDealer));
        assert_eq!(tracker.with_state(|s| s.registry.in_session_count()), 0);
    }

    #[test]
    fn full_game_lifecycle() {
        let tracker = tracker_with(&["A", "B", "C"]);
        let started = tracker.start_game("A", 3, 9).unwrap();
        assert_eq!(started.game_id, 1);
        assert_eq!(started.participants, vec!["A", "B", "C"]);
        for name in ["A", "B", "C"] {
            assert_eq!(state_of(&tracker, name), Some(PlayerState::InSession));
        }
        assert_eq!(tracker.query_state(), GameStatus::InProgress);
        assert_eq!(tracker.deregister("B"), Err(RegistryError::Busy));

        assert_eq!(tracker.end_game(1, "A"), Ok(()));
        assert_eq!(state_of(&tracker, "B"), Some(PlayerState::Free));
        assert_eq!(tracker.deregister("B"), Ok(()));
        assert_eq!(tracker.query_state(), GameStatus::Ended);
        assert_balanced(&tracker);
    }

    #[test]
    fn dealer_is_seated_first_then_registration_order() {
        let tracker = tracker_with(&["A", "B", "C", "D"]);
        let started = tracker.start_game("C", 2, 9).unwrap();
        assert_eq!(started.participants, vec!["C", "A"]);
        assert_eq!(state_of(&tracker, "B"), Some(PlayerState::Free));
        assert_eq!(state_of(&tracker, "D"), Some(PlayerState::Free));
    }

    #[test]
    fn busy_dealer_can_start_a_game_it_does_not_play() {
        let tracker = tracker_with(&["A", "B", "C", "D"]);
        tracker.start_game("A", 2, 9).unwrap();
        let second = tracker.start_game("A", 2, 9).unwrap();
        assert_eq!(second.participants, vec!["C", "D"]);
        assert_eq!(tracker.start_game("A", 1, 9), Err(SessionError::NotEnoughFree));
        assert_balanced(&tracker);
    }

    #[test]
    fn non_playing_dealer_cannot_deregister_while_its_game_is_live() {
        let tracker = tracker_with(&["A", "B", "C", "D"]);
        let first = tracker.start_game("A", 2, 9).unwrap();
        let second = tracker.start_game("A", 2, 9).unwrap();
        assert_eq!(second.participants, vec!["C", "D"]);
        tracker.end_game(first.game_id, "A").unwrap();
        assert_eq!(state_of(&tracker, "A"), Some(PlayerState::Free));

        assert_eq!(tracker.deregister("A"), Err(RegistryError::Busy));
        assert!(tracker.with_state(|s| s.registry.contains("A")));

        tracker.forced_remove("A").unwrap();
        assert_eq!(state_of(&tracker, "C"), Some(PlayerState::Free));
        assert_eq!(state_of(&tracker, "D"), Some(PlayerState::Free));
        assert_eq!(tracker.with_state(|s| s.sessions.live_count()), 0);
        assert_balanced(&tracker);
        assert_eq!(tracker.deregister("C"), Ok(()));
    }

    #[test]
    fn roster_starts_with_a_non_playing_dealer() {
        let tracker = tracker_with(&["A", "B", "C"]);
        tracker.start_game("A", 2, 9).unwrap();
        let second = tracker.start_game("A", 1, 9).unwrap();
        assert_eq!(second.participants, vec!["C"]);
        let names: Vec<&str> = second.roster.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(second.roster[0].port, 5000);
        assert_eq!(second.roster[1].port, 5001);
    }

    #[test]
    fn end_game_with_wrong_dealer_or_id_changes_nothing() {
        let tracker = tracker_with(&["A", "B"]);
        tracker.start_game("A", 2, 9).unwrap();
        assert_eq!(tracker.end_game(1, "B"), Err(SessionError::InvalidSessionOrDealer));
        assert_eq!(tracker.end_game(2, "A"), Err(SessionError::InvalidSessionOrDealer));
        assert_eq!(state_of(&tracker, "A"), Some(PlayerState::InSession));
        assert_eq!(state_of(&tracker, "B"), Some(PlayerState::InSession));
        assert_eq!(tracker.end_game(1, "A"), Ok(()));
        assert_eq!(tracker.end_game(1, "A"), Err(SessionError::InvalidSessionOrDealer));
    }

    #[test]
    fn forced_removal_of_dealer_releases_participants() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracker = tracker_with(&["A", "B", "C"]).with_events(tx);
        let started = tracker.start_game("A", 3, 9).unwrap();
        tracker.announce(&started);

        let removed = tracker.forced_remove("A").unwrap();
        assert_eq!(removed.state, PlayerState::InSession);
        assert_eq!(state_of(&tracker, "A"), None);
        assert_eq!(state_of(&tracker, "B"), Some(PlayerState::Free));
        assert_eq!(state_of(&tracker, "C"), Some(PlayerState::Free));
        assert!(tracker.with_state(|s| s.sessions.get(1).is_none()));
        assert_balanced(&tracker);

        assert!(matches!(rx.try_recv(), Ok(GameEvent::Started { game_id: 1, .. })));
        assert_eq!(
            rx.try_recv().unwrap(),
            GameEvent::Ended {
                game_id: 1,
                dealer: "A".into(),
                reason: EndReason::DealerDisconnected,
            }
        );
    }

    #[test]
    fn forced_removal_of_participant_concludes_its_game() {
        let tracker = tracker_with(&["A", "B", "C", "D"]);
        tracker.start_game("A", 2, 9).unwrap();
        tracker.start_game("C", 2, 9).unwrap();
        tracker.forced_remove("B").unwrap();
        assert_eq!(state_of(&tracker, "A"), Some(PlayerState::Free));
        assert_eq!(state_of(&tracker, "C"), Some(PlayerState::InSession));
        assert_eq!(tracker.with_state(|s| s.sessions.live_count()), 1);
        assert_balanced(&tracker);
        assert!(tracker.forced_remove("B").is_none());
    }

    #[test]
    fn disconnect_only_removes_owned_players() {
        let tracker = Tracker::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = tracker.connect(tx);
        tracker.register("A", None, Some(conn)).unwrap();
        tracker.register("B", None, Some(conn + 1)).unwrap();
        let removed = tracker.disconnect(conn);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name, "A");
        assert!(tracker.with_state(|s| s.registry.contains("B")));
    }

    #[test]
    fn announce_pushes_roster_to_dealer_mailbox() {
        let config = Config {
            advertise_host: "10.1.1.1".into(),
            ..Config::default()
        };
        let tracker = Tracker::new(&config);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = tracker.connect(tx);
        tracker.register("A", None, Some(conn)).unwrap();
        tracker
            .register(
                "B",
                Some(Endpoint::Split { host: "10.0.0.9".into(), t_port: 6000, p_port: 6001 }),
                None,
            )
            .unwrap();
        tracker.register("C", None, None).unwrap();

        let started = tracker.start_game("A", 3, 9).unwrap();
        tracker.announce(&started);
        assert_eq!(
            rx.try_recv().unwrap(),
            "A 10.1.1.1 5000\nB 10.0.0.9 6001\nC 10.1.1.1 5001"
        );
    }

    #[test]
    fn concurrent_duplicate_registration_yields_one_success() {
        let tracker = Tracker::default();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    tracker.register("A", None, None)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results.iter().filter(|r| **r == Err(RegistryError::Duplicate)).count(),
            7
        );
        assert_eq!(tracker.with_state(|s| s.registry.len()), 1);
    }

    #[test]
    fn racing_start_games_never_share_a_player() {
        for _ in 0..50 {
            let tracker = tracker_with(&["A", "B", "C"]);
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = ["A", "B"]
                .into_iter()
                .map(|dealer| {
                    let tracker = tracker.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        tracker.start_game(dealer, 2, 9)
                    })
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let wins: Vec<&StartedGame> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
            assert_eq!(wins.len(), 1);
            assert!(results.iter().any(|r| *r == Err(SessionError::NotEnoughFree)));
            assert_balanced(&tracker);
        }
    }

    #[test]
    fn busy_count_matches_live_participants_through_a_script() {
        let tracker = tracker_with(&["A", "B", "C", "D", "E"]);
        assert_balanced(&tracker);
        let g1 = tracker.start_game("A", 2, 9).unwrap().game_id;
        assert_balanced(&tracker);
        let g2 = tracker.start_game("C", 3, 5).unwrap().game_id;
        assert_balanced(&tracker);
        assert!(tracker.start_game("A", 1, 9).is_err());
        tracker.register("F", None, None).unwrap();
        assert_eq!(tracker.deregister("C"), Err(RegistryError::Busy));
        tracker.end_game(g1, "A").unwrap();
        assert_balanced(&tracker);
        tracker.forced_remove("D");
        assert_balanced(&tracker);
        assert!(tracker.end_game(g2, "C").is_err());
        assert_eq!(tracker.start_game("F", 6, 9), Err(SessionError::NotEnoughFree));
        let g3 = tracker.start_game("F", 5, 9).unwrap().game_id;
        assert_balanced(&tracker);
        tracker.end_game(g3, "F").unwrap();
        assert_balanced(&tracker);
        assert_eq!(tracker.with_state(|s| s.registry.in_session_count()), 0);
    }
}

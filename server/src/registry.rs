use golf_protocol::{Endpoint, PlayerInfo, PlayerState};

use crate::error::RegistryError;

/// Identifies one accepted connection for the lifetime of the process.
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub endpoint: Option<Endpoint>,
    pub state: PlayerState,
    /// Connection that registered the player, if any. Disconnect cleanup only
    /// touches players owned by the closing connection.
    pub owner: Option<ConnectionId>,
}

impl Player {
    pub fn is_free(&self) -> bool {
        self.state == PlayerState::Free
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
            state: self.state,
        }
    }
}

/// Player identity → contact and availability. Kept in registration order so
/// that free-player selection is deterministic.
#[derive(Debug, Default)]
pub struct Registry {
    players: Vec<Player>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        endpoint: Option<Endpoint>,
        owner: Option<ConnectionId>,
    ) -> Result<(), RegistryError> {
        if self.contains(name) {
            return Err(RegistryError::Duplicate);
        }
        self.players.push(Player {
            name: name.to_string(),
            endpoint,
            state: PlayerState::Free,
            owner,
        });
        Ok(())
    }

    /// Remove a FREE player.
    pub fn deregister(&mut self, name: &str) -> Result<Player, RegistryError> {
        let idx = self.position(name).ok_or(RegistryError::NotFound)?;
        if !self.players[idx].is_free() {
            return Err(RegistryError::Busy);
        }
        Ok(self.players.remove(idx))
    }

    /// Remove regardless of state.
    pub(crate) fn remove(&mut self, name: &str) -> Option<Player> {
        let idx = self.position(name)?;
        Some(self.players.remove(idx))
    }

    pub fn list(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(Player::info).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn free_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_free())
    }

    pub fn in_session_count(&self) -> usize {
        self.players.iter().filter(|p| !p.is_free()).count()
    }

    pub fn owned_by(&self, conn: ConnectionId) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.owner == Some(conn))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Returns false if the player is not registered.
    pub(crate) fn set_state(&mut self, name: &str, state: PlayerState) -> bool {
        match self.players.iter_mut().find(|p| p.name == name) {
            Some(p) => {
                p.state = state;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|p| p.name == name)
    }
}

//! Participant registry
//!
//! This module tracks the set of currently connected participants and their
//! per-round answer status. Entries are keyed by the stable account
//! identifier with a secondary index by connection handle, mirroring how the
//! transport layer addresses them, and a join-order list so snapshots are
//! stably ordered.

use std::{
    collections::HashMap,
    fmt::Display,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use super::{constants, events::PlayerEntry, session::ConnectionId};

/// A stable account identifier for a participant
///
/// Resolved by the external authenticator; it survives reconnects, unlike
/// the connection handle.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random participant ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random participant ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// One connected participant
///
/// Owned exclusively by the [`Registry`] for the duration of the connection;
/// created on join, mutated on answer and round start, destroyed on
/// disconnect or explicit leave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable account identifier
    pub id: Id,
    /// Display name resolved by the authenticator
    pub name: String,
    /// Handle of the connection this participant is reachable on
    pub connection: ConnectionId,
    /// Current total score, kept in sync with the durable store
    pub score: u64,
    /// Whether an answer was accepted from them this round
    pub has_answered: bool,
    /// Whether they may answer the current round
    ///
    /// Fixed at round start for everyone present then; participants joining
    /// mid-round get `false` until the next round starts.
    pub eligible: bool,
}

/// Errors that can occur when managing the registry
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session has reached the maximum number of allowed participants
    #[error("maximum number of players reached")]
    MaximumPlayers,
    /// No participant matches the given identifier or connection
    #[error("participant not found")]
    NotFound,
}

/// Tracks all currently connected participants
#[derive(Debug, Default)]
pub struct Registry {
    /// Primary mapping from account ID to participant
    mapping: HashMap<Id, Participant>,
    /// Secondary index from connection handle to account ID
    by_connection: HashMap<ConnectionId, Id>,
    /// Account IDs in join order, for stable snapshots
    order: Vec<Id>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a participant, replacing any prior entry for the same account
    ///
    /// Replacement is the reconnect path: the old entry (and its connection
    /// index) is dropped and the returned handle lets the caller close the
    /// stale connection. Eligibility is decided here: a participant arriving
    /// while a round is active may not answer it.
    ///
    /// # Arguments
    ///
    /// * `id` - Stable account identifier
    /// * `name` - Display name resolved by the authenticator
    /// * `connection` - Handle of the new connection
    /// * `score` - Current durable point total
    /// * `round_active` - Whether a round is in progress right now
    ///
    /// # Returns
    ///
    /// The replaced entry's connection handle on reconnect, otherwise `None`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaximumPlayers`] if the session is full.
    pub fn register(
        &mut self,
        id: Id,
        name: String,
        connection: ConnectionId,
        score: u64,
        round_active: bool,
    ) -> Result<Option<ConnectionId>, Error> {
        let previous_connection = match self.mapping.get(&id) {
            Some(existing) => {
                let stale = existing.connection;
                self.by_connection.remove(&stale);
                Some(stale)
            }
            None => {
                if self.mapping.len() >= constants::lobby::MAX_PLAYER_COUNT {
                    return Err(Error::MaximumPlayers);
                }
                self.order.push(id);
                None
            }
        };

        self.mapping.insert(
            id,
            Participant {
                id,
                name,
                connection,
                score,
                has_answered: false,
                eligible: !round_active,
            },
        );
        self.by_connection.insert(connection, id);

        Ok(previous_connection)
    }

    /// Removes a participant by account identifier
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such participant is registered.
    pub fn unregister(&mut self, id: Id) -> Result<Participant, Error> {
        let participant = self.mapping.remove(&id).ok_or(Error::NotFound)?;
        self.by_connection.remove(&participant.connection);
        self.order.retain(|other| *other != id);
        Ok(participant)
    }

    /// Removes a participant by connection handle
    ///
    /// This is the disconnect path, where only the transport-level handle is
    /// known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the connection belongs to no
    /// registered participant.
    pub fn unregister_connection(&mut self, connection: ConnectionId) -> Result<Participant, Error> {
        let id = self
            .by_connection
            .get(&connection)
            .copied()
            .ok_or(Error::NotFound)?;
        self.unregister(id)
    }

    /// Looks up a participant by account identifier
    pub fn get(&self, id: Id) -> Option<&Participant> {
        self.mapping.get(&id)
    }

    /// Looks up a participant mutably by account identifier
    pub fn get_mut(&mut self, id: Id) -> Option<&mut Participant> {
        self.mapping.get_mut(&id)
    }

    /// Number of registered participants
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether nobody is registered
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Resets per-round state for a fresh round
    ///
    /// Everyone present at round start becomes eligible with a cleared
    /// answered flag.
    pub fn begin_round(&mut self) {
        for participant in self.mapping.values_mut() {
            participant.eligible = true;
            participant.has_answered = false;
        }
    }

    /// Whether every eligible participant has answered
    ///
    /// Evaluated over the participants registered right now, so a mid-round
    /// leaver shrinks the expected set instead of stalling the round. False
    /// when nobody eligible remains.
    pub fn all_eligible_answered(&self) -> bool {
        let mut eligible = self
            .mapping
            .values()
            .filter(|participant| participant.eligible)
            .peekable();

        eligible.peek().is_some() && eligible.all(|participant| participant.has_answered)
    }

    /// Returns a stable-ordered snapshot of every registered participant
    ///
    /// Entries appear in join order and reflect the state at the instant of
    /// the call.
    pub fn list(&self) -> Vec<PlayerEntry> {
        self.iter()
            .map(|participant| PlayerEntry {
                name: participant.name.clone(),
                score: participant.score,
                has_answered: participant.has_answered,
                eligible: participant.eligible,
            })
            .collect()
    }

    /// Iterates over participants in join order
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.order.iter().filter_map(|id| self.mapping.get(id))
    }
}

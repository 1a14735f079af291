//! Single authoritative reducer over a shared room store.
//!
//! Clients each hold a possibly outdated snapshot of a room and may
//! submit actions concurrently. The coordinator serializes them: every
//! submission carries the version its author last saw, is validated
//! against the *current* committed state, and is committed with
//! compare-and-swap. A loser of a race gets [`GameError::StaleState`]
//! back instead of clobbering the winner's transition; in no case does
//! an action partially apply.

use log::debug;
use rand::Rng;

use super::store::{RoomId, RoomStore, StoreError, Version, VersionedState};
use crate::game::entities::{GameAction, GameState, PlayerId};
use crate::game::state_machine::GameError;

impl From<StoreError> for GameError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { expected, actual } => Self::StaleState { expected, actual },
            StoreError::RoomNotFound(_) => Self::UnknownRoom,
            StoreError::Codec(_) => Self::InternalStateError,
        }
    }
}

/// Owns a store handle and the random source used for shuffles.
#[derive(Debug)]
pub struct RoomCoordinator<S, R = rand::rngs::ThreadRng> {
    store: S,
    rng: R,
}

impl<S: RoomStore> RoomCoordinator<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            rng: rand::rng(),
        }
    }
}

impl<S: RoomStore, R: Rng> RoomCoordinator<S, R> {
    /// A coordinator with a caller-supplied random source, e.g. a seeded
    /// generator for reproducible games.
    #[must_use]
    pub fn with_rng(store: S, rng: R) -> Self {
        Self { store, rng }
    }

    /// Create a room around a fresh state.
    pub fn open(&self, state: &GameState) -> Result<RoomId, GameError> {
        let room = self.store.create(state)?;
        debug!("opened room {room}");
        Ok(room)
    }

    /// The latest committed snapshot, for catching a client up.
    pub fn snapshot(&self, room: RoomId) -> Result<VersionedState, GameError> {
        Ok(self.store.get(room)?)
    }

    /// Validate and commit one action against the current committed
    /// state. `expected` is the version the actor's snapshot was read at;
    /// if the room has moved on since, the action fails `StaleState` and
    /// the caller should re-read and reconsider.
    pub fn submit(
        &mut self,
        room: RoomId,
        expected: Version,
        actor: &PlayerId,
        action: GameAction,
    ) -> Result<(Version, GameState), GameError> {
        let committed = self.store.get(room)?;
        if committed.version != expected {
            return Err(GameError::StaleState {
                expected,
                actual: committed.version,
            });
        }

        let next = committed.state.apply(actor, action, &mut self.rng)?;
        let version = self.store.try_commit(room, expected, &next)?;
        debug!("room {room} advanced to version {version}");
        Ok((version, next))
    }
}

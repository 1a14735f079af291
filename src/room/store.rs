//! Versioned shared-state store abstraction.
//!
//! The real deployment keeps each room's `GameState` in a remotely
//! synchronized document store; this module captures the only contract
//! the engine needs from it: read a committed snapshot with its version,
//! and commit a replacement if and only if the expected version still
//! matches (compare-and-swap). The trait keeps the engine testable
//! without any remote backend, and [`MemoryStore`] is the reference
//! implementation used by tests and single-process hosts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use uuid::Uuid;

use crate::game::entities::GameState;

/// Opaque room identity.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct RoomId(Uuid);

impl RoomId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Monotonic commit counter per room. Every committed transition bumps it
/// by one; an action proposed against an older version is stale.
pub type Version = u64;

/// A committed snapshot together with its version and commit time.
#[derive(Clone, Debug)]
pub struct VersionedState {
    pub version: Version,
    pub state: GameState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),
    #[error("version conflict: expected {expected}, committed {actual}")]
    Conflict { expected: Version, actual: Version },
    #[error("snapshot codec failure: {0}")]
    Codec(String),
}

/// The engine's contract with whatever holds room state.
pub trait RoomStore {
    /// Persist a brand-new room at version 1.
    fn create(&self, state: &GameState) -> Result<RoomId, StoreError>;

    /// The latest committed snapshot.
    fn get(&self, room: RoomId) -> Result<VersionedState, StoreError>;

    /// Commit a replacement snapshot if `expected` is still the committed
    /// version, returning the new version. A mismatch means another
    /// participant committed first; the caller must re-read and retry.
    fn try_commit(
        &self,
        room: RoomId,
        expected: Version,
        state: &GameState,
    ) -> Result<Version, StoreError>;
}

#[derive(Debug)]
struct Record {
    version: Version,
    snapshot: Vec<u8>,
    updated_at: DateTime<Utc>,
}

/// In-memory reference store. Snapshots round-trip through the same wire
/// encoding a remote backend would use, so serialization bugs surface in
/// tests rather than in deployment.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<RoomId, Record>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn encode(state: &GameState) -> Result<Vec<u8>, StoreError> {
        bincode::serde::encode_to_vec(state, bincode::config::standard())
            .map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode(snapshot: &[u8]) -> Result<GameState, StoreError> {
        bincode::serde::decode_from_slice(snapshot, bincode::config::standard())
            .map(|(state, _)| state)
            .map_err(|e| StoreError::Codec(e.to_string()))
    }
}

impl RoomStore for MemoryStore {
    fn create(&self, state: &GameState) -> Result<RoomId, StoreError> {
        let room = RoomId::new();
        let record = Record {
            version: 1,
            snapshot: Self::encode(state)?,
            updated_at: Utc::now(),
        };
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.insert(room, record);
        Ok(room)
    }

    fn get(&self, room: RoomId) -> Result<VersionedState, StoreError> {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let record = rooms.get(&room).ok_or(StoreError::RoomNotFound(room))?;
        Ok(VersionedState {
            version: record.version,
            state: Self::decode(&record.snapshot)?,
            updated_at: record.updated_at,
        })
    }

    fn try_commit(
        &self,
        room: RoomId,
        expected: Version,
        state: &GameState,
    ) -> Result<Version, StoreError> {
        let snapshot = Self::encode(state)?;
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let record = rooms.get_mut(&room).ok_or(StoreError::RoomNotFound(room))?;
        if record.version != expected {
            return Err(StoreError::Conflict {
                expected,
                actual: record.version,
            });
        }
        record.version += 1;
        record.snapshot = snapshot;
        record.updated_at = Utc::now();
        Ok(record.version)
    }
}

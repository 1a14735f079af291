//! Room layer: the shared-state store contract and the coordinator that
//! serializes client submissions into committed transitions.

pub mod coordinator;
pub mod store;

pub use coordinator::RoomCoordinator;
pub use store::{MemoryStore, RoomId, RoomStore, StoreError, Version, VersionedState};

//! # Rummy Parlor
//!
//! A turn-based, multi-player rummy implementation built as a pure rules
//! engine over a shared, versioned room state.
//!
//! The engine is deterministic and synchronous: every operation takes the
//! current [`GameState`](game::entities::GameState) snapshot plus an
//! acting identity and returns either a fresh state or a typed
//! [`GameError`](game::GameError), never a partial mutation. Transport,
//! persistence, authentication, and rendering are external collaborators;
//! the [`room`] layer captures the only contract the engine needs from
//! them (a versioned compare-and-swap store) so concurrent clients race
//! safely instead of corrupting pile contents.
//!
//! ## Game flow
//!
//! A room starts `Waiting` while players join. The host deals, entering
//! `Playing`, and each turn walks draw → any number of melds and
//! lay-offs → discard, rotating seats cyclically. Discarding the last
//! hand card settles the round: every player banks the value of the
//! melds they created minus what is left in their hand, and the first
//! player to reach the target score wins the game.
//!
//! Two rules are preserved exactly as the source game plays them:
//! - Run *creation* is cyclic over a 13-rank ring, so the ace may sit
//!   low (A-2-3), high (Q-K-A), or bridge the wrap (K-A-2).
//! - Run *extension* by lay-off is linear and endpoint-only, except that
//!   a run already spanning the full K-A wrap also accepts the two. The
//!   asymmetry with creation is deliberate and documented, not a defect.
//!
//! ## Core modules
//!
//! - [`game`]: entities, pure rules, and the turn state machine
//! - [`room`]: versioned state store contract and the coordinator
//!
//! ## Example
//!
//! ```
//! use rummy_parlor::game::entities::{GameState, PlayerId, Username};
//! use rummy_parlor::game::GameSettings;
//!
//! // Create a new room in the waiting state
//! let host = PlayerId::new("host-uid");
//! let room = GameState::new(host, Username::new("ada"), GameSettings::default());
//! assert_eq!(room.players.len(), 1);
//! ```

/// Core game logic, entities, and the turn state machine.
pub mod game;
pub use game::{
    GameError, GameEvent, GameSettings,
    constants::{self, DEFAULT_TARGET_SCORE, MAX_PLAYERS, MIN_PLAYERS},
    entities::{
        self, Card, Deck, DrawSource, GameAction, GameState, GameStatus, Meld, MeldKind, Player,
        PlayerId, Rank, Suit, TurnPhase, Username,
    },
    functional,
};

/// Shared-state store contract and the room coordinator.
pub mod room;
pub use room::{MemoryStore, RoomCoordinator, RoomId, RoomStore, StoreError, Version, VersionedState};

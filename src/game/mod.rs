//! Rummy game engine - entities, pure rules, and the turn state machine.
//!
//! This module provides the foundational game implementation including:
//! - Immutable card/deck/meld entities and the authoritative room record
//! - Pure meld, lay-off, and scoring rules
//! - The draw → act → discard turn machine and round settlement
//! - Event generation and per-player redacted views

pub mod constants;
pub mod entities;
pub mod functional;
pub mod state_machine;

pub use state_machine::{GameError, GameEvent, GameSettings};

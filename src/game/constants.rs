//! Game-wide constants.

/// Number of cards in a fresh deck.
pub const DECK_SIZE: usize = 52;

/// Fewest players a round can be dealt for.
pub const MIN_PLAYERS: usize = 2;

/// Most players a round can be dealt for.
pub const MAX_PLAYERS: usize = 6;

/// Fewest cards in a legal meld.
pub const MIN_MELD_CARDS: usize = 3;

/// Most cards a set can hold (one per suit).
pub const MAX_SET_CARDS: usize = 4;

/// Cumulative score that ends the game once a round winner reaches it.
pub const DEFAULT_TARGET_SCORE: i32 = 500;

/// Upper bound applied to user-supplied text such as display names.
pub const MAX_USER_INPUT_LENGTH: usize = 64;

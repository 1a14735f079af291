//! Pure rules queries: meld validation, lay-off validation, dealing
//! arithmetic, and point counting. Nothing in here touches game state or
//! randomness, so every function is trivially testable on raw cards.

use std::collections::VecDeque;

use super::constants;
use super::entities::{Card, Meld, MeldKind};

/// Cards dealt to each player for a given table size. `None` for table
/// sizes the game does not support.
#[must_use]
pub const fn cards_per_player(player_count: usize) -> Option<usize> {
    match player_count {
        2 => Some(10),
        3 | 4 => Some(7),
        5 | 6 => Some(6),
        _ => None,
    }
}

/// Partition a shuffled deck into per-player hands plus the undealt
/// remainder. Hands are taken from the front, one full hand at a time,
/// in seating order. `None` for unsupported player counts.
#[must_use]
pub fn deal(deck: Vec<Card>, player_count: usize) -> Option<(Vec<Vec<Card>>, VecDeque<Card>)> {
    let per_hand = cards_per_player(player_count)?;
    let mut rest: VecDeque<Card> = deck.into();
    let mut hands = Vec::with_capacity(player_count);
    for _ in 0..player_count {
        hands.push(rest.drain(..per_hand).collect());
    }
    Some((hands, rest))
}

/// Whether a candidate group forms a legal set: three or four cards of
/// one rank, at most one card per suit.
#[must_use]
pub fn is_valid_set(cards: &[Card]) -> bool {
    if cards.len() < constants::MIN_MELD_CARDS || cards.len() > constants::MAX_SET_CARDS {
        return false;
    }
    let rank = cards[0].rank;
    if cards.iter().any(|c| c.rank != rank) {
        return false;
    }
    cards
        .iter()
        .enumerate()
        .all(|(i, c)| cards[..i].iter().all(|prev| prev.suit != c.suit))
}

/// Whether a candidate group forms a legal run: three or more same-suit
/// cards whose orders, once sorted, admit a rotation that is contiguous
/// on the 13-rank ring. The ring treatment lets the ace sit at either
/// end of a run, or bridge the king and the two (Q-K-A and K-A-2 are
/// both single contiguous runs).
///
/// Lay-offs do NOT re-derive rotations; see [`can_lay_off`].
#[must_use]
pub fn is_valid_run(cards: &[Card]) -> bool {
    if cards.len() < constants::MIN_MELD_CARDS {
        return false;
    }
    let suit = cards[0].suit;
    if cards.iter().any(|c| c.suit != suit) {
        return false;
    }
    let mut orders: Vec<u8> = cards.iter().map(|c| c.order()).collect();
    orders.sort_unstable();
    if orders.windows(2).any(|w| w[0] == w[1]) {
        return false;
    }
    contiguous_rotation(&orders).is_some()
}

/// Whether a single card may extend an existing meld.
///
/// Sets take the card if it matches the set's rank, brings a new suit,
/// and the set still has room for a fourth card. Runs only grow from
/// their two current endpoints (a linear check, unlike run creation),
/// with one special case: a run already spanning the full K-A wrap also
/// accepts the two.
#[must_use]
pub fn can_lay_off(card: Card, meld: &Meld) -> bool {
    match meld.kind {
        MeldKind::Set { rank } => {
            card.rank == rank
                && meld.cards.len() < constants::MAX_SET_CARDS
                && meld.cards.iter().all(|tc| tc.card.suit != card.suit)
        }
        MeldKind::Run { suit } => {
            if card.suit != suit {
                return false;
            }
            let orders: Vec<u8> = meld.cards.iter().map(|tc| tc.card.order()).collect();
            let min = orders.iter().copied().min().unwrap_or(u8::MAX);
            let max = orders.iter().copied().max().unwrap_or(0);
            let order = card.order();
            order + 1 == min || order == max + 1 || (min == 1 && max == 13 && order == 2)
        }
    }
}

/// Sum of point values over a hand's remaining cards.
#[must_use]
pub fn hand_value(cards: &[Card]) -> u32 {
    cards.iter().map(|c| c.value()).sum()
}

/// Sum of point values over a meld's cards, regardless of contributor.
#[must_use]
pub fn meld_value(meld: &Meld) -> u32 {
    meld.cards().map(|c| c.value()).sum()
}

/// Rotate a run into display order: low endpoint first, following ring
/// succession, so K-A-2 lays out as K A 2 rather than A 2 K.
#[must_use]
pub(crate) fn run_layout(cards: &[Card]) -> Vec<Card> {
    let mut sorted = cards.to_vec();
    sorted.sort_unstable_by_key(|c| c.order());
    let orders: Vec<u8> = sorted.iter().map(|c| c.order()).collect();
    match contiguous_rotation(&orders) {
        Some(start) => (0..sorted.len())
            .map(|i| sorted[(start + i) % sorted.len()])
            .collect(),
        None => sorted,
    }
}

/// The rotation index at which sorted, distinct ring positions read as a
/// contiguous sequence, if one exists. Successor on the ring wraps the
/// king back to the ace.
fn contiguous_rotation(orders: &[u8]) -> Option<usize> {
    let n = orders.len();
    (0..n).find(|&start| {
        (1..n).all(|i| {
            let prev = orders[(start + i - 1) % n];
            let curr = orders[(start + i) % n];
            prev % 13 + 1 == curr
        })
    })
}

//! The turn controller: room lifecycle, the draw → act → discard turn
//! machine, and round settlement.
//!
//! Every operation is a deterministic transformation
//! `(&GameState, actor, args) -> Result<GameState, GameError>`: it clones
//! the committed state, mutates the clone, and returns it, so no error
//! path ever observes a partial mutation. Operations that shuffle take
//! the caller's random source.

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt};
use thiserror::Error;

use super::constants;
use super::entities::{
    Card, Deck, DrawSource, GameAction, GameState, GameStatus, Meld, MeldKind, Player,
    PlayerColor, PlayerId, TableCard, TurnPhase, Username,
};
use super::functional;

/// Errors a proposed action can be rejected with. All are user-recoverable
/// and none leave any observable state change behind.
#[derive(Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("not your turn")]
    NotYourTurn,
    #[error("action attempted out of phase")]
    OutOfPhase,
    #[error("cards do not form a set or a run")]
    InvalidMeld,
    #[error("card does not extend that meld")]
    InvalidLayoff,
    #[error("can't discard the card just picked from the discard pile")]
    RepickRestricted,
    #[error("draw pile and discard pile are both exhausted")]
    PilesExhausted,
    #[error("discard pile is empty")]
    EmptyDiscard,
    #[error("state version {expected} is stale; committed version is {actual}")]
    StaleState { expected: u64, actual: u64 },
    #[error("can't deal for {0} players")]
    InvalidPlayerCount(usize),
    #[error("room is {0}")]
    InvalidStatus(GameStatus),
    #[error("card {0} is not in your hand")]
    UnknownCard(Card),
    #[error("no meld at index {0}")]
    UnknownMeld(usize),
    #[error("user already seated")]
    UserAlreadyExists,
    #[error("user is not seated")]
    UserDoesNotExist,
    #[error("room is full")]
    CapacityReached,
    #[error("room does not exist")]
    UnknownRoom,
    #[error("invalid game state: internal consistency error")]
    InternalStateError,
}

/// Events describing accepted transitions, for the host loop to relay.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum GameEvent {
    PlayerJoined(PlayerId),
    PlayerLeft(PlayerId),
    HostChanged(PlayerId),
    RoundStarted { round: u32 },
    PileReshuffled { cards: usize },
    Drew { uid: PlayerId, from_discard: bool },
    Melded { uid: PlayerId, kind: MeldKind },
    LaidOff { uid: PlayerId, meld_index: usize },
    Discarded { uid: PlayerId, card: Card },
    WentOut { uid: PlayerId },
    RoundScored { uid: PlayerId, total: i32 },
    GameOver { winner: PlayerId },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::PlayerJoined(uid) => format!("{uid} joined the room"),
            Self::PlayerLeft(uid) => format!("{uid} left the room"),
            Self::HostChanged(uid) => format!("{uid} is the new host"),
            Self::RoundStarted { round } => format!("round {round} started"),
            Self::PileReshuffled { cards } => {
                format!("discard pile reshuffled into a {cards}-card draw pile")
            }
            Self::Drew {
                uid,
                from_discard: true,
            } => format!("{uid} drew from the discard pile"),
            Self::Drew { uid, .. } => format!("{uid} drew from the draw pile"),
            Self::Melded { uid, kind } => format!("{uid} melded a {kind}"),
            Self::LaidOff { uid, meld_index } => {
                format!("{uid} laid a card onto meld {meld_index}")
            }
            Self::Discarded { uid, card } => format!("{uid} discarded {card}"),
            Self::WentOut { uid } => format!("{uid} went out"),
            Self::RoundScored { uid, total } => format!("{uid} scored {total} this round"),
            Self::GameOver { winner } => format!("game over, {winner} wins"),
        };
        write!(f, "{repr}")
    }
}

/// Room configuration fixed at creation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameSettings {
    /// Cumulative score a round winner must reach to end the game.
    pub target_score: i32,
    pub max_players: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self::new(constants::DEFAULT_TARGET_SCORE, constants::MAX_PLAYERS)
    }
}

impl GameSettings {
    #[must_use]
    pub const fn new(target_score: i32, max_players: usize) -> Self {
        Self {
            target_score,
            max_players,
        }
    }
}

impl GameState {
    /// Seat a new player. Only `Waiting` rooms accept joins.
    pub fn join(&self, actor: &PlayerId, display_name: Username) -> Result<Self, GameError> {
        if self.status != GameStatus::Waiting {
            return Err(GameError::InvalidStatus(self.status));
        }
        if self.seat_of(actor).is_some() {
            return Err(GameError::UserAlreadyExists);
        }
        if self.players.len() >= self.settings.max_players.min(constants::MAX_PLAYERS) {
            return Err(GameError::CapacityReached);
        }

        let mut next = self.clone();
        let color = PlayerColor::ALL[next.players.len() % PlayerColor::ALL.len()];
        next.players
            .push(Player::new(actor.clone(), display_name, color));
        next.events.push_back(GameEvent::PlayerJoined(actor.clone()));
        debug!("{actor} joined; {} seated", next.players.len());
        Ok(next)
    }

    /// Unseat a player. Only `Waiting` rooms accept departures: leaving
    /// mid-round would break card conservation, so the room must finish
    /// the round first. A departing host hands the room to the next seat.
    pub fn leave(&self, actor: &PlayerId) -> Result<Self, GameError> {
        if self.status != GameStatus::Waiting {
            return Err(GameError::InvalidStatus(self.status));
        }
        let seat = self.seat_of(actor).ok_or(GameError::UserDoesNotExist)?;

        let mut next = self.clone();
        next.players.remove(seat);
        next.events.push_back(GameEvent::PlayerLeft(actor.clone()));
        if next.host == *actor {
            if let Some(successor) = next.players.first() {
                next.host = successor.uid.clone();
                next.events
                    .push_back(GameEvent::HostChanged(next.host.clone()));
            }
        }
        Ok(next)
    }

    /// Deal a fresh round: new deck, shuffled, hands dealt by table size,
    /// one card seeding the discard pile, first seat to act. Only the
    /// host may start, and only from `Waiting` or `RoundOver`.
    pub fn start_round<R: Rng + ?Sized>(
        &self,
        actor: &PlayerId,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        if !self.is_host(actor) {
            warn!("{actor} tried to start a round without being host");
            return Err(GameError::NotYourTurn);
        }
        if !matches!(self.status, GameStatus::Waiting | GameStatus::RoundOver) {
            return Err(GameError::InvalidStatus(self.status));
        }
        let count = self.players.len();
        if functional::cards_per_player(count).is_none() {
            return Err(GameError::InvalidPlayerCount(count));
        }

        let mut deck = Deck::standard();
        deck.shuffle(rng);
        let (hands, mut rest) =
            functional::deal(deck.into_cards(), count).ok_or(GameError::InvalidPlayerCount(count))?;
        let top = rest.pop_front().ok_or(GameError::InternalStateError)?;

        let mut colors = PlayerColor::ALL.to_vec();
        {
            use rand::seq::SliceRandom;
            colors.shuffle(rng);
        }

        let mut next = self.clone();
        for ((player, hand), color) in next.players.iter_mut().zip(hands).zip(colors) {
            player.hand = hand;
            player.color = color;
        }
        next.draw_pile = rest;
        next.discard_pile = VecDeque::from([top]);
        next.table_melds.clear();
        let uids: Vec<PlayerId> = next.players.iter().map(|p| p.uid.clone()).collect();
        for uid in uids {
            next.scores.entry(uid).or_insert(0);
        }
        next.round += 1;
        next.current_turn = Some(next.players[0].uid.clone());
        next.turn = TurnPhase::AwaitingDraw;
        next.status = GameStatus::Playing;
        next.events
            .push_back(GameEvent::RoundStarted { round: next.round });
        debug!("round {} dealt for {count} players", next.round);
        Ok(next)
    }

    /// Draw one card from the chosen pile. Exactly one draw per turn,
    /// before any meld, lay-off, or discard.
    ///
    /// An empty draw pile is replenished first by shuffling every discard
    /// but the top back into stock; if the discard pile can't spare a
    /// card either, the turn is stuck and the caller is told so instead
    /// of the piles being corrupted.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        actor: &PlayerId,
        source: DrawSource,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        self.check_active(actor)?;
        if !matches!(self.turn, TurnPhase::AwaitingDraw) {
            warn!("{actor} tried to draw twice");
            return Err(GameError::OutOfPhase);
        }
        if self.draw_pile.is_empty() && self.discard_pile.len() <= 1 {
            return Err(GameError::PilesExhausted);
        }
        if source == DrawSource::Discard && self.discard_pile.is_empty() {
            return Err(GameError::EmptyDiscard);
        }

        let mut next = self.clone();
        if next.draw_pile.is_empty() {
            let top = next
                .discard_pile
                .pop_front()
                .ok_or(GameError::InternalStateError)?;
            let mut stock: Vec<Card> = next.discard_pile.drain(..).collect();
            {
                use rand::seq::SliceRandom;
                stock.shuffle(rng);
            }
            next.draw_pile = stock.into();
            next.discard_pile.push_back(top);
            next.events.push_back(GameEvent::PileReshuffled {
                cards: next.draw_pile.len(),
            });
        }

        let (card, from_discard) = match source {
            DrawSource::Pile => (
                next.draw_pile
                    .pop_front()
                    .ok_or(GameError::InternalStateError)?,
                false,
            ),
            DrawSource::Discard => (
                next.discard_pile
                    .pop_front()
                    .ok_or(GameError::EmptyDiscard)?,
                true,
            ),
        };

        let seat = next.seat_of(actor).ok_or(GameError::InternalStateError)?;
        next.players[seat].hand.push(card);
        next.turn = TurnPhase::Drawn { drawn: card, from_discard };
        next.events.push_back(GameEvent::Drew {
            uid: actor.clone(),
            from_discard,
        });
        debug_assert_eq!(next.cards_in_play(), self.cards_in_play());
        Ok(next)
    }

    /// Lay a new meld from hand onto the table. Repeatable any number of
    /// times after drawing and before discarding. The group must pass the
    /// set check or the run check; set classification wins when both hold.
    pub fn meld(&self, actor: &PlayerId, cards: &[Card]) -> Result<Self, GameError> {
        self.check_active(actor)?;
        if !matches!(self.turn, TurnPhase::Drawn { .. }) {
            warn!("{actor} tried to meld before drawing");
            return Err(GameError::OutOfPhase);
        }
        let seat = self.seat_of(actor).ok_or(GameError::InternalStateError)?;

        let mut remaining = self.players[seat].hand.clone();
        for card in cards {
            let pos = remaining
                .iter()
                .position(|c| c == card)
                .ok_or(GameError::UnknownCard(*card))?;
            remaining.remove(pos);
        }

        let kind = if functional::is_valid_set(cards) {
            MeldKind::Set {
                rank: cards[0].rank,
            }
        } else if functional::is_valid_run(cards) {
            MeldKind::Run {
                suit: cards[0].suit,
            }
        } else {
            return Err(GameError::InvalidMeld);
        };

        let laid_out = match kind {
            MeldKind::Run { .. } => functional::run_layout(cards),
            MeldKind::Set { .. } => cards.to_vec(),
        };

        let mut next = self.clone();
        next.players[seat].hand = remaining;
        next.table_melds.push(Meld {
            kind,
            created_by: actor.clone(),
            cards: laid_out
                .into_iter()
                .map(|card| TableCard {
                    card,
                    added_by: actor.clone(),
                })
                .collect(),
        });
        next.events.push_back(GameEvent::Melded {
            uid: actor.clone(),
            kind,
        });
        debug!("{actor} melded a {kind}");
        debug_assert_eq!(next.cards_in_play(), self.cards_in_play());
        Ok(next)
    }

    /// Extend an existing table meld with one card from hand. The card is
    /// tagged with the contributor, but the meld's creator keeps scoring
    /// credit for it.
    pub fn lay_off(
        &self,
        actor: &PlayerId,
        card: Card,
        meld_index: usize,
    ) -> Result<Self, GameError> {
        self.check_active(actor)?;
        if !matches!(self.turn, TurnPhase::Drawn { .. }) {
            warn!("{actor} tried to lay off before drawing");
            return Err(GameError::OutOfPhase);
        }
        let seat = self.seat_of(actor).ok_or(GameError::InternalStateError)?;
        let meld = self
            .table_melds
            .get(meld_index)
            .ok_or(GameError::UnknownMeld(meld_index))?;
        let pos = self.players[seat]
            .hand
            .iter()
            .position(|c| *c == card)
            .ok_or(GameError::UnknownCard(card))?;
        if !functional::can_lay_off(card, meld) {
            return Err(GameError::InvalidLayoff);
        }

        let mut next = self.clone();
        next.players[seat].hand.remove(pos);
        let tagged = TableCard {
            card,
            added_by: actor.clone(),
        };
        let meld = &mut next.table_melds[meld_index];
        match meld.kind {
            MeldKind::Set { .. } => meld.cards.push(tagged),
            MeldKind::Run { .. } => {
                let min = meld
                    .cards
                    .iter()
                    .map(|tc| tc.card.order())
                    .min()
                    .unwrap_or(u8::MAX);
                if card.order() + 1 == min {
                    meld.cards.insert(0, tagged);
                } else {
                    meld.cards.push(tagged);
                }
            }
        }
        next.events.push_back(GameEvent::LaidOff {
            uid: actor.clone(),
            meld_index,
        });
        debug_assert_eq!(next.cards_in_play(), self.cards_in_play());
        Ok(next)
    }

    /// Discard one card, ending the turn. The sole trigger for advancing
    /// the rotation, unless the discard empties the hand, in which case
    /// the round settles instead.
    pub fn discard(&self, actor: &PlayerId, card: Card) -> Result<Self, GameError> {
        self.check_active(actor)?;
        let TurnPhase::Drawn { drawn, from_discard } = self.turn else {
            warn!("{actor} tried to discard before drawing");
            return Err(GameError::OutOfPhase);
        };
        if from_discard && card == drawn {
            return Err(GameError::RepickRestricted);
        }
        let seat = self.seat_of(actor).ok_or(GameError::InternalStateError)?;
        let pos = self.players[seat]
            .hand
            .iter()
            .position(|c| *c == card)
            .ok_or(GameError::UnknownCard(card))?;

        let mut next = self.clone();
        next.players[seat].hand.remove(pos);
        next.discard_pile.push_front(card);
        next.events.push_back(GameEvent::Discarded {
            uid: actor.clone(),
            card,
        });

        if next.players[seat].hand.is_empty() {
            next.settle_round(actor);
        } else {
            let successor = (seat + 1) % next.players.len();
            next.current_turn = Some(next.players[successor].uid.clone());
            next.turn = TurnPhase::AwaitingDraw;
        }
        debug_assert_eq!(next.cards_in_play(), self.cards_in_play());
        Ok(next)
    }

    /// Dispatch one proposed action.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        actor: &PlayerId,
        action: GameAction,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        match action {
            GameAction::Join { display_name } => self.join(actor, display_name),
            GameAction::Leave => self.leave(actor),
            GameAction::StartRound => self.start_round(actor, rng),
            GameAction::Draw(source) => self.draw(actor, source, rng),
            GameAction::Meld(cards) => self.meld(actor, &cards),
            GameAction::LayOff { card, meld_index } => self.lay_off(actor, card, meld_index),
            GameAction::Discard(card) => self.discard(actor, card),
        }
    }

    /// The game-over winner: highest cumulative score, ties going to the
    /// earliest seat in the rotation. `None` until the game is over.
    #[must_use]
    pub fn winner_of_game(&self) -> Option<PlayerId> {
        if self.status != GameStatus::GameOver {
            return None;
        }
        let mut best: Option<(&Player, i32)> = None;
        for player in &self.players {
            let score = self.scores.get(&player.uid).copied().unwrap_or(0);
            match best {
                Some((_, leading)) if leading >= score => {}
                _ => best = Some((player, score)),
            }
        }
        best.map(|(player, _)| player.uid.clone())
    }

    fn check_active(&self, actor: &PlayerId) -> Result<(), GameError> {
        if self.status != GameStatus::Playing {
            return Err(GameError::InvalidStatus(self.status));
        }
        match &self.current_turn {
            Some(uid) if uid == actor => Ok(()),
            _ => {
                warn!("{actor} acted out of turn");
                Err(GameError::NotYourTurn)
            }
        }
    }

    /// Score the round after `winner` emptied their hand: every player
    /// banks the value of the melds they created, minus what is left in
    /// their hand (winners have nothing left). Reaching the target score
    /// ends the game; otherwise the room waits for the host to deal again.
    fn settle_round(&mut self, winner: &PlayerId) {
        self.events.push_back(GameEvent::WentOut {
            uid: winner.clone(),
        });

        let totals: Vec<(PlayerId, i32)> = self
            .players
            .iter()
            .map(|p| {
                let meld_points: i32 = self
                    .table_melds
                    .iter()
                    .filter(|m| m.created_by == p.uid)
                    .map(|m| functional::meld_value(m) as i32)
                    .sum();
                let total = if p.uid == *winner {
                    meld_points
                } else {
                    meld_points - functional::hand_value(&p.hand) as i32
                };
                (p.uid.clone(), total)
            })
            .collect();

        for (uid, total) in totals {
            *self.scores.entry(uid.clone()).or_insert(0) += total;
            self.events.push_back(GameEvent::RoundScored { uid, total });
        }

        let winner_score = self.scores.get(winner).copied().unwrap_or(0);
        self.turn = TurnPhase::AwaitingDraw;
        if winner_score >= self.settings.target_score {
            self.status = GameStatus::GameOver;
            if let Some(champion) = self.winner_of_game() {
                self.events.push_back(GameEvent::GameOver { winner: champion });
            }
        } else {
            self.status = GameStatus::RoundOver;
        }
        debug!(
            "round {} settled; {winner} went out with {winner_score} banked",
            self.round
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Rank, Suit};
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashMap;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    fn uid(s: &str) -> PlayerId {
        PlayerId::new(s)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn waiting_room(names: &[&str]) -> GameState {
        let mut state = GameState::new(
            uid(names[0]),
            Username::new(names[0]),
            GameSettings::default(),
        );
        for name in &names[1..] {
            state = state.join(&uid(name), Username::new(name)).unwrap();
        }
        state
    }

    /// A two-player mid-turn state with scripted hands and piles, for
    /// rules tests that must not depend on shuffle output.
    fn scripted_state() -> GameState {
        let mut state = waiting_room(&["alice", "bob"]);
        state.status = GameStatus::Playing;
        state.round = 1;
        state.current_turn = Some(uid("alice"));
        state.turn = TurnPhase::AwaitingDraw;
        state.scores = HashMap::from([(uid("alice"), 0), (uid("bob"), 0)]);
        state.players[0].hand = vec![
            card(Rank::Seven, Suit::Spade),
            card(Rank::Seven, Suit::Heart),
            card(Rank::Seven, Suit::Diamond),
            card(Rank::Four, Suit::Club),
        ];
        state.players[1].hand = vec![card(Rank::Ace, Suit::Heart)];
        state.draw_pile = VecDeque::from([
            card(Rank::Two, Suit::Club),
            card(Rank::Three, Suit::Club),
        ]);
        state.discard_pile = VecDeque::from([card(Rank::King, Suit::Diamond)]);
        state
    }

    // === Room lifecycle ===

    #[test]
    fn test_join_and_capacity() {
        let mut state = waiting_room(&["a", "b", "c", "d", "e", "f"]);
        assert_eq!(state.players.len(), 6);
        assert_eq!(
            state.join(&uid("g"), Username::new("g")),
            Err(GameError::CapacityReached)
        );
        assert_eq!(
            state.join(&uid("a"), Username::new("a")),
            Err(GameError::UserAlreadyExists)
        );
        state.status = GameStatus::Playing;
        assert_eq!(
            state.leave(&uid("b")),
            Err(GameError::InvalidStatus(GameStatus::Playing))
        );
    }

    #[test]
    fn test_host_handoff_on_leave() {
        let state = waiting_room(&["alice", "bob"]);
        let state = state.leave(&uid("alice")).unwrap();
        assert_eq!(state.host, uid("bob"));
    }

    // === Round start ===

    #[test]
    fn test_only_host_starts() {
        let state = waiting_room(&["alice", "bob"]);
        assert_eq!(
            state.start_round(&uid("bob"), &mut rng()),
            Err(GameError::NotYourTurn)
        );
    }

    #[test]
    fn test_start_round_deals_and_seeds_discard() {
        let state = waiting_room(&["alice", "bob"]);
        let state = state.start_round(&uid("alice"), &mut rng()).unwrap();

        assert_eq!(state.status, GameStatus::Playing);
        assert_eq!(state.round, 1);
        assert_eq!(state.players[0].hand.len(), 10);
        assert_eq!(state.players[1].hand.len(), 10);
        assert_eq!(state.discard_pile.len(), 1);
        assert_eq!(state.draw_pile.len(), 52 - 20 - 1);
        assert_eq!(state.current_turn, Some(uid("alice")));
        assert_eq!(state.turn, TurnPhase::AwaitingDraw);
        assert_eq!(state.cards_in_play(), 52);
        assert_eq!(state.scores[&uid("alice")], 0);
        assert_eq!(state.scores[&uid("bob")], 0);
    }

    #[test]
    fn test_start_round_rejects_lone_player() {
        let state = waiting_room(&["alice"]);
        assert_eq!(
            state.start_round(&uid("alice"), &mut rng()),
            Err(GameError::InvalidPlayerCount(1))
        );
    }

    #[test]
    fn test_start_round_rejects_mid_round() {
        let state = scripted_state();
        assert_eq!(
            state.start_round(&uid("alice"), &mut rng()),
            Err(GameError::InvalidStatus(GameStatus::Playing))
        );
    }

    // === Turn gating ===

    #[test]
    fn test_only_current_turn_acts() {
        let state = scripted_state();
        assert_eq!(
            state.draw(&uid("bob"), DrawSource::Pile, &mut rng()),
            Err(GameError::NotYourTurn)
        );
    }

    #[test]
    fn test_single_draw_per_turn() {
        let state = scripted_state();
        let state = state.draw(&uid("alice"), DrawSource::Pile, &mut rng()).unwrap();
        assert_eq!(
            state.draw(&uid("alice"), DrawSource::Pile, &mut rng()),
            Err(GameError::OutOfPhase)
        );
    }

    #[test]
    fn test_no_meld_or_discard_before_draw() {
        let state = scripted_state();
        let set = [
            card(Rank::Seven, Suit::Spade),
            card(Rank::Seven, Suit::Heart),
            card(Rank::Seven, Suit::Diamond),
        ];
        assert_eq!(state.meld(&uid("alice"), &set), Err(GameError::OutOfPhase));
        assert_eq!(
            state.discard(&uid("alice"), card(Rank::Four, Suit::Club)),
            Err(GameError::OutOfPhase)
        );
    }

    // === Drawing ===

    #[test]
    fn test_draw_from_pile_and_discard() {
        let state = scripted_state();
        let drawn = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        assert_eq!(drawn.players[0].hand.len(), 5);
        assert_eq!(drawn.draw_pile.len(), 1);
        assert_eq!(
            drawn.turn,
            TurnPhase::Drawn {
                drawn: card(Rank::Two, Suit::Club),
                from_discard: false,
            }
        );

        let picked = state
            .draw(&uid("alice"), DrawSource::Discard, &mut rng())
            .unwrap();
        assert!(picked.discard_pile.is_empty());
        assert_eq!(
            picked.turn,
            TurnPhase::Drawn {
                drawn: card(Rank::King, Suit::Diamond),
                from_discard: true,
            }
        );
    }

    #[test]
    fn test_empty_draw_pile_reshuffles_discard_minus_top() {
        let mut state = scripted_state();
        state.draw_pile.clear();
        state.discard_pile = VecDeque::from([
            card(Rank::King, Suit::Diamond),
            card(Rank::Nine, Suit::Club),
            card(Rank::Ten, Suit::Club),
        ]);

        let drawn = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        // One of the two buried discards moved to the hand, the other is
        // the new stock; the old top still heads the discard pile.
        assert_eq!(drawn.discard_pile.len(), 1);
        assert_eq!(
            drawn.discard_pile.front(),
            Some(&card(Rank::King, Suit::Diamond))
        );
        assert_eq!(drawn.draw_pile.len(), 1);
        assert_eq!(drawn.players[0].hand.len(), 5);
        assert_eq!(drawn.cards_in_play(), state.cards_in_play());
    }

    #[test]
    fn test_stalemate_is_surfaced() {
        let mut state = scripted_state();
        state.draw_pile.clear();
        state.discard_pile = VecDeque::from([card(Rank::King, Suit::Diamond)]);
        assert_eq!(
            state.draw(&uid("alice"), DrawSource::Pile, &mut rng()),
            Err(GameError::PilesExhausted)
        );
        assert_eq!(
            state.draw(&uid("alice"), DrawSource::Discard, &mut rng()),
            Err(GameError::PilesExhausted)
        );
    }

    #[test]
    fn test_draw_from_empty_discard_is_rejected() {
        let mut state = scripted_state();
        state.discard_pile.clear();
        assert_eq!(
            state.draw(&uid("alice"), DrawSource::Discard, &mut rng()),
            Err(GameError::EmptyDiscard)
        );
    }

    // === Melding and laying off ===

    #[test]
    fn test_meld_moves_cards_to_table() {
        let state = scripted_state();
        let state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        let set = [
            card(Rank::Seven, Suit::Spade),
            card(Rank::Seven, Suit::Heart),
            card(Rank::Seven, Suit::Diamond),
        ];
        let state = state.meld(&uid("alice"), &set).unwrap();

        assert_eq!(state.table_melds.len(), 1);
        assert_eq!(
            state.table_melds[0].kind,
            MeldKind::Set { rank: Rank::Seven }
        );
        assert_eq!(state.table_melds[0].created_by, uid("alice"));
        assert_eq!(state.players[0].hand.len(), 2);
    }

    #[test]
    fn test_meld_rejects_cards_not_held() {
        let state = scripted_state();
        let state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        let set = [
            card(Rank::Nine, Suit::Spade),
            card(Rank::Nine, Suit::Heart),
            card(Rank::Nine, Suit::Diamond),
        ];
        assert_eq!(
            state.meld(&uid("alice"), &set),
            Err(GameError::UnknownCard(card(Rank::Nine, Suit::Spade)))
        );
    }

    #[test]
    fn test_meld_rejects_invalid_group() {
        let state = scripted_state();
        let state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        let group = [
            card(Rank::Seven, Suit::Spade),
            card(Rank::Seven, Suit::Heart),
            card(Rank::Four, Suit::Club),
        ];
        assert_eq!(state.meld(&uid("alice"), &group), Err(GameError::InvalidMeld));
    }

    #[test]
    fn test_layoff_tags_contributor_but_keeps_creator() {
        let mut state = scripted_state();
        state.table_melds.push(Meld {
            kind: MeldKind::Set { rank: Rank::Seven },
            created_by: uid("bob"),
            cards: [
                card(Rank::Seven, Suit::Heart),
                card(Rank::Seven, Suit::Diamond),
                card(Rank::Seven, Suit::Club),
            ]
            .into_iter()
            .map(|c| TableCard {
                card: c,
                added_by: uid("bob"),
            })
            .collect(),
        });
        state.players[0].hand = vec![
            card(Rank::Seven, Suit::Spade),
            card(Rank::Four, Suit::Club),
        ];

        let state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        let state = state
            .lay_off(&uid("alice"), card(Rank::Seven, Suit::Spade), 0)
            .unwrap();

        let meld = &state.table_melds[0];
        assert_eq!(meld.created_by, uid("bob"));
        assert_eq!(meld.cards.len(), 4);
        assert_eq!(meld.cards[3].added_by, uid("alice"));
    }

    #[test]
    fn test_layoff_unknown_meld_index() {
        let state = scripted_state();
        let state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        assert_eq!(
            state.lay_off(&uid("alice"), card(Rank::Four, Suit::Club), 3),
            Err(GameError::UnknownMeld(3))
        );
    }

    #[test]
    fn test_run_layoff_attaches_at_matching_end() {
        let mut state = scripted_state();
        state.table_melds.push(Meld {
            kind: MeldKind::Run { suit: Suit::Club },
            created_by: uid("bob"),
            cards: [
                card(Rank::Five, Suit::Club),
                card(Rank::Six, Suit::Club),
                card(Rank::Seven, Suit::Club),
            ]
            .into_iter()
            .map(|c| TableCard {
                card: c,
                added_by: uid("bob"),
            })
            .collect(),
        });

        let state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        let state = state
            .lay_off(&uid("alice"), card(Rank::Four, Suit::Club), 0)
            .unwrap();
        assert_eq!(
            state.table_melds[0].cards[0].card,
            card(Rank::Four, Suit::Club)
        );
    }

    // === Discard and rotation ===

    #[test]
    fn test_discard_advances_rotation_cyclically() {
        let state = scripted_state();
        let state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        let state = state
            .discard(&uid("alice"), card(Rank::Four, Suit::Club))
            .unwrap();

        assert_eq!(state.current_turn, Some(uid("bob")));
        assert_eq!(state.turn, TurnPhase::AwaitingDraw);
        assert_eq!(
            state.discard_pile.front(),
            Some(&card(Rank::Four, Suit::Club))
        );
    }

    #[test]
    fn test_repick_restriction() {
        let state = scripted_state();
        let state = state
            .draw(&uid("alice"), DrawSource::Discard, &mut rng())
            .unwrap();
        assert_eq!(
            state.discard(&uid("alice"), card(Rank::King, Suit::Diamond)),
            Err(GameError::RepickRestricted)
        );
        // A pile draw of the same identity would have been fine; any other
        // card still is.
        assert!(
            state
                .discard(&uid("alice"), card(Rank::Four, Suit::Club))
                .is_ok()
        );
    }

    #[test]
    fn test_discarding_unheld_card_is_rejected() {
        let state = scripted_state();
        let state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        assert_eq!(
            state.discard(&uid("alice"), card(Rank::Queen, Suit::Heart)),
            Err(GameError::UnknownCard(card(Rank::Queen, Suit::Heart)))
        );
    }

    // === Settlement ===

    /// The canonical settlement example: the winner banks a 21-point set
    /// and a 24-point run; the loser banks nothing and eats a 15-point
    /// hand.
    #[test]
    fn test_round_settlement_totals() {
        let mut state = scripted_state();
        state.players[0].hand = vec![card(Rank::Four, Suit::Club)];
        state.players[1].hand = vec![card(Rank::Ace, Suit::Heart)];
        state.turn = TurnPhase::Drawn {
            drawn: card(Rank::Four, Suit::Club),
            from_discard: false,
        };
        state.table_melds = vec![
            Meld {
                kind: MeldKind::Set { rank: Rank::Seven },
                created_by: uid("alice"),
                cards: [
                    card(Rank::Seven, Suit::Heart),
                    card(Rank::Seven, Suit::Diamond),
                    card(Rank::Seven, Suit::Club),
                ]
                .into_iter()
                .map(|c| TableCard {
                    card: c,
                    added_by: uid("alice"),
                })
                .collect(),
            },
            Meld {
                kind: MeldKind::Run { suit: Suit::Spade },
                created_by: uid("alice"),
                cards: [
                    card(Rank::Seven, Suit::Spade),
                    card(Rank::Eight, Suit::Spade),
                    card(Rank::Nine, Suit::Spade),
                ]
                .into_iter()
                .map(|c| TableCard {
                    card: c,
                    added_by: uid("alice"),
                })
                .collect(),
            },
        ];

        let state = state
            .discard(&uid("alice"), card(Rank::Four, Suit::Club))
            .unwrap();

        assert_eq!(state.status, GameStatus::RoundOver);
        assert_eq!(state.scores[&uid("alice")], 45);
        assert_eq!(state.scores[&uid("bob")], -15);
    }

    #[test]
    fn test_game_over_at_exactly_target() {
        let mut state = scripted_state();
        state.players[0].hand = vec![card(Rank::Four, Suit::Club)];
        state.turn = TurnPhase::Drawn {
            drawn: card(Rank::Four, Suit::Club),
            from_discard: false,
        };
        state.table_melds = vec![Meld {
            kind: MeldKind::Run { suit: Suit::Spade },
            created_by: uid("alice"),
            cards: [
                card(Rank::Ace, Suit::Spade),
                card(Rank::Two, Suit::Spade),
                card(Rank::Three, Suit::Spade),
            ]
            .into_iter()
            .map(|c| TableCard {
                card: c,
                added_by: uid("alice"),
            })
            .collect(),
        }];
        // The meld banks 15 + 2 + 3 = 20, landing on the target exactly.
        state.scores.insert(uid("alice"), 480);

        let state = state
            .discard(&uid("alice"), card(Rank::Four, Suit::Club))
            .unwrap();

        assert_eq!(state.scores[&uid("alice")], 500);
        assert_eq!(state.status, GameStatus::GameOver);
        assert_eq!(state.winner_of_game(), Some(uid("alice")));
    }

    #[test]
    fn test_499_does_not_end_the_game() {
        let mut state = scripted_state();
        state.players[0].hand = vec![card(Rank::Four, Suit::Club)];
        state.turn = TurnPhase::Drawn {
            drawn: card(Rank::Four, Suit::Club),
            from_discard: false,
        };
        state.scores.insert(uid("alice"), 499);

        let state = state
            .discard(&uid("alice"), card(Rank::Four, Suit::Club))
            .unwrap();

        assert_eq!(state.scores[&uid("alice")], 499);
        assert_eq!(state.status, GameStatus::RoundOver);
        assert_eq!(state.winner_of_game(), None);
    }

    #[test]
    fn test_tie_break_goes_to_earliest_seat() {
        let mut state = scripted_state();
        state.status = GameStatus::GameOver;
        state.scores.insert(uid("alice"), 500);
        state.scores.insert(uid("bob"), 500);
        assert_eq!(state.winner_of_game(), Some(uid("alice")));
    }

    // === Events ===

    #[test]
    fn test_events_accumulate_and_drain() {
        let state = scripted_state();
        let mut state = state
            .draw(&uid("alice"), DrawSource::Pile, &mut rng())
            .unwrap();
        let events = state.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Drew { from_discard: false, .. }
        )));
        assert!(state.events.is_empty());
    }
}

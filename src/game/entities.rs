use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::{HashMap, VecDeque},
    fmt,
};

use super::constants;
use super::state_machine::GameEvent;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Spade,
    Heart,
    Diamond,
    Club,
}

impl Suit {
    /// Deck construction order (suit-major).
    pub const ALL: [Self; 4] = [Self::Spade, Self::Heart, Self::Diamond, Self::Club];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Spade => "♠",
            Self::Heart => "♥",
            Self::Diamond => "♦",
            Self::Club => "♣",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    /// Deck construction order (rank-minor).
    pub const ALL: [Self; 13] = [
        Self::Ace,
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Ten,
        Self::Jack,
        Self::Queen,
        Self::King,
    ];

    /// Point value used for scoring. Aces are worth 15, court cards 10,
    /// everything else its face value.
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::Ace => 15,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten | Self::Jack | Self::Queen | Self::King => 10,
        }
    }

    /// Position on the 13-rank ring used for runs, ace low. The king's
    /// ring successor is the ace.
    #[must_use]
    pub const fn order(self) -> u8 {
        match self {
            Self::Ace => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten => 10,
            Self::Jack => 11,
            Self::Queen => 12,
            Self::King => 13,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Ace => "A",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            other => return write!(f, "{}", other.order()),
        };
        write!(f, "{repr}")
    }
}

/// A playing card. Identity within a deck is the (rank, suit) pair; the
/// display form (`A♠`, `10♦`, ...) is the card id the room documents use.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    #[must_use]
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.rank.value()
    }

    #[must_use]
    pub const fn order(self) -> u8 {
        self.rank.order()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// A fresh deck of cards, suit-major and rank-minor until shuffled.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Deck(Vec<Card>);

impl Deck {
    /// The canonical 52-card deck in deterministic order.
    #[must_use]
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(constants::DECK_SIZE);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(rank, suit));
            }
        }
        Self(cards)
    }

    /// Uniform in-place Fisher-Yates permutation.
    pub fn shuffle<R: rand::Rng + ?Sized>(&mut self, rng: &mut R) {
        use rand::seq::SliceRandom;
        self.0.shuffle(rng);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.0
    }

    #[must_use]
    pub fn into_cards(self) -> Vec<Card> {
        self.0
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::standard()
    }
}

/// Stable external identity for a participant. Supplied by the caller per
/// action; the engine authorizes against it but never authenticates it.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PlayerId(String);

impl PlayerId {
    #[must_use]
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Display name shown at the table. Sanitized on construction.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Username(String);

impl Username {
    #[must_use]
    pub fn new(s: &str) -> Self {
        let mut username: String = s
            .chars()
            .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
            .collect();
        username.truncate(constants::MAX_USER_INPUT_LENGTH / 2);
        Self(username)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Display-only seat color, reshuffled and dealt out at each round start.
/// The rules never read it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    Cyan,
    Orange,
    Lime,
    Purple,
    Rose,
    Blue,
}

impl PlayerColor {
    pub const ALL: [Self; 6] = [
        Self::Cyan,
        Self::Orange,
        Self::Lime,
        Self::Purple,
        Self::Rose,
        Self::Blue,
    ];
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub uid: PlayerId,
    pub display_name: Username,
    /// Cards held this round. Owned exclusively by this player until
    /// melded, laid off, or discarded.
    pub hand: Vec<Card>,
    pub color: PlayerColor,
    /// Reserved for future bot seats. The rules never read it.
    pub is_bot: bool,
}

impl Player {
    #[must_use]
    pub fn new(uid: PlayerId, display_name: Username, color: PlayerColor) -> Self {
        Self {
            uid,
            display_name,
            hand: Vec::new(),
            color,
            is_bot: false,
        }
    }
}

/// Which shape a meld is, carrying only the data valid for that shape.
/// A set can never hold mixed ranks, nor a run mixed suits.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeldKind {
    Set { rank: Rank },
    Run { suit: Suit },
}

impl fmt::Display for MeldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Set { rank } => format!("set of {rank}s"),
            Self::Run { suit } => format!("{suit} run"),
        };
        write!(f, "{repr}")
    }
}

/// A card on the table, tagged with whoever contributed it. Contribution
/// affects display only; scoring credits the meld's creator.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableCard {
    pub card: Card,
    pub added_by: PlayerId,
}

/// A face-up meld. Once created it is never removed, only extended.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Meld {
    pub kind: MeldKind,
    /// Originating player, credited for this meld at settlement no matter
    /// who lays cards onto it later.
    pub created_by: PlayerId,
    pub cards: Vec<TableCard>,
}

impl Meld {
    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.cards.iter().map(|tc| tc.card)
    }
}

impl fmt::Display for Meld {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cards = self
            .cards
            .iter()
            .map(|tc| tc.card.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{} [{cards}]", self.kind)
    }
}

/// Room-level lifecycle. Transitions are one-directional within a round;
/// a fresh deal re-enters `Playing`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Playing,
    RoundOver,
    GameOver,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::RoundOver => "round_over",
            Self::GameOver => "game_over",
        };
        write!(f, "{repr}")
    }
}

/// Per-turn sub-state for the active player. `Drawn` records the identity
/// and provenance of the card taken this turn so a discard-pile pick can't
/// bounce straight back onto the discard pile.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TurnPhase {
    AwaitingDraw,
    Drawn { drawn: Card, from_discard: bool },
}

/// Where the active player draws from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawSource {
    Pile,
    Discard,
}

impl fmt::Display for DrawSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Pile => "draw pile",
            Self::Discard => "discard pile",
        };
        write!(f, "{repr}")
    }
}

/// An intended state transition, proposed by one acting identity.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum GameAction {
    Join { display_name: Username },
    Leave,
    StartRound,
    Draw(DrawSource),
    Meld(Vec<Card>),
    LayOff { card: Card, meld_index: usize },
    Discard(Card),
}

impl fmt::Display for GameAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Join { display_name } => format!("join as {display_name}"),
            Self::Leave => "leave".to_string(),
            Self::StartRound => "start a round".to_string(),
            Self::Draw(source) => format!("draw from the {source}"),
            Self::Meld(cards) => format!("meld {} cards", cards.len()),
            Self::LayOff { card, meld_index } => {
                format!("lay {card} onto meld {meld_index}")
            }
            Self::Discard(card) => format!("discard {card}"),
        };
        write!(f, "{repr}")
    }
}

/// The authoritative record for one room. Mutated exclusively through the
/// state machine operations; every operation returns a fresh state and
/// leaves its input untouched.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameState {
    /// The only player allowed to start rounds. Reassigned if the host
    /// leaves before play begins.
    pub host: PlayerId,
    pub settings: super::state_machine::GameSettings,
    /// Fixed seating order for turn rotation.
    pub players: Vec<Player>,
    /// Face-down stock; front is the top.
    pub draw_pile: VecDeque<Card>,
    /// Face-up discard stack; front is the top.
    pub discard_pile: VecDeque<Card>,
    pub table_melds: Vec<Meld>,
    /// Player to act. `None` until the first deal.
    pub current_turn: Option<PlayerId>,
    pub turn: TurnPhase,
    /// Cumulative scores. The only record that survives across rounds.
    pub scores: HashMap<PlayerId, i32>,
    pub status: GameStatus,
    pub round: u32,
    /// Pending events describing accepted transitions, drained by the
    /// host loop.
    pub events: VecDeque<GameEvent>,
}

impl GameState {
    /// A fresh `Waiting` room with the host seated alone.
    #[must_use]
    pub fn new(
        host: PlayerId,
        host_name: Username,
        settings: super::state_machine::GameSettings,
    ) -> Self {
        let seat = Player::new(host.clone(), host_name, PlayerColor::ALL[0]);
        Self {
            host,
            settings,
            players: vec![seat],
            draw_pile: VecDeque::new(),
            discard_pile: VecDeque::new(),
            table_melds: Vec::new(),
            current_turn: None,
            turn: TurnPhase::AwaitingDraw,
            scores: HashMap::new(),
            status: GameStatus::Waiting,
            round: 0,
            events: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn is_host(&self, uid: &PlayerId) -> bool {
        self.host == *uid
    }

    #[must_use]
    pub fn seat_of(&self, uid: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.uid == *uid)
    }

    #[must_use]
    pub fn player(&self, uid: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.uid == *uid)
    }

    /// Total cards across hands, piles, and melds. Always 52 while a
    /// round is underway.
    #[must_use]
    pub fn cards_in_play(&self) -> usize {
        self.players.iter().map(|p| p.hand.len()).sum::<usize>()
            + self.draw_pile.len()
            + self.discard_pile.len()
            + self.table_melds.iter().map(|m| m.cards.len()).sum::<usize>()
    }

    /// Hand pending events to the host loop.
    pub fn drain_events(&mut self) -> VecDeque<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// A redacted snapshot for one participant: only the viewer's hand is
    /// card-visible, other seats expose their hand size.
    #[must_use]
    pub fn view_for(&self, viewer: &PlayerId) -> GameView {
        GameView {
            status: self.status,
            round: self.round,
            current_turn: self.current_turn.clone(),
            turn: self.turn,
            draw_pile_len: self.draw_pile.len(),
            discard_top: self.discard_pile.front().copied(),
            table_melds: self.table_melds.clone(),
            scores: self.scores.clone(),
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    uid: p.uid.clone(),
                    display_name: p.display_name.clone(),
                    color: p.color,
                    is_bot: p.is_bot,
                    hand_len: p.hand.len(),
                    hand: (p.uid == *viewer).then(|| p.hand.clone()),
                })
                .collect(),
        }
    }

    /// Views for every seated player.
    #[must_use]
    pub fn views(&self) -> HashMap<PlayerId, GameView> {
        self.players
            .iter()
            .map(|p| (p.uid.clone(), self.view_for(&p.uid)))
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlayerView {
    pub uid: PlayerId,
    pub display_name: Username,
    pub color: PlayerColor,
    pub is_bot: bool,
    pub hand_len: usize,
    /// Present only for the viewer's own seat.
    pub hand: Option<Vec<Card>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GameView {
    pub status: GameStatus,
    pub round: u32,
    pub current_turn: Option<PlayerId>,
    pub turn: TurnPhase,
    pub draw_pile_len: usize,
    pub discard_top: Option<Card>,
    pub table_melds: Vec<Meld>,
    pub scores: HashMap<PlayerId, i32>,
    pub players: Vec<PlayerView>,
}

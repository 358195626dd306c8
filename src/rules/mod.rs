//! The Durak rules engine: pure functions over an in-memory `GameState`.
//! No I/O; every public entry point here is synchronous.

pub mod actions;
pub mod card;
pub mod deck;
pub mod state;
pub mod view;

pub use actions::{apply, Action, RulesError};
pub use card::{beats, Card, CardParseError, Rank, Suit};
pub use deck::DeckSize;
pub use state::{deal_from_deck, new_game, GameMode, GameState, Phase, RoomConfig, TablePair};
pub use view::{view_for, GameView};

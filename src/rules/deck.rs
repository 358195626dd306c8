use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

use super::card::{Card, Rank, Suit};

/// Wire form is the integer domain `{24,36}` per spec.md §3/§6, not a
/// named variant — a client POSTs `{"deckSize":24}`, never `"small"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum DeckSize {
    Small,
    Full,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("deck size must be 24 or 36")]
pub struct DeckSizeParseError;

impl DeckSize {
    pub fn card_count(self) -> usize {
        match self {
            DeckSize::Small => 24,
            DeckSize::Full => 36,
        }
    }

    fn ranks(self) -> std::ops::RangeInclusive<u8> {
        match self {
            DeckSize::Small => 9..=14,
            DeckSize::Full => 6..=14,
        }
    }
}

impl TryFrom<u16> for DeckSize {
    type Error = DeckSizeParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            24 => Ok(DeckSize::Small),
            36 => Ok(DeckSize::Full),
            _ => Err(DeckSizeParseError),
        }
    }
}

impl From<DeckSize> for u16 {
    fn from(size: DeckSize) -> u16 {
        size.card_count() as u16
    }
}

/// Builds an unshuffled deck in canonical (suit, rank) order.
pub fn build_deck(size: DeckSize) -> Vec<Card> {
    let mut deck = Vec::with_capacity(size.card_count());
    for suit in Suit::ALL {
        for rank_value in size.ranks() {
            deck.push(Card::new(suit, Rank::new(rank_value).expect("rank in range")));
        }
    }
    deck
}

/// Shuffles the deck using a cryptographically-seeded PRNG, one instance per game.
pub fn shuffle(deck: &mut [Card]) {
    let mut rng = StdRng::from_entropy();
    deck.shuffle(&mut rng);
}

#[cfg(test)]
pub fn shuffle_with_rng<R: rand::Rng>(deck: &mut [Card], rng: &mut R) {
    deck.shuffle(rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn small_deck_has_24_unique_cards() {
        let deck = build_deck(DeckSize::Small);
        assert_eq!(deck.len(), 24);
        assert_eq!(deck.iter().collect::<HashSet<_>>().len(), 24);
        assert!(deck.iter().all(|c| c.rank.value() >= 9));
    }

    #[test]
    fn full_deck_has_36_unique_cards() {
        let deck = build_deck(DeckSize::Full);
        assert_eq!(deck.len(), 36);
        assert_eq!(deck.iter().collect::<HashSet<_>>().len(), 36);
        assert!(deck.iter().all(|c| c.rank.value() >= 6));
    }

    #[test]
    fn wire_form_is_the_integer_domain() {
        assert_eq!(serde_json::to_string(&DeckSize::Small).unwrap(), "24");
        assert_eq!(serde_json::to_string(&DeckSize::Full).unwrap(), "36");
        assert_eq!(serde_json::from_str::<DeckSize>("24").unwrap(), DeckSize::Small);
        assert_eq!(serde_json::from_str::<DeckSize>("36").unwrap(), DeckSize::Full);
        assert!(serde_json::from_str::<DeckSize>("25").is_err());
    }
}

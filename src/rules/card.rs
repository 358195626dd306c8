use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    fn letter(self) -> char {
        match self {
            Suit::Spades => 'S',
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
        }
    }

    fn from_letter(c: char) -> Option<Suit> {
        match c {
            'S' => Some(Suit::Spades),
            'H' => Some(Suit::Hearts),
            'D' => Some(Suit::Diamonds),
            'C' => Some(Suit::Clubs),
            _ => None,
        }
    }
}

/// Card rank, 6..14 with 11=J, 12=Q, 13=K, 14=A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rank(u8);

impl Rank {
    pub const MIN: u8 = 6;
    pub const MAX: u8 = 14;

    pub fn new(value: u8) -> Option<Rank> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Rank(value))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    fn token_char(self) -> String {
        match self.0 {
            11 => "J".to_string(),
            12 => "Q".to_string(),
            13 => "K".to_string(),
            14 => "A".to_string(),
            n => n.to_string(),
        }
    }

    fn from_token(s: &str) -> Option<Rank> {
        let value = match s {
            "J" => 11,
            "Q" => 12,
            "K" => 13,
            "A" => 14,
            digits => digits.parse::<u8>().ok()?,
        };
        Rank::new(value)
    }
}

impl TryFrom<u8> for Rank {
    type Error = CardParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rank::new(value).ok_or(CardParseError::BadRank)
    }
}

impl From<Rank> for u8 {
    fn from(r: Rank) -> u8 {
        r.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Card {
        Card { suit, rank }
    }

    pub fn is_trump(self, trump_suit: Suit) -> bool {
        self.suit == trump_suit
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CardParseError {
    #[error("card token too short")]
    TooShort,
    #[error("unknown suit letter")]
    BadSuit,
    #[error("rank out of range")]
    BadRank,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.suit.letter(), self.rank.token_char())
    }
}

impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let suit_char = chars.next().ok_or(CardParseError::TooShort)?;
        let suit = Suit::from_letter(suit_char).ok_or(CardParseError::BadSuit)?;
        let rest: String = chars.collect();
        if rest.is_empty() {
            return Err(CardParseError::TooShort);
        }
        let rank = Rank::from_token(&rest).ok_or(CardParseError::BadRank)?;
        Ok(Card::new(suit, rank))
    }
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `d` beats `a` iff same suit and higher rank, or `d` is trump and `a` is not.
pub fn beats(d: Card, a: Card, trump_suit: Suit) -> bool {
    if d.suit == a.suit {
        d.rank > a.rank
    } else {
        d.suit == trump_suit && a.suit != trump_suit
    }
}

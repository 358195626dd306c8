use std::collections::HashMap;

use serde::Serialize;

use crate::types::PlayerId;

use super::actions::{apply, Action};
use super::card::{Card, Suit};
use super::state::{GameState, Phase, TablePair};

/// Flags telling a client which action *types* it could currently attempt.
/// Computed by brute-force trial of every action against every card the
/// player holds — a pure function of `(GameState, PlayerId)`, per DESIGN
/// NOTES §9, so the view-privacy invariant holds mechanically: there is no
/// path from here back into another player's hand.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedActions {
    pub attack: bool,
    pub defend: bool,
    pub transfer: bool,
    pub take: bool,
    pub pass: bool,
    pub beat: bool,
}

pub fn allowed_actions(state: &GameState, player: PlayerId) -> AllowedActions {
    if state.phase == Phase::Finished {
        return AllowedActions::default();
    }
    let hand = match state.hands.get(&player) {
        Some(h) => h.clone(),
        None => return AllowedActions::default(),
    };

    let attack = hand
        .iter()
        .any(|c| apply(state, player, &Action::Attack { card: *c }).is_ok());
    let transfer = hand
        .iter()
        .any(|c| apply(state, player, &Action::Transfer { card: *c }).is_ok());
    let defend = (0..state.table.len()).any(|idx| {
        hand.iter()
            .any(|c| apply(state, player, &Action::Defend { attack_index: idx, card: *c }).is_ok())
    });
    let take = apply(state, player, &Action::Take).is_ok();
    let pass = apply(state, player, &Action::Pass).is_ok();
    let beat = apply(state, player, &Action::Beat).is_ok();

    AllowedActions { attack, defend, transfer, take, pass, beat }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePairView {
    pub attack: Card,
    pub defense: Option<Card>,
}

impl From<&TablePair> for TablePairView {
    fn from(p: &TablePair) -> Self {
        TablePairView { attack: p.attack, defense: p.defense }
    }
}

/// The view sent to one player: public fields visible to everyone in the
/// room, plus private fields (`your_hand`, `allowed`) that exist only in
/// the frame addressed to that player. `GameState` itself is never sent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub order: Vec<PlayerId>,
    pub hand_counts: HashMap<PlayerId, usize>,
    pub table: Vec<TablePairView>,
    pub discard_count: usize,
    pub trump_suit: Suit,
    pub trump_card: Card,
    pub deck_count: usize,
    pub attacker_id: PlayerId,
    pub defender_id: PlayerId,
    pub take_declared: bool,
    pub passed: Vec<PlayerId>,
    pub phase: &'static str,
    pub loser: Option<PlayerId>,
    pub your_hand: Vec<Card>,
    pub allowed: AllowedActions,
}

pub fn view_for(state: &GameState, player: PlayerId) -> GameView {
    let hand_counts = state.order.iter().map(|p| (*p, state.hands.get(p).map(|h| h.len()).unwrap_or(0))).collect();
    let your_hand = state.hands.get(&player).cloned().unwrap_or_default();
    GameView {
        order: state.order.clone(),
        hand_counts,
        table: state.table.iter().map(TablePairView::from).collect(),
        discard_count: state.discard.len(),
        trump_suit: state.trump_suit,
        trump_card: state.trump_card,
        deck_count: state.deck.len(),
        attacker_id: state.attacker_id,
        defender_id: state.defender_id,
        take_declared: state.take_declared,
        passed: state.passed.iter().copied().collect(),
        phase: match state.phase {
            Phase::Playing => "playing",
            Phase::Finished => "finished",
        },
        loser: state.loser,
        your_hand,
        allowed: allowed_actions(state, player),
    }
}

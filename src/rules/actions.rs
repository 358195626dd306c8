use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::types::PlayerId;

use super::card::Card;
use super::state::{attack_ranks, next_active, rank_set, GameMode, GameState, Phase, TablePair};

/// One validated candidate event a client may submit. Decoded once from
/// the wire frame into this closed variant set rather than dispatched on
/// a stringly-typed `type` field at every call site (see DESIGN NOTES §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Attack { card: Card },
    Defend { attack_index: usize, card: Card },
    Transfer { card: Card },
    Take,
    Pass,
    Beat,
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum RulesError {
    #[error("game is not in the playing phase")]
    GameNotPlaying,
    #[error("game has already finished")]
    GameFinished,
    #[error("player is not active in this game")]
    NotActive,
    #[error("the defender cannot attack")]
    DefenderCannotAttack,
    #[error("the defender cannot pass")]
    DefenderCannotPass,
    #[error("only the defender can defend")]
    OnlyDefenderCanDefend,
    #[error("only the defender can take")]
    OnlyDefenderCanTake,
    #[error("only the defender can declare beat")]
    OnlyDefenderCanBeat,
    #[error("only the defender can transfer")]
    OnlyDefenderCanTransfer,
    #[error("player already passed this round")]
    YouPassed,
    #[error("card is not in hand")]
    CardNotInHand,
    #[error("round limit reached")]
    RoundLimit,
    #[error("only the main attacker may open the round")]
    OnlyMainAttackerStarts,
    #[error("rank is not present on the table")]
    RankNotOnTable,
    #[error("defender must respond before another attack")]
    DefenderMustRespond,
    #[error("attack index is out of range")]
    BadAttackIndex,
    #[error("that attack is already defended")]
    AlreadyDefended,
    #[error("card does not beat the attack")]
    DoesNotBeat,
    #[error("transfer is only available in perevodnoy")]
    ModeNotPerevodnoy,
    #[error("take has already been declared")]
    TakeAlreadyDeclared,
    #[error("nothing on the table to transfer")]
    NothingToTransfer,
    #[error("cannot transfer once a pair is defended")]
    CannotTransferAfterDefend,
    #[error("transfer rank must match an attack rank on the table")]
    RankMustMatchAttack,
    #[error("nothing on the table")]
    NothingOnTable,
    #[error("table is not fully defended")]
    NotFullyDefended,
    #[error("not every attacker has passed")]
    AttackersNotPassed,
}

impl RulesError {
    pub fn code(self) -> ErrorCode {
        match self {
            RulesError::GameNotPlaying => ErrorCode::GameNotPlaying,
            RulesError::GameFinished => ErrorCode::GameFinished,
            RulesError::NotActive => ErrorCode::NotActive,
            RulesError::DefenderCannotAttack => ErrorCode::DefenderCannotAttack,
            RulesError::DefenderCannotPass => ErrorCode::DefenderCannotPass,
            RulesError::OnlyDefenderCanDefend => ErrorCode::OnlyDefenderCanDefend,
            RulesError::OnlyDefenderCanTake => ErrorCode::OnlyDefenderCanTake,
            RulesError::OnlyDefenderCanBeat => ErrorCode::OnlyDefenderCanBeat,
            RulesError::OnlyDefenderCanTransfer => ErrorCode::OnlyDefenderCanTransfer,
            RulesError::YouPassed => ErrorCode::YouPassed,
            RulesError::CardNotInHand => ErrorCode::CardNotInHand,
            RulesError::RoundLimit => ErrorCode::RoundLimit,
            RulesError::OnlyMainAttackerStarts => ErrorCode::OnlyMainAttackerStarts,
            RulesError::RankNotOnTable => ErrorCode::RankNotOnTable,
            RulesError::DefenderMustRespond => ErrorCode::DefenderMustRespond,
            RulesError::BadAttackIndex => ErrorCode::BadAttackIndex,
            RulesError::AlreadyDefended => ErrorCode::AlreadyDefended,
            RulesError::DoesNotBeat => ErrorCode::DoesNotBeat,
            RulesError::ModeNotPerevodnoy => ErrorCode::ModeNotPerevodnoy,
            RulesError::TakeAlreadyDeclared => ErrorCode::TakeAlreadyDeclared,
            RulesError::NothingToTransfer => ErrorCode::NothingToTransfer,
            RulesError::CannotTransferAfterDefend => ErrorCode::CannotTransferAfterDefend,
            RulesError::RankMustMatchAttack => ErrorCode::RankMustMatchAttack,
            RulesError::NothingOnTable => ErrorCode::NothingOnTable,
            RulesError::NotFullyDefended => ErrorCode::NotFullyDefended,
            RulesError::AttackersNotPassed => ErrorCode::AttackersNotPassed,
        }
    }
}

/// Validates `action` for `player` against `state` and, if legal, returns
/// the resulting state. Never mutates `state` in place: the room actor
/// relies on the old value surviving untouched on `Err` so it can surface
/// a typed error without any state change.
pub fn apply(state: &GameState, player: PlayerId, action: &Action) -> Result<GameState, RulesError> {
    if state.phase == Phase::Finished {
        return Err(RulesError::GameFinished);
    }
    if !*state.active.get(&player).unwrap_or(&false) {
        return Err(RulesError::NotActive);
    }

    let mut next = state.clone();
    match action {
        Action::Attack { card } => do_attack(&mut next, player, *card)?,
        Action::Defend { attack_index, card } => do_defend(&mut next, player, *attack_index, *card)?,
        Action::Transfer { card } => do_transfer(&mut next, player, *card)?,
        Action::Take => do_take(&mut next, player)?,
        Action::Pass => do_pass(&mut next, player)?,
        Action::Beat => do_beat(&mut next, player)?,
    }
    Ok(next)
}

fn do_attack(state: &mut GameState, player: PlayerId, card: Card) -> Result<(), RulesError> {
    if player == state.defender_id {
        return Err(RulesError::DefenderCannotAttack);
    }
    if state.passed.contains(&player) {
        return Err(RulesError::YouPassed);
    }
    if !state.card_in_hand(player, card) {
        return Err(RulesError::CardNotInHand);
    }
    if state.table.len() >= state.round_limit {
        return Err(RulesError::RoundLimit);
    }
    if state.table.is_empty() {
        if player != state.attacker_id {
            return Err(RulesError::OnlyMainAttackerStarts);
        }
    } else {
        if !rank_set(&state.table).contains(&card.rank.value()) {
            return Err(RulesError::RankNotOnTable);
        }
        let undefended_pending = state.table.iter().any(|p| p.defense.is_none());
        if !state.take_declared && undefended_pending {
            return Err(RulesError::DefenderMustRespond);
        }
    }

    state.remove_from_hand(player, card);
    state.table.push(TablePair { attack: card, defense: None });
    Ok(())
}

fn do_defend(state: &mut GameState, player: PlayerId, attack_index: usize, card: Card) -> Result<(), RulesError> {
    if player != state.defender_id {
        return Err(RulesError::OnlyDefenderCanDefend);
    }
    if state.take_declared {
        return Err(RulesError::TakeAlreadyDeclared);
    }
    let pair = state.table.get(attack_index).ok_or(RulesError::BadAttackIndex)?;
    if pair.defense.is_some() {
        return Err(RulesError::AlreadyDefended);
    }
    if !state.card_in_hand(player, card) {
        return Err(RulesError::CardNotInHand);
    }
    if !state.defender_beats(card, pair.attack) {
        return Err(RulesError::DoesNotBeat);
    }

    state.remove_from_hand(player, card);
    state.table[attack_index].defense = Some(card);
    maybe_resolve_round(state);
    Ok(())
}

fn do_transfer(state: &mut GameState, player: PlayerId, card: Card) -> Result<(), RulesError> {
    if player != state.defender_id {
        return Err(RulesError::OnlyDefenderCanTransfer);
    }
    if state.config.mode != GameMode::Perevodnoy {
        return Err(RulesError::ModeNotPerevodnoy);
    }
    if state.take_declared {
        return Err(RulesError::TakeAlreadyDeclared);
    }
    if state.table.is_empty() {
        return Err(RulesError::NothingToTransfer);
    }
    if state.table.iter().any(|p| p.defense.is_some()) {
        return Err(RulesError::CannotTransferAfterDefend);
    }
    if !state.card_in_hand(player, card) {
        return Err(RulesError::CardNotInHand);
    }
    if !attack_ranks(&state.table).contains(&card.rank.value()) {
        return Err(RulesError::RankMustMatchAttack);
    }

    state.remove_from_hand(player, card);
    state.table.push(TablePair { attack: card, defense: None });

    let new_attacker = state.defender_id;
    let new_defender = next_active(&state.order, &state.active, new_attacker);
    state.attacker_id = new_attacker;
    state.defender_id = new_defender;
    state.recompute_round_limit();
    Ok(())
}

fn do_take(state: &mut GameState, player: PlayerId) -> Result<(), RulesError> {
    if player != state.defender_id {
        return Err(RulesError::OnlyDefenderCanTake);
    }
    if state.table.is_empty() {
        return Err(RulesError::NothingOnTable);
    }
    if state.take_declared {
        return Err(RulesError::TakeAlreadyDeclared);
    }
    state.take_declared = true;
    maybe_resolve_round(state);
    Ok(())
}

fn do_pass(state: &mut GameState, player: PlayerId) -> Result<(), RulesError> {
    if player == state.defender_id {
        return Err(RulesError::DefenderCannotPass);
    }
    if state.table.is_empty() {
        return Err(RulesError::NothingOnTable);
    }
    if state.passed.contains(&player) {
        return Err(RulesError::YouPassed);
    }
    state.passed.insert(player);
    maybe_resolve_round(state);
    Ok(())
}

fn do_beat(state: &mut GameState, player: PlayerId) -> Result<(), RulesError> {
    if player != state.defender_id {
        return Err(RulesError::OnlyDefenderCanBeat);
    }
    if !fully_defended(state) {
        return Err(RulesError::NotFullyDefended);
    }
    if !all_attackers_passed(state) {
        return Err(RulesError::AttackersNotPassed);
    }
    resolve_beat(state);
    Ok(())
}

fn fully_defended(state: &GameState) -> bool {
    !state.table.is_empty() && state.table.iter().all(|p| p.defense.is_some())
}

fn all_attackers_passed(state: &GameState) -> bool {
    state
        .order
        .iter()
        .filter(|p| **p != state.defender_id && *state.active.get(*p).unwrap_or(&false))
        .all(|p| state.passed.contains(p))
}

/// Round resolution is triggered either explicitly by BEAT, or implicitly
/// once the defender has declared TAKE and every attacker has passed.
fn maybe_resolve_round(state: &mut GameState) {
    if state.take_declared && all_attackers_passed(state) {
        resolve_take(state);
    }
}

fn resolve_beat(state: &mut GameState) {
    for pair in state.table.drain(..) {
        state.discard.insert(pair.attack);
        if let Some(d) = pair.defense {
            state.discard.insert(d);
        }
    }
    let order = state.refill_order_ending_with(state.attacker_id, state.defender_id);
    state.refill_to_six(&order);

    let new_attacker = state.defender_id;
    let new_defender = next_active(&state.order, &state.active, new_attacker);
    state.attacker_id = new_attacker;
    state.defender_id = new_defender;
    state.reset_round();
    state.check_terminal();
}

fn resolve_take(state: &mut GameState) {
    let taker = state.defender_id;
    let old_attacker = state.attacker_id;
    for pair in state.table.drain(..) {
        state.hands.get_mut(&taker).expect("taker has a hand").push(pair.attack);
        if let Some(d) = pair.defense {
            state.hands.get_mut(&taker).expect("taker has a hand").push(d);
        }
    }
    if let Some(hand) = state.hands.get_mut(&taker) {
        hand.sort_by_key(|c| (c.suit, c.rank));
    }

    let order = if state.config.taker_skips_refill {
        state.refill_order_excluding(old_attacker, taker)
    } else {
        state.refill_order_ending_with(old_attacker, taker)
    };
    state.refill_to_six(&order);

    let new_attacker = next_active(&state.order, &state.active, taker);
    let new_defender = next_active(&state.order, &state.active, new_attacker);
    state.attacker_id = new_attacker;
    state.defender_id = new_defender;
    state.reset_round();
    state.check_terminal();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::card::{Rank, Suit};
    use crate::rules::deck::DeckSize;
    use crate::rules::state::deal_from_deck;
    use uuid::Uuid;

    fn rc(mode: GameMode) -> super::super::state::RoomConfig {
        super::super::state::RoomConfig { mode, deck_size: DeckSize::Full, max_players: 2, taker_skips_refill: false }
    }

    fn card(s: Suit, r: u8) -> Card {
        Card::new(s, Rank::new(r).unwrap())
    }

    /// Hand-crafted deck: enough distinct cards for a 2p 36-card deal plus a
    /// known trump. Built back-to-front since dealing pops from the end.
    fn seeded_deck(trump: Suit) -> Vec<Card> {
        let mut deck = Vec::new();
        // trump card ends up at index 0
        deck.push(card(trump, 6));
        // 12 cards to deal (6 each for 2 players), dealt in round-robin by
        // popping from the end, so push the *last* dealt card first.
        let fillers = [
            card(Suit::Clubs, 9),
            card(Suit::Clubs, 10),
            card(Suit::Clubs, 11),
            card(Suit::Clubs, 12),
            card(Suit::Clubs, 13),
            card(Suit::Clubs, 14),
            card(Suit::Diamonds, 9),
            card(Suit::Diamonds, 10),
            card(Suit::Diamonds, 11),
            card(Suit::Diamonds, 12),
            card(Suit::Diamonds, 13),
            card(Suit::Diamonds, 14),
        ];
        for c in fillers {
            deck.push(c);
        }
        // remaining stock cards, drawn during refills
        for r in 6..=8u8 {
            deck.push(card(Suit::Hearts, r));
            deck.push(card(Suit::Spades, r));
        }
        deck
    }

    #[test]
    fn simple_attack_defend_beat_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let order = vec![a, b];
        let deck = seeded_deck(Suit::Spades);
        let mut state = deal_from_deck(rc(GameMode::Podkidnoy), order, deck);
        state.attacker_id = a;
        state.defender_id = b;
        state.hands.insert(a, vec![card(Suit::Clubs, 9)]);
        state.hands.insert(b, vec![card(Suit::Clubs, 10)]);
        state.round_limit = 6;

        let s1 = apply(&state, a, &Action::Attack { card: card(Suit::Clubs, 9) }).unwrap();
        assert_eq!(s1.table.len(), 1);

        let s2 = apply(&s1, b, &Action::Defend { attack_index: 0, card: card(Suit::Clubs, 10) }).unwrap();
        assert!(s2.table[0].defense.is_some());

        let s3 = apply(&s2, a, &Action::Pass).unwrap();
        let s4 = apply(&s3, b, &Action::Beat).unwrap();
        assert!(s4.table.is_empty());
        assert_eq!(s4.attacker_id, b);
        assert_eq!(s4.defender_id, a);
        assert_eq!(s4.discard.len(), 2);
    }

    #[test]
    fn rank_not_on_table_is_rejected() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let order = vec![a, b];
        let deck = seeded_deck(Suit::Spades);
        let mut state = deal_from_deck(rc(GameMode::Podkidnoy), order, deck);
        state.attacker_id = a;
        state.defender_id = b;
        state.hands.insert(a, vec![card(Suit::Clubs, 6), card(Suit::Diamonds, 9)]);
        state.hands.insert(b, vec![card(Suit::Clubs, 10)]);
        state.round_limit = 6;

        let s1 = apply(&state, a, &Action::Attack { card: card(Suit::Clubs, 6) }).unwrap();
        let s2 = apply(&s1, b, &Action::Defend { attack_index: 0, card: card(Suit::Clubs, 10) }).unwrap();
        let err = apply(&s2, a, &Action::Attack { card: card(Suit::Diamonds, 9) }).unwrap_err();
        assert_eq!(err, RulesError::RankNotOnTable);
    }

    #[test]
    fn take_path_two_players_attacker_unchanged() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let order = vec![a, b];
        let deck = seeded_deck(Suit::Spades);
        let mut state = deal_from_deck(rc(GameMode::Podkidnoy), order, deck);
        state.attacker_id = a;
        state.defender_id = b;
        state.hands.insert(a, vec![card(Suit::Clubs, 9)]);
        state.hands.insert(b, vec![card(Suit::Diamonds, 6)]);
        state.round_limit = 6;

        let s1 = apply(&state, a, &Action::Attack { card: card(Suit::Clubs, 9) }).unwrap();
        let s2 = apply(&s1, b, &Action::Take).unwrap();
        let s3 = apply(&s2, a, &Action::Pass).unwrap();
        assert!(s3.table.is_empty());
        assert_eq!(s3.attacker_id, a);
        assert_eq!(s3.defender_id, b);
        assert!(s3.hands[&b].contains(&card(Suit::Clubs, 9)));
    }

    #[test]
    fn transfer_rotates_defender_and_clamps_round_limit() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let order = vec![a, b, c];
        let deck = seeded_deck(Suit::Spades);
        let mut state = deal_from_deck(rc(GameMode::Perevodnoy), order, deck);
        state.attacker_id = a;
        state.defender_id = b;
        state.hands.insert(a, vec![card(Suit::Diamonds, 9)]);
        state.hands.insert(b, vec![card(Suit::Hearts, 9), card(Suit::Hearts, 6)]);
        state.hands.insert(c, vec![card(Suit::Clubs, 6), card(Suit::Clubs, 7)]);
        state.round_limit = 6;

        let s1 = apply(&state, a, &Action::Attack { card: card(Suit::Diamonds, 9) }).unwrap();
        let s2 = apply(&s1, b, &Action::Transfer { card: card(Suit::Hearts, 9) }).unwrap();
        assert_eq!(s2.table.len(), 2);
        assert_eq!(s2.attacker_id, b);
        assert_eq!(s2.defender_id, c);
        assert_eq!(s2.round_limit, s2.hands[&c].len().min(6));
    }
}

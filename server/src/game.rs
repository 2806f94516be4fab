//! Authoritative memory-match session
//!
//! `GameSession` owns the roster, the deck and the reveal/match bookkeeping.
//! Every intent is a plain `&mut self` method that runs to completion, so the
//! host only has to make sure calls never overlap. The single deferred step,
//! flipping a mismatched pair back, is exposed as a `PendingMismatch` ticket
//! that the host schedules and later hands back to `resolve_mismatch`.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{
    default_theme, find_theme, Card, MoveRecord, Player, Snapshot, Theme, HISTORY_LIMIT,
    MAX_NAME_LEN,
};
use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Reported failures; the message is sent only to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("It's not your turn!")]
    NotYourTurn,
    #[error("Only the player whose turn it is can reset the game.")]
    ResetNotYourTurn,
    #[error("Only the player whose turn it is can change the theme.")]
    ThemeNotYourTurn,
    #[error("Invalid theme.")]
    InvalidTheme,
}

/// Result of applying one intent to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State should be pushed to every client
    Applied,
    /// Dropped without a message
    Ignored,
    /// Dropped, requester gets the rejection text
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// A mismatched pair waiting to be turned face-down again.
///
/// Tickets are bound to the deck generation they were issued for, so a ticket
/// that outlives a rebuild never touches the new deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMismatch {
    pub generation: u64,
    pub first: usize,
    pub second: usize,
}

pub struct GameSession {
    players: Vec<Player>,
    turn_index: usize,
    deck: Vec<Card>,
    revealed: Vec<usize>,
    history: VecDeque<MoveRecord>,
    is_finished: bool,
    theme: &'static Theme,
    generation: u64,
    pending_mismatch: Option<PendingMismatch>,
    rng: StdRng,
}

impl GameSession {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic session for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut session = Self {
            players: Vec::new(),
            turn_index: 0,
            deck: Vec::new(),
            revealed: Vec::new(),
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            is_finished: false,
            theme: default_theme(),
            generation: 0,
            pending_mismatch: None,
            rng,
        };
        session.rebuild(default_theme());
        session
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn cards(&self) -> &[Card] {
        &self.deck
    }

    pub fn revealed_indices(&self) -> &[usize] {
        &self.revealed
    }

    pub fn history(&self) -> impl Iterator<Item = &MoveRecord> {
        self.history.iter()
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    pub fn theme(&self) -> &'static Theme {
        self.theme
    }

    /// Incremented on every rebuild
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_mismatch(&self) -> Option<PendingMismatch> {
        self.pending_mismatch
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.turn_index)
    }

    fn is_turn_holder(&self, player_id: u32) -> bool {
        self.current_player()
            .map_or(false, |player| player.id == player_id)
    }

    /// Adds a player to the roster.
    ///
    /// The first player into an empty roster picks the theme and starts a
    /// fresh game. Joining again with the same id changes nothing.
    pub fn join(&mut self, player_id: u32, name: &str, theme_key: Option<&str>) -> Outcome {
        let Some(name) = normalize_name(name) else {
            debug!("Ignoring join from {} with blank name", player_id);
            return Outcome::Ignored;
        };

        if self.players.iter().any(|p| p.id == player_id) {
            return Outcome::Applied;
        }

        info!("Player {} joined as {:?}", player_id, name);
        self.players.push(Player::new(player_id, name));

        if self.players.len() == 1 {
            let theme = theme_key.and_then(find_theme).unwrap_or(self.theme);
            self.rebuild(theme);
        }

        Outcome::Applied
    }

    /// Reveals one card for the turn holder, resolving the pair once two are up.
    pub fn flip(&mut self, player_id: u32, index: i64) -> Outcome {
        if self.is_finished {
            return Outcome::Ignored;
        }

        let Some(index) = usize::try_from(index)
            .ok()
            .filter(|&index| index < self.deck.len())
        else {
            debug!("Ignoring flip of out-of-range card {}", index);
            return Outcome::Ignored;
        };

        if self.revealed.len() >= 2 {
            return Outcome::Ignored;
        }

        if !self.is_turn_holder(player_id) {
            return Outcome::Rejected(Rejection::NotYourTurn);
        }

        let card = &mut self.deck[index];
        if card.is_matched || card.is_revealed {
            return Outcome::Ignored;
        }

        card.is_revealed = true;
        self.revealed.push(index);

        if self.revealed.len() == 2 {
            self.resolve_pair();
        }

        Outcome::Applied
    }

    fn resolve_pair(&mut self) {
        let (first, second) = (self.revealed[0], self.revealed[1]);
        let is_match = self.deck[first].value == self.deck[second].value;

        let player_name = self
            .current_player()
            .map(|player| player.name.clone())
            .unwrap_or_default();
        let description = format!(
            "Flipped cards {} and {} ({} / {})",
            first + 1,
            second + 1,
            self.deck[first].value,
            self.deck[second].value
        );
        self.record_move(MoveRecord {
            player_name,
            description,
            success: is_match,
            timestamp: timestamp_ms(),
        });

        if is_match {
            self.deck[first].is_matched = true;
            self.deck[second].is_matched = true;
            if let Some(player) = self.players.get_mut(self.turn_index) {
                player.score += 1;
                info!(
                    "{} matched {} ({} pairs)",
                    player.name, self.deck[first].value, player.score
                );
            }
            self.revealed.clear();

            if self.deck.iter().all(|card| card.is_matched) {
                self.is_finished = true;
                info!("All pairs found, game finished");
            }
        } else {
            debug!("Mismatch on cards {} and {}", first, second);
            self.pending_mismatch = Some(PendingMismatch {
                generation: self.generation,
                first,
                second,
            });
        }
    }

    fn record_move(&mut self, record: MoveRecord) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    /// Turns a mismatched pair face-down and passes the turn.
    ///
    /// Tickets from an older deck, or already resolved, are ignored.
    pub fn resolve_mismatch(&mut self, ticket: PendingMismatch) -> Outcome {
        if self.pending_mismatch != Some(ticket) || ticket.generation != self.generation {
            debug!(
                "Dropping stale mismatch ticket (generation {}, current {})",
                ticket.generation, self.generation
            );
            return Outcome::Ignored;
        }

        if self.deck[ticket.first].is_matched || self.deck[ticket.second].is_matched {
            return Outcome::Ignored;
        }

        self.deck[ticket.first].is_revealed = false;
        self.deck[ticket.second].is_revealed = false;
        self.revealed.clear();
        self.pending_mismatch = None;

        if !self.players.is_empty() {
            self.turn_index = (self.turn_index + 1) % self.players.len();
        }

        Outcome::Applied
    }

    /// Starts a new game; only the turn holder may do this.
    pub fn reset(&mut self, player_id: u32, theme_key: Option<&str>) -> Outcome {
        if !self.is_turn_holder(player_id) {
            return Outcome::Rejected(Rejection::ResetNotYourTurn);
        }

        let theme = theme_key.and_then(find_theme).unwrap_or(self.theme);
        self.rebuild(theme);
        Outcome::Applied
    }

    pub fn change_theme(&mut self, player_id: u32, theme_key: &str) -> Outcome {
        if !self.is_turn_holder(player_id) {
            return Outcome::Rejected(Rejection::ThemeNotYourTurn);
        }

        let Some(theme) = find_theme(theme_key) else {
            return Outcome::Rejected(Rejection::InvalidTheme);
        };

        self.rebuild(theme);
        Outcome::Applied
    }

    /// Removes a player.
    ///
    /// The turn index is reduced modulo the new roster size, which can hand
    /// the turn to a different player than the one who held it.
    pub fn disconnect(&mut self, player_id: u32) -> Outcome {
        let Some(position) = self.players.iter().position(|p| p.id == player_id) else {
            return Outcome::Ignored;
        };

        let player = self.players.remove(position);
        info!("Player {} ({}) left", player.id, player.name);

        if self.players.is_empty() {
            self.rebuild(default_theme());
        } else {
            self.turn_index %= self.players.len();
        }

        Outcome::Applied
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            players: self.players.clone(),
            turn: self.turn_index,
            cards: self.deck.clone(),
            revealed_indices: self.revealed.clone(),
            move_history: self.history.iter().cloned().collect(),
            is_finished: self.is_finished,
            theme_key: self.theme.key.to_string(),
            theme_label: self.theme.label.to_string(),
        }
    }

    fn rebuild(&mut self, theme: &'static Theme) {
        self.theme = theme;
        self.deck = build_deck(theme, &mut self.rng);
        self.revealed.clear();
        self.history.clear();
        self.is_finished = false;
        self.pending_mismatch = None;
        self.generation += 1;

        for player in &mut self.players {
            player.score = 0;
        }
        if self.players.is_empty() {
            self.turn_index = 0;
        }

        info!(
            "New game with theme '{}' (generation {})",
            theme.key, self.generation
        );
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Two cards per symbol, shuffled; each card's id is its final position.
pub fn build_deck<R: Rng + ?Sized>(theme: &Theme, rng: &mut R) -> Vec<Card> {
    let mut values: Vec<&str> = theme
        .symbols
        .iter()
        .chain(theme.symbols.iter())
        .copied()
        .collect();
    values.shuffle(rng);

    values
        .into_iter()
        .enumerate()
        .map(|(id, value)| Card::new(id, value))
        .collect()
}

fn normalize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let capped: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    Some(capped.trim_end().to_string())
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{themes, DECK_SIZE, DEFAULT_THEME_KEY, PAIR_COUNT};
    use std::collections::HashMap;

    const A: u32 = 1;
    const B: u32 = 2;
    const C: u32 = 3;

    fn session_with(ids: &[u32]) -> GameSession {
        let mut session = GameSession::with_seed(7);
        for &id in ids {
            session.join(id, &format!("player-{}", id), None);
        }
        session
    }

    /// Positions of two cards showing the same symbol
    fn matching_pair(session: &GameSession) -> (i64, i64) {
        let cards = session.cards();
        let first = cards.iter().find(|c| !c.is_matched).unwrap();
        let second = cards
            .iter()
            .find(|c| c.id != first.id && c.value == first.value)
            .unwrap();
        (first.id as i64, second.id as i64)
    }

    /// Positions of two unmatched cards showing different symbols
    fn mismatched_pair(session: &GameSession) -> (i64, i64) {
        let cards = session.cards();
        let first = cards.iter().find(|c| !c.is_matched).unwrap();
        let second = cards
            .iter()
            .find(|c| !c.is_matched && c.value != first.value)
            .unwrap();
        (first.id as i64, second.id as i64)
    }

    fn assert_invariants(session: &GameSession) {
        assert!(session.revealed_indices().len() <= 2);
        for &index in session.revealed_indices() {
            assert!(!session.cards()[index].is_matched);
        }
        let all_matched = session.cards().iter().all(|c| c.is_matched);
        assert_eq!(session.is_finished(), all_matched);
        if !session.players().is_empty() {
            assert!(session.turn_index() < session.players().len());
        }
    }

    #[test]
    fn test_new_session_uses_default_theme() {
        let session = GameSession::with_seed(1);

        assert_eq!(session.theme().key, DEFAULT_THEME_KEY);
        assert_eq!(session.cards().len(), DECK_SIZE);
        assert!(session.players().is_empty());
        assert!(!session.is_finished());
        assert!(session.revealed_indices().is_empty());
        assert_eq!(session.generation(), 1);
    }

    #[test]
    fn test_build_deck_has_eight_pairs() {
        let mut rng = StdRng::seed_from_u64(42);

        for theme in themes() {
            let deck = build_deck(theme, &mut rng);
            assert_eq!(deck.len(), DECK_SIZE);

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for (position, card) in deck.iter().enumerate() {
                assert_eq!(card.id, position);
                assert!(!card.is_revealed && !card.is_matched);
                *counts.entry(card.value.as_str()).or_default() += 1;
            }

            assert_eq!(counts.len(), PAIR_COUNT);
            assert!(counts.values().all(|&n| n == 2));
            for symbol in theme.symbols {
                assert_eq!(counts.get(symbol), Some(&2));
            }
        }
    }

    #[test]
    fn test_build_deck_shuffles() {
        let theme = default_theme();
        let mut rng = StdRng::seed_from_u64(3);
        let unshuffled: Vec<&str> = theme
            .symbols
            .iter()
            .chain(theme.symbols.iter())
            .copied()
            .collect();

        let orders: Vec<Vec<String>> = (0..10)
            .map(|_| {
                build_deck(theme, &mut rng)
                    .into_iter()
                    .map(|card| card.value)
                    .collect()
            })
            .collect();

        assert!(orders.iter().any(|order| *order != unshuffled));
        assert!(orders.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_first_join_picks_theme() {
        let mut session = GameSession::with_seed(1);

        assert_eq!(session.join(A, "Ana", Some("fruits")), Outcome::Applied);
        assert_eq!(session.theme().key, "fruits");
        assert_eq!(session.generation(), 2);
        assert_eq!(session.players().len(), 1);
        assert_eq!(session.players()[0].score, 0);
        assert!(session
            .cards()
            .iter()
            .all(|c| session.theme().symbols.contains(&c.value.as_str())));
    }

    #[test]
    fn test_first_join_with_unknown_theme_keeps_current() {
        let mut session = GameSession::with_seed(1);

        session.join(A, "Ana", Some("planets"));
        assert_eq!(session.theme().key, DEFAULT_THEME_KEY);
    }

    #[test]
    fn test_later_joins_do_not_rebuild() {
        let mut session = session_with(&[A]);
        let generation = session.generation();
        let deck = session.cards().to_vec();

        assert_eq!(session.join(B, "Bruno", Some("shapes")), Outcome::Applied);
        assert_eq!(session.generation(), generation);
        assert_eq!(session.cards(), deck.as_slice());
        assert_eq!(session.theme().key, DEFAULT_THEME_KEY);
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let mut session = session_with(&[A]);
        let generation = session.generation();
        let deck = session.cards().to_vec();

        assert_eq!(session.join(A, "Ana again", Some("fruits")), Outcome::Applied);
        assert_eq!(session.players().len(), 1);
        assert_eq!(session.players()[0].name, "player-1");
        assert_eq!(session.generation(), generation);
        assert_eq!(session.cards(), deck.as_slice());
    }

    #[test]
    fn test_join_with_blank_name_is_ignored() {
        let mut session = GameSession::with_seed(1);

        assert_eq!(session.join(A, "", None), Outcome::Ignored);
        assert_eq!(session.join(A, "   \t", None), Outcome::Ignored);
        assert!(session.players().is_empty());
    }

    #[test]
    fn test_join_trims_and_caps_name() {
        let mut session = GameSession::with_seed(1);
        session.join(A, "  Ana  ", None);
        assert_eq!(session.players()[0].name, "Ana");

        let long = "x".repeat(MAX_NAME_LEN + 10);
        session.join(B, &long, None);
        assert_eq!(session.players()[1].name.chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn test_match_scores_and_keeps_turn() {
        let mut session = session_with(&[A, B]);
        let (first, second) = matching_pair(&session);

        assert_eq!(session.flip(A, first), Outcome::Applied);
        assert_eq!(session.revealed_indices(), &[first as usize]);
        assert_eq!(session.flip(A, second), Outcome::Applied);

        assert_eq!(session.players()[0].score, 1);
        assert_eq!(session.players()[1].score, 0);
        assert_eq!(session.turn_index(), 0);
        assert!(session.revealed_indices().is_empty());
        assert!(session.pending_mismatch().is_none());
        assert!(session.cards()[first as usize].is_matched);
        assert!(session.cards()[second as usize].is_matched);

        let history: Vec<_> = session.history().collect();
        assert_eq!(history.len(), 1);
        assert!(history[0].success);
        assert_eq!(history[0].player_name, "player-1");
        assert_invariants(&session);
    }

    #[test]
    fn test_mismatch_waits_then_passes_turn() {
        let mut session = session_with(&[A, B]);
        let (first, second) = mismatched_pair(&session);

        session.flip(A, first);
        assert_eq!(session.flip(A, second), Outcome::Applied);

        // both cards stay up until the ticket is resolved
        assert_eq!(session.revealed_indices().len(), 2);
        assert!(session.cards()[first as usize].is_revealed);
        assert!(session.cards()[second as usize].is_revealed);
        assert_eq!(session.turn_index(), 0);

        let ticket = session.pending_mismatch().unwrap();
        assert_eq!(ticket.first, first as usize);
        assert_eq!(ticket.second, second as usize);

        assert_eq!(session.resolve_mismatch(ticket), Outcome::Applied);
        assert!(!session.cards()[first as usize].is_revealed);
        assert!(!session.cards()[second as usize].is_revealed);
        assert!(session.revealed_indices().is_empty());
        assert_eq!(session.turn_index(), 1);
        assert!(session.players().iter().all(|p| p.score == 0));

        let history: Vec<_> = session.history().collect();
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
        let expected = format!(
            "Flipped cards {} and {} ({} / {})",
            first + 1,
            second + 1,
            session.cards()[first as usize].value,
            session.cards()[second as usize].value
        );
        assert_eq!(history[0].description, expected);
        assert_invariants(&session);
    }

    #[test]
    fn test_mismatch_ticket_resolves_once() {
        let mut session = session_with(&[A, B]);
        let (first, second) = mismatched_pair(&session);
        session.flip(A, first);
        session.flip(A, second);
        let ticket = session.pending_mismatch().unwrap();

        assert_eq!(session.resolve_mismatch(ticket), Outcome::Applied);
        assert_eq!(session.resolve_mismatch(ticket), Outcome::Ignored);
        assert_eq!(session.turn_index(), 1);
    }

    #[test]
    fn test_turn_wraps_after_last_player() {
        let mut session = session_with(&[A, B]);

        for expected_turn in [1, 0, 1] {
            let holder = session.current_player().unwrap().id;
            let (first, second) = mismatched_pair(&session);
            session.flip(holder, first);
            session.flip(holder, second);
            let ticket = session.pending_mismatch().unwrap();
            session.resolve_mismatch(ticket);
            assert_eq!(session.turn_index(), expected_turn);
        }
    }

    #[test]
    fn test_flip_out_of_turn_is_rejected() {
        let mut session = session_with(&[A, B]);
        let before = session.snapshot();

        assert_eq!(
            session.flip(B, 0),
            Outcome::Rejected(Rejection::NotYourTurn)
        );
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_flip_by_unknown_player_is_rejected() {
        let mut session = session_with(&[A]);
        assert_eq!(
            session.flip(99, 0),
            Outcome::Rejected(Rejection::NotYourTurn)
        );
    }

    #[test]
    fn test_flip_out_of_range_is_ignored() {
        let mut session = session_with(&[A, B]);
        let before = session.snapshot();

        assert_eq!(session.flip(A, DECK_SIZE as i64), Outcome::Ignored);
        assert_eq!(session.flip(A, -1), Outcome::Ignored);
        assert_eq!(session.flip(A, i64::MAX), Outcome::Ignored);
        // range is checked before ownership
        assert_eq!(session.flip(B, 100), Outcome::Ignored);
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_flip_same_card_twice_is_ignored() {
        let mut session = session_with(&[A]);

        assert_eq!(session.flip(A, 5), Outcome::Applied);
        assert_eq!(session.flip(A, 5), Outcome::Ignored);
        assert_eq!(session.revealed_indices(), &[5]);
    }

    #[test]
    fn test_flip_matched_card_is_ignored() {
        let mut session = session_with(&[A]);
        let (first, second) = matching_pair(&session);
        session.flip(A, first);
        session.flip(A, second);

        assert_eq!(session.flip(A, first), Outcome::Ignored);
        assert!(session.revealed_indices().is_empty());
        assert_eq!(session.history().count(), 1);
    }

    #[test]
    fn test_third_flip_while_pending_is_ignored() {
        let mut session = session_with(&[A, B]);
        let (first, second) = mismatched_pair(&session);
        session.flip(A, first);
        session.flip(A, second);

        let third = session
            .cards()
            .iter()
            .find(|c| !c.is_revealed)
            .map(|c| c.id as i64)
            .unwrap();

        assert_eq!(session.flip(A, third), Outcome::Ignored);
        // pending pair blocks the ownership check too
        assert_eq!(session.flip(B, third), Outcome::Ignored);
        assert_eq!(session.revealed_indices().len(), 2);
    }

    #[test]
    fn test_full_game_finishes() {
        let mut session = session_with(&[A, B]);

        for _ in 0..PAIR_COUNT {
            assert!(!session.is_finished());
            let (first, second) = matching_pair(&session);
            session.flip(A, first);
            session.flip(A, second);
            assert_invariants(&session);
        }

        assert!(session.is_finished());
        assert!(session.cards().iter().all(|c| c.is_matched));
        assert_eq!(session.players()[0].score, PAIR_COUNT as u32);
        assert_eq!(session.turn_index(), 0);

        assert_eq!(session.flip(A, 0), Outcome::Ignored);
        // finished check comes before ownership
        assert_eq!(session.flip(B, 0), Outcome::Ignored);
    }

    #[test]
    fn test_history_keeps_latest_entries() {
        let mut session = session_with(&[A, B]);

        for _ in 0..HISTORY_LIMIT + 5 {
            let holder = session.current_player().unwrap().id;
            let (first, second) = mismatched_pair(&session);
            session.flip(holder, first);
            session.flip(holder, second);
            let ticket = session.pending_mismatch().unwrap();
            session.resolve_mismatch(ticket);
        }

        assert_eq!(session.history().count(), HISTORY_LIMIT);
        assert_eq!(session.snapshot().move_history.len(), HISTORY_LIMIT);
        assert!(session.history().all(|record| !record.success));
    }

    #[test]
    fn test_reset_requires_turn_holder() {
        let mut session = session_with(&[A, B]);
        let before = session.snapshot();

        assert_eq!(
            session.reset(B, None),
            Outcome::Rejected(Rejection::ResetNotYourTurn)
        );
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_reset_rebuilds_and_keeps_turn() {
        let mut session = session_with(&[A, B]);
        let (first, second) = matching_pair(&session);
        session.flip(A, first);
        session.flip(A, second);
        let (first, second) = mismatched_pair(&session);
        session.flip(A, first);
        session.flip(A, second);
        session.resolve_mismatch(session.pending_mismatch().unwrap());
        assert_eq!(session.turn_index(), 1);

        let generation = session.generation();
        assert_eq!(session.reset(B, None), Outcome::Applied);

        assert_eq!(session.generation(), generation + 1);
        assert_eq!(session.turn_index(), 1);
        assert!(session.players().iter().all(|p| p.score == 0));
        assert_eq!(session.players().len(), 2);
        assert_eq!(session.history().count(), 0);
        assert!(session.cards().iter().all(|c| !c.is_face_up()));
        assert_eq!(session.theme().key, DEFAULT_THEME_KEY);
    }

    #[test]
    fn test_reset_during_pending_mismatch_invalidates_ticket() {
        let mut session = session_with(&[A, B]);
        let (first, second) = mismatched_pair(&session);
        session.flip(A, first);
        session.flip(A, second);
        let ticket = session.pending_mismatch().unwrap();

        assert_eq!(session.reset(A, None), Outcome::Applied);
        assert!(session.pending_mismatch().is_none());

        // reveal the same positions on the new deck
        session.flip(A, first);
        let before = session.snapshot();

        assert_eq!(session.resolve_mismatch(ticket), Outcome::Ignored);
        assert_eq!(session.snapshot(), before);
        assert!(session.cards()[first as usize].is_revealed);
        assert_eq!(session.turn_index(), 0);
    }

    #[test]
    fn test_change_theme() {
        let mut session = session_with(&[A, B]);

        assert_eq!(session.change_theme(A, "emojis"), Outcome::Applied);
        assert_eq!(session.theme().key, "emojis");
        assert_eq!(session.snapshot().theme_label, "Assorted Emojis");
        assert!(session
            .cards()
            .iter()
            .all(|c| session.theme().symbols.contains(&c.value.as_str())));
    }

    #[test]
    fn test_change_theme_rejections() {
        let mut session = session_with(&[A, B]);
        let before = session.snapshot();

        assert_eq!(
            session.change_theme(A, "planets"),
            Outcome::Rejected(Rejection::InvalidTheme)
        );
        assert_eq!(
            session.change_theme(B, "fruits"),
            Outcome::Rejected(Rejection::ThemeNotYourTurn)
        );
        // ownership is checked before the key
        assert_eq!(
            session.change_theme(B, "planets"),
            Outcome::Rejected(Rejection::ThemeNotYourTurn)
        );
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(Rejection::NotYourTurn.to_string(), "It's not your turn!");
        assert_eq!(Rejection::InvalidTheme.to_string(), "Invalid theme.");
        assert!(Rejection::ResetNotYourTurn.to_string().contains("reset"));
        assert!(Rejection::ThemeNotYourTurn.to_string().contains("theme"));
    }

    #[test]
    fn test_last_disconnect_restores_default_theme() {
        let mut session = session_with(&[A]);
        session.change_theme(A, "fruits");
        let (first, _) = matching_pair(&session);
        session.flip(A, first);
        let generation = session.generation();

        assert_eq!(session.disconnect(A), Outcome::Applied);

        assert!(session.players().is_empty());
        assert_eq!(session.theme().key, DEFAULT_THEME_KEY);
        assert_eq!(session.generation(), generation + 1);
        assert_eq!(session.turn_index(), 0);
        assert_eq!(session.cards().len(), DECK_SIZE);
        assert!(session.cards().iter().all(|c| !c.is_face_up()));
        assert!(session.revealed_indices().is_empty());
    }

    #[test]
    fn test_disconnect_clamps_turn_by_position() {
        let mut session = session_with(&[A, B, C]);
        for _ in 0..2 {
            let holder = session.current_player().unwrap().id;
            let (first, second) = mismatched_pair(&session);
            session.flip(holder, first);
            session.flip(holder, second);
            session.resolve_mismatch(session.pending_mismatch().unwrap());
        }
        assert_eq!(session.current_player().unwrap().id, C);

        assert_eq!(session.disconnect(A), Outcome::Applied);

        // index 2 wraps to 0, which is now B rather than C
        assert_eq!(session.turn_index(), 0);
        assert_eq!(session.current_player().unwrap().id, B);
    }

    #[test]
    fn test_disconnect_unknown_player_is_ignored() {
        let mut session = session_with(&[A]);
        let generation = session.generation();

        assert_eq!(session.disconnect(42), Outcome::Ignored);
        assert_eq!(session.players().len(), 1);
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn test_disconnect_during_mismatch_still_resolves() {
        let mut session = session_with(&[A, B, C]);
        let (first, second) = mismatched_pair(&session);
        session.flip(A, first);
        session.flip(A, second);
        let ticket = session.pending_mismatch().unwrap();

        session.disconnect(C);
        assert_eq!(session.resolve_mismatch(ticket), Outcome::Applied);
        assert_eq!(session.current_player().unwrap().id, B);
        assert!(session.revealed_indices().is_empty());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut session = session_with(&[A, B]);
        session.flip(A, 3);
        let snapshot = session.snapshot();

        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.turn, 0);
        assert_eq!(snapshot.cards.len(), DECK_SIZE);
        assert_eq!(snapshot.revealed_indices, vec![3]);
        assert!(snapshot.move_history.is_empty());
        assert!(!snapshot.is_finished);
        assert_eq!(snapshot.theme_key, DEFAULT_THEME_KEY);
        assert_eq!(snapshot.theme_label, "Animals");
    }
}

//! The match engine (§4.4): owns all 32 pieces of one game, resolves
//! conflicts, and broadcasts authoritative snapshots.
//!
//! One `parking_lot::Mutex` per match serialises every operation; nothing
//! here ever awaits while the lock is held (§5).

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;

use crate::board::Board;
use crate::constants::{MATCH_TTL_SECONDS, RECENT_ACTIVITY_SECONDS};
use crate::error::MatchError;
use crate::observers::ObserverSet;
use crate::piece::{Phase, Piece};
use crate::types::{Color, PieceKind, PlayerIdentity, Square};

const WHITE_KING_INDEX: usize = 4;
const BLACK_KING_INDEX: usize = 20;
const DEBUG_TIME_JUMP_SECONDS: f64 = 365.0 * 24.0 * 60.0 * 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Start,
    Play,
    GameOver,
}

impl MatchPhase {
    pub fn wire_code(self) -> u8 {
        match self {
            MatchPhase::Start => 0,
            MatchPhase::Play => 2,
            MatchPhase::GameOver => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    Ignored,
}

/// What to do with a player's rating once a game is over, handed to
/// whatever `PlayerRegistry` implementation the caller is using. Kept
/// outside the match lock: the engine computes this synchronously, the
/// adapter then awaits the registry call.
pub struct PendingResult {
    pub winner: PlayerIdentity,
    pub loser: PlayerIdentity,
}

/// A single match, identified by an opaque `key`. Wraps the mutable
/// game state behind one mutex.
pub struct MatchHandle {
    pub key: String,
    pub created_at: f64,
    state: Mutex<MatchState>,
}

struct MatchState {
    phase: MatchPhase,
    player_white: Option<PlayerIdentity>,
    player_black: Option<PlayerIdentity>,
    ready_white: bool,
    ready_black: bool,
    pieces: [Option<Piece>; 32],
    seq: u64,
    winner: Option<Color>,
    results_reported: bool,
    debug_no_time: bool,
    observers: ObserverSet,
}

impl MatchHandle {
    /// Fresh match: `player_white` joins immediately (the user whose
    /// first visit created it); Black joins later via `join`.
    pub fn new(key: String, created_at: f64, player_white: PlayerIdentity) -> Self {
        Self {
            key,
            created_at,
            state: Mutex::new(MatchState::fresh(Some(player_white), None, ObserverSet::default())),
        }
    }

    /// Rebuild at the same key, preserving players and observers, as
    /// `Registry::new_game` requires (§4.4/§4.5 "Same-key replacement").
    pub fn fresh_rematch(
        key: String,
        created_at: f64,
        player_white: Option<PlayerIdentity>,
        player_black: Option<PlayerIdentity>,
        observers: ObserverSet,
    ) -> Self {
        Self {
            key,
            created_at,
            state: Mutex::new(MatchState::fresh(player_white, player_black, observers)),
        }
    }

    pub fn is_stale(&self, now: f64) -> bool {
        now - self.created_at > MATCH_TTL_SECONDS as f64
    }

    pub fn is_recently_active(&self, now: f64) -> bool {
        now - self.created_at <= RECENT_ACTIVITY_SECONDS as f64
    }

    /// Returns `true` if Black has joined.
    pub fn join(&self, user: PlayerIdentity) -> bool {
        let mut state = self.state.lock();
        if state.player_white.as_ref().map(|p| p.id == user.id).unwrap_or(false) {
            return true;
        }
        if state.player_black.is_none() {
            state.player_black = Some(user);
            true
        } else {
            state.player_black.as_ref().map(|p| p.id == user.id).unwrap_or(false)
        }
    }

    pub fn snapshot(&self, now: f64) -> MatchSnapshot {
        let mut state = self.state.lock();
        state.tick(now);
        state.to_snapshot(&self.key, now)
    }

    pub fn set_debug_no_time(&self, debug: bool) {
        self.state.lock().debug_no_time = debug;
    }

    pub fn move_piece(
        &self,
        player: &PlayerIdentity,
        from: &str,
        to: &str,
        now: f64,
    ) -> Result<MoveOutcome, MatchError> {
        let mut state = self.state.lock();
        state.tick(now);

        if state.phase != MatchPhase::Play {
            return Err(MatchError::ForbiddenState(
                "match is not in PLAY".to_string(),
            ));
        }
        let color = state.color_of(player)?;

        let from_sq = Square::parse(from)
            .ok_or_else(|| MatchError::BadRequest(format!("invalid square {from:?}")))?;
        let to_sq = Square::parse(to)
            .ok_or_else(|| MatchError::BadRequest(format!("invalid square {to:?}")))?;

        let board = Board::new(&state.pieces);
        let occupant = board
            .piece_at(from_sq)
            .ok_or_else(|| MatchError::NotFound(format!("no piece at {from}")))?;

        if occupant.color != color {
            return Err(MatchError::ForbiddenActor(
                "square is occupied by the other player's piece".to_string(),
            ));
        }

        if !board.valid_move(from_sq, to_sq) {
            return Ok(MoveOutcome::Ignored);
        }

        let idx = state
            .pieces
            .iter()
            .position(|p| matches!(p, Some(p) if p.position == from_sq && p.phase != Phase::Moving))
            .expect("board.piece_at found an occupant, so its slot must exist");

        state.pieces[idx].as_mut().unwrap().begin_move(to_sq, now);
        state.put();
        state.broadcast(&self.key, now);
        Ok(MoveOutcome::Moved)
    }

    pub fn set_ready(&self, player: &PlayerIdentity, ready: bool, now: f64) -> Result<(), MatchError> {
        let mut state = self.state.lock();
        state.tick(now);

        match state.color_of(player)? {
            Color::White => state.ready_white = ready,
            Color::Black => state.ready_black = ready,
        }

        if state.ready_white && state.ready_black && state.phase == MatchPhase::Start {
            state.phase = MatchPhase::Play;
        }
        state.put();
        state.broadcast(&self.key, now);
        Ok(())
    }

    pub fn randomize(&self, now: f64) -> Result<(), MatchError> {
        let mut state = self.state.lock();
        state.tick(now);

        if state.phase != MatchPhase::Start {
            return Err(MatchError::ForbiddenState(
                "can only randomize before the match starts".to_string(),
            ));
        }
        state.randomize_back_rank();
        state.put();
        state.broadcast(&self.key, now);
        Ok(())
    }

    /// Tick, then, if the game just ended and results haven't been
    /// reported yet, hand back who to credit/debit. The caller awaits
    /// the `PlayerRegistry` call *after* this returns, outside any lock.
    pub fn report_results_if_over(&self, now: f64) -> Option<PendingResult> {
        let mut state = self.state.lock();
        state.tick(now);
        state.broadcast(&self.key, now);

        if state.phase != MatchPhase::GameOver || state.results_reported {
            return None;
        }
        let winner_color = state.winner?;
        let (winner, loser) = match winner_color {
            Color::White => (state.player_white.clone(), state.player_black.clone()),
            Color::Black => (state.player_black.clone(), state.player_white.clone()),
        };
        state.results_reported = true;
        match (winner, loser) {
            (Some(winner), Some(loser)) => Some(PendingResult { winner, loser }),
            _ => None,
        }
    }

    pub fn white_id(&self) -> Option<String> {
        self.state.lock().player_white.as_ref().map(|p| p.id.clone())
    }

    pub fn black_id(&self) -> Option<String> {
        self.state.lock().player_black.as_ref().map(|p| p.id.clone())
    }

    pub fn subscribe(&self, handle: UnboundedSender<String>, now: f64) {
        let mut state = self.state.lock();
        state.tick(now);
        let snapshot = state.to_snapshot(&self.key, now);
        state.observers.subscribe(handle);
        state.observers.broadcast(&snapshot.to_json_string());
    }

    /// Extracts the pieces needed to build `fresh_rematch` for this key.
    pub fn rematch_inputs(&self) -> (Option<PlayerIdentity>, Option<PlayerIdentity>) {
        let state = self.state.lock();
        (state.player_white.clone(), state.player_black.clone())
    }

    pub fn take_observers(&self) -> ObserverSet {
        std::mem::take(&mut self.state.lock().observers)
    }
}

impl MatchState {
    fn fresh(
        player_white: Option<PlayerIdentity>,
        player_black: Option<PlayerIdentity>,
        observers: ObserverSet,
    ) -> Self {
        Self {
            phase: MatchPhase::Start,
            player_white,
            player_black,
            ready_white: false,
            ready_black: false,
            pieces: initial_pieces(),
            seq: 0,
            winner: None,
            results_reported: false,
            debug_no_time: false,
            observers,
        }
    }

    fn color_of(&self, player: &PlayerIdentity) -> Result<Color, MatchError> {
        if self.player_white.as_ref().map(|p| p.id == player.id).unwrap_or(false) {
            Ok(Color::White)
        } else if self.player_black.as_ref().map(|p| p.id == player.id).unwrap_or(false) {
            Ok(Color::Black)
        } else {
            Err(MatchError::ForbiddenActor(
                "player is not part of this match".to_string(),
            ))
        }
    }

    /// Bumps the broadcast sequence, but only once the match is actually
    /// live — mirrors the source's gate (a match still in START has
    /// nothing observable to be monotone about yet).
    fn put(&mut self) {
        if self.phase == MatchPhase::Play || self.phase == MatchPhase::GameOver {
            self.seq += 1;
        }
    }

    fn broadcast(&mut self, key: &str, now: f64) {
        let snapshot = self.to_snapshot(key, now);
        self.observers.broadcast(&snapshot.to_json_string());
    }

    fn effective_now(&self, now: f64) -> f64 {
        if self.debug_no_time {
            now + DEBUG_TIME_JUMP_SECONDS
        } else {
            now
        }
    }

    fn tick(&mut self, now: f64) {
        let eff = self.effective_now(now);
        self.finish_all_moves(eff);
        self.update_pieces(eff);
        self.update_pieces(eff);
        self.check_winner();
    }

    fn finish_all_moves(&mut self, now: f64) {
        for idx in 0..32 {
            let arrived = matches!(
                self.pieces[idx],
                Some(p) if p.phase == Phase::Moving && p.end_time <= now
            );
            if arrived {
                self.resolve_arrival(idx, now);
            }
        }
    }

    /// §4.4 `resolveArrival`: the piece at `idx` has a past-due arrival
    /// but hasn't transitioned to Sleeping yet. Find whatever else is
    /// sitting on its destination and resolve the collision.
    fn resolve_arrival(&mut self, idx: usize, now: f64) {
        let piece = match self.pieces[idx] {
            Some(p) => p,
            None => return,
        };

        for j in 0..32 {
            if j == idx {
                continue;
            }
            let Some(other) = self.pieces[j] else { continue };
            if other.position != piece.position {
                continue;
            }

            if other.color == piece.color {
                tracing::error!(
                    square = %piece.position,
                    "two same-color pieces landed on the same square"
                );
                // Invariant violation: the move that caused this should
                // never have been accepted. There is nothing sensible to
                // do but drop the later one and keep going — matching
                // `Ignored`-style "never surface to the player" handling
                // for a condition that indicates an engine bug, not a
                // player mistake.
                self.pieces[idx] = None;
                return;
            }

            if other.phase != Phase::Moving {
                // Standing piece on the destination: captured.
                self.pieces[j] = None;
            } else if other.end_time <= now {
                // Both arrived within the same tick. The piece with the
                // *smaller* end_time settled first and is therefore the
                // one sitting defenseless when the later arrival shows
                // up — so the smaller end_time is the one captured. On
                // an exact tie, `other` is captured (§9 open question,
                // frozen per spec).
                if piece.end_time < other.end_time {
                    self.pieces[idx] = None;
                } else {
                    self.pieces[j] = None;
                }
            }
            // At most one capture per arrival.
            return;
        }
    }

    fn update_pieces(&mut self, now: f64) {
        for slot in self.pieces.iter_mut() {
            if let Some(p) = slot {
                p.advance(now);
            }
        }
    }

    fn check_winner(&mut self) {
        if self.phase == MatchPhase::GameOver {
            return;
        }
        if self.pieces[WHITE_KING_INDEX].is_none() {
            self.phase = MatchPhase::GameOver;
            self.winner = Some(Color::Black);
        } else if self.pieces[BLACK_KING_INDEX].is_none() {
            self.phase = MatchPhase::GameOver;
            self.winner = Some(Color::White);
        }
    }

    /// Fisher-Yates over the back rank only (indices 0..8), applying the
    /// same permutation to the mirrored black back rank (16..24) so the
    /// two armies stay mirror-symmetric. Pawns are untouched.
    fn randomize_back_rank(&mut self) {
        use rand::Rng;
        let mut rng = rand::rng();
        for i in 0..8usize {
            let j = rng.random_range(i..8);
            if i != j {
                swap_position(&mut self.pieces, i, j);
                swap_position(&mut self.pieces, 16 + i, 16 + j);
            }
        }
    }

    fn to_snapshot(&self, key: &str, now: f64) -> MatchSnapshot {
        MatchSnapshot {
            key: key.to_string(),
            user_white: self.player_white.clone(),
            user_black: self.player_black.clone(),
            ready_white: self.ready_white,
            ready_black: self.ready_black,
            seq: self.seq,
            phase: self.phase,
            time_stamp: now,
            winner: self.winner,
            pieces: self.pieces,
        }
    }
}

fn swap_position(pieces: &mut [Option<Piece>; 32], i: usize, j: usize) {
    let pos_i = pieces[i].map(|p| p.position);
    let pos_j = pieces[j].map(|p| p.position);
    if let (Some(pi), Some(pj)) = (pos_i, pos_j) {
        if let Some(p) = pieces[i].as_mut() {
            p.position = pj;
        }
        if let Some(p) = pieces[j].as_mut() {
            p.position = pi;
        }
    }
}

/// The standard back-rank-plus-pawns setup, grounded in the original
/// implementation's `Game.__init__` piece list (p0..p31).
pub fn initial_pieces() -> [Option<Piece>; 32] {
    const BACK_RANK: [PieceKind; 8] = [
        PieceKind::Rook,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Queen,
        PieceKind::King,
        PieceKind::Bishop,
        PieceKind::Knight,
        PieceKind::Rook,
    ];

    let mut pieces: [Option<Piece>; 32] = [None; 32];
    for file in 0..8u8 {
        pieces[file as usize] = Some(Piece::new_static(
            Color::White,
            BACK_RANK[file as usize],
            Square::new(file, 0),
        ));
        pieces[8 + file as usize] = Some(Piece::new_static(
            Color::White,
            PieceKind::Pawn,
            Square::new(file, 1),
        ));
        pieces[16 + file as usize] = Some(Piece::new_static(
            Color::Black,
            BACK_RANK[file as usize],
            Square::new(file, 7),
        ));
        pieces[24 + file as usize] = Some(Piece::new_static(
            Color::Black,
            PieceKind::Pawn,
            Square::new(file, 6),
        ));
    }
    pieces
}

/// Wire snapshot (§6): the JSON shape observers and the HTTP adapter see.
#[derive(Clone)]
pub struct MatchSnapshot {
    pub key: String,
    pub user_white: Option<PlayerIdentity>,
    pub user_black: Option<PlayerIdentity>,
    pub ready_white: bool,
    pub ready_black: bool,
    pub seq: u64,
    pub phase: MatchPhase,
    pub time_stamp: f64,
    pub winner: Option<Color>,
    pub pieces: [Option<Piece>; 32],
}

impl MatchSnapshot {
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("MatchSnapshot always serializes")
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("key".into(), Value::String(self.key.clone()));
        map.insert(
            "userX".into(),
            Value::String(self.user_white.as_ref().map(|p| p.id.clone()).unwrap_or_default()),
        );
        map.insert(
            "userXname".into(),
            Value::String(self.user_white.as_ref().map(|p| p.name.clone()).unwrap_or_default()),
        );
        map.insert("userXReady".into(), Value::Bool(self.ready_white));
        map.insert(
            "userO".into(),
            Value::String(self.user_black.as_ref().map(|p| p.id.clone()).unwrap_or_default()),
        );
        map.insert(
            "userOname".into(),
            Value::String(self.user_black.as_ref().map(|p| p.name.clone()).unwrap_or_default()),
        );
        map.insert("userOReady".into(), Value::Bool(self.ready_black));
        map.insert("seq".into(), Value::from(self.seq));
        map.insert("state".into(), Value::from(self.phase.wire_code()));
        map.insert("time_stamp".into(), Value::from(self.time_stamp));
        if let Some(winner) = self.winner {
            map.insert("winner".into(), Value::from(winner.wire_code()));
        }
        for (i, piece) in self.pieces.iter().enumerate() {
            let token = piece.as_ref().map(|p| p.encode()).unwrap_or_default();
            map.insert(format!("p{i}"), Value::String(token));
        }
        Value::Object(map)
    }
}

impl Serialize for MatchSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// Elo update with K=32, grounded in `auth.py`'s `change_ratings`.
pub fn elo_delta(winner_rating: i64, loser_rating: i64) -> i64 {
    let diff = (loser_rating - winner_rating) as f64;
    let expected_score = 1.0 / (1.0 + 10f64.powf(diff / 400.0));
    (crate::constants::ELO_K * (1.0 - expected_score)).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> PlayerIdentity {
        PlayerIdentity {
            id: id.to_string(),
            name: id.to_string(),
        }
    }

    fn ready_match() -> MatchHandle {
        let handle = MatchHandle::new("k1".to_string(), 0.0, identity("white"));
        handle.join(identity("black"));
        handle.set_ready(&identity("white"), true, 0.0).unwrap();
        handle.set_ready(&identity("black"), true, 0.0).unwrap();
        handle
    }

    #[test]
    fn both_ready_starts_the_match() {
        let handle = ready_match();
        let snap = handle.snapshot(0.0);
        assert_eq!(snap.phase, MatchPhase::Play);
    }

    #[test]
    fn move_before_play_is_forbidden_state() {
        let handle = MatchHandle::new("k1".to_string(), 0.0, identity("white"));
        handle.join(identity("black"));
        let err = handle
            .move_piece(&identity("white"), "E2", "E4", 0.0)
            .unwrap_err();
        assert!(matches!(err, MatchError::ForbiddenState(_)));
    }

    #[test]
    fn illegal_move_is_ignored_not_errored() {
        let handle = ready_match();
        let outcome = handle.move_piece(&identity("white"), "E2", "E5", 0.0).unwrap();
        assert_eq!(outcome, MoveOutcome::Ignored);
    }

    #[test]
    fn wrong_color_piece_is_forbidden_actor() {
        let handle = ready_match();
        let err = handle
            .move_piece(&identity("white"), "E7", "E5", 0.0)
            .unwrap_err();
        assert!(matches!(err, MatchError::ForbiddenActor(_)));
    }

    #[test]
    fn non_player_cannot_move() {
        let handle = ready_match();
        let err = handle
            .move_piece(&identity("observer"), "E2", "E4", 0.0)
            .unwrap_err();
        assert!(matches!(err, MatchError::ForbiddenActor(_)));
    }

    #[test]
    fn basic_capture_scenario() {
        let handle = ready_match();
        handle.set_debug_no_time(true);
        handle.move_piece(&identity("white"), "E2", "E3", 0.0).unwrap();
        handle.move_piece(&identity("white"), "D1", "G4", 0.0).unwrap();
        handle.move_piece(&identity("black"), "D7", "D6", 0.0).unwrap();
        handle.move_piece(&identity("black"), "C8", "G4", 0.0).unwrap();

        let snap = handle.snapshot(1_000_000.0);
        let g4 = snap
            .pieces
            .iter()
            .find_map(|p| p.filter(|p| p.position == Square::parse("G4").unwrap()));
        let g4 = g4.expect("something survives on G4");
        assert_eq!(g4.color, Color::Black);
        assert_eq!(g4.kind, PieceKind::Bishop);
    }

    #[test]
    fn white_pawn_promotion_scenario() {
        let handle = ready_match();
        handle.set_debug_no_time(true);
        for (from, to) in [("B2", "B4"), ("B4", "B5"), ("B5", "B6"), ("B6", "C7"), ("C7", "B8")] {
            let outcome = handle.move_piece(&identity("white"), from, to, 0.0).unwrap();
            assert_eq!(outcome, MoveOutcome::Moved, "move {from}->{to} should be legal");
            handle.snapshot(1_000_000.0);
        }
        let snap = handle.snapshot(2_000_000.0);
        let b8 = snap
            .pieces
            .iter()
            .find_map(|p| p.filter(|p| p.position == Square::parse("B8").unwrap()))
            .expect("pawn arrived at B8");
        assert_eq!(b8.color, Color::White);
        assert_eq!(b8.kind, PieceKind::Queen);
    }

    #[test]
    fn same_color_collision_is_prevented() {
        let handle = ready_match();
        // Knight B1->A3 and pawn A2->A3 both target A3; the knight moves
        // first and the pawn's attempt must be ignored, not started.
        let first = handle.move_piece(&identity("white"), "B1", "A3", 0.0).unwrap();
        assert_eq!(first, MoveOutcome::Moved);
        let second = handle.move_piece(&identity("white"), "A2", "A3", 0.0).unwrap();
        assert_eq!(second, MoveOutcome::Ignored);

        let snap = handle.snapshot(0.0);
        let pawn_still_at_a2 = snap.pieces.iter().any(|p| {
            p.map(|p| p.position == Square::parse("A2").unwrap() && p.phase == Phase::Static)
                .unwrap_or(false)
        });
        assert!(pawn_still_at_a2, "pawn must not have started moving");
    }

    #[test]
    fn tie_break_later_arrival_wins_the_square() {
        let handle = ready_match();
        // Get the queen to G4 and let it fully settle back to Static.
        handle.move_piece(&identity("white"), "D1", "G4", 0.0).unwrap();
        handle.snapshot(10.0);

        // Queen G4->F5 (short diagonal hop) starts at t=10, ends ~11.41.
        handle.move_piece(&identity("white"), "G4", "F5", 10.0).unwrap();
        // Bishop C8->F5 (long diagonal) starts a moment later at t=10.5
        // and, being slower, also arrives later (~14.74). Both arrivals
        // are only resolved at the single snapshot tick below, so they
        // land in the same `finish_all_moves` pass while still Moving:
        // the piece with the *larger* end_time — the one still arriving
        // after the other has already come to rest — wins the square.
        handle.move_piece(&identity("black"), "C8", "F5", 10.5).unwrap();

        let snap = handle.snapshot(20.0);
        let f5 = snap
            .pieces
            .iter()
            .find_map(|p| p.filter(|p| p.position == Square::parse("F5").unwrap()));
        let f5 = f5.expect("the later arrival survives on F5");
        assert_eq!(f5.kind, PieceKind::Bishop);
        assert_eq!(f5.color, Color::Black);
    }

    #[test]
    fn tie_break_longer_distance_wins_even_when_initiated_first() {
        let handle = ready_match();
        handle.move_piece(&identity("white"), "D1", "G4", 0.0).unwrap();
        handle.snapshot(10.0);

        // Bishop starts first this time (t=10, end_time ~14.24) but its
        // path is longer; the queen starts a fraction later (t=10.2,
        // end_time ~11.61) but is faster. Resolved together in one tick,
        // the bishop's later end_time still wins regardless of who moved
        // first.
        handle.move_piece(&identity("black"), "C8", "F5", 10.0).unwrap();
        handle.move_piece(&identity("white"), "G4", "F5", 10.2).unwrap();

        let snap = handle.snapshot(20.0);
        let f5 = snap
            .pieces
            .iter()
            .find_map(|p| p.filter(|p| p.position == Square::parse("F5").unwrap()))
            .expect("the longer-distance mover survives on F5");
        assert_eq!(f5.kind, PieceKind::Bishop);
        assert_eq!(f5.color, Color::Black);
    }

    #[test]
    fn tie_break_with_swapped_geometry_the_shorter_flight_survives() {
        // Mirror of the two tests above with distances swapped: now the
        // bishop has the short hop and the queen the long one, so the
        // queen (larger end_time, arrives later) should win this time.
        let handle = ready_match();
        // Clear E2 so the queen's D1->G4 diagonal is unobstructed later.
        handle.move_piece(&identity("white"), "E2", "E3", 0.0).unwrap();
        handle.move_piece(&identity("black"), "C8", "F5", 0.0).unwrap();
        handle.snapshot(10.0);

        // Bishop F5->G4 is a short diagonal hop; queen D1->G4 is long.
        handle.move_piece(&identity("black"), "F5", "G4", 10.0).unwrap();
        handle.move_piece(&identity("white"), "D1", "G4", 10.1).unwrap();

        let snap = handle.snapshot(30.0);
        let g4 = snap
            .pieces
            .iter()
            .find_map(|p| p.filter(|p| p.position == Square::parse("G4").unwrap()))
            .expect("the longer-distance mover survives on G4");
        assert_eq!(g4.kind, PieceKind::Queen);
        assert_eq!(g4.color, Color::White);
    }

    #[test]
    fn out_of_bounds_square_is_a_bad_request() {
        let handle = ready_match();
        let err = handle
            .move_piece(&identity("white"), "E2", "E9", 0.0)
            .unwrap_err();
        assert!(matches!(err, MatchError::BadRequest(_)));
    }

    #[test]
    fn seq_is_strictly_monotone_across_moves() {
        let handle = ready_match();
        let seq0 = handle.snapshot(0.0).seq;
        handle.move_piece(&identity("white"), "E2", "E4", 0.0).unwrap();
        let seq1 = handle.snapshot(0.0).seq;
        assert!(seq1 > seq0);
        handle.move_piece(&identity("black"), "E7", "E5", 0.0).unwrap();
        let seq2 = handle.snapshot(0.0).seq;
        assert!(seq2 > seq1);
    }

    #[test]
    fn third_party_joining_a_full_match_does_not_take_a_seat() {
        let handle = ready_match();
        // Both seats are already taken by `ready_match()`; a third user's
        // `join` must not bump either seated player.
        let took_seat = handle.join(identity("charlie"));
        assert!(!took_seat);
        assert_eq!(handle.white_id().unwrap(), "white");
        assert_eq!(handle.black_id().unwrap(), "black");

        // They still see a snapshot (observer), but cannot move or ready.
        let _ = handle.snapshot(0.0);
        let err = handle
            .move_piece(&identity("charlie"), "E2", "E4", 0.0)
            .unwrap_err();
        assert!(matches!(err, MatchError::ForbiddenActor(_)));
    }

    #[test]
    fn full_game_reports_results_once() {
        let handle = ready_match();
        handle.set_debug_no_time(true);
        // Knight hops ignore blockers entirely, so B1->C3->D5->F6->E8 is a
        // quick, fully legal path straight into the black king.
        let mut t = 0.0;
        for (from, to) in [("B1", "C3"), ("C3", "D5"), ("D5", "F6"), ("F6", "E8")] {
            let outcome = handle.move_piece(&identity("white"), from, to, t).unwrap();
            assert_eq!(outcome, MoveOutcome::Moved, "move {from}->{to} should be legal");
            t += 1.0;
            handle.snapshot(t);
        }

        let snap = handle.snapshot(t);
        assert_eq!(snap.phase, MatchPhase::GameOver);
        assert_eq!(snap.winner, Some(Color::White));

        let first = handle.report_results_if_over(t);
        assert!(first.is_some());
        let second = handle.report_results_if_over(t + 1.0);
        assert!(second.is_none(), "results must only be reported once");
    }

    #[test]
    fn randomize_only_allowed_in_start() {
        let handle = MatchHandle::new("k1".to_string(), 0.0, identity("white"));
        handle.join(identity("black"));
        assert!(handle.randomize(0.0).is_ok());
        handle.set_ready(&identity("white"), true, 0.0).unwrap();
        handle.set_ready(&identity("black"), true, 0.0).unwrap();
        let err = handle.randomize(0.0).unwrap_err();
        assert!(matches!(err, MatchError::ForbiddenState(_)));
    }

    #[test]
    fn randomize_keeps_armies_mirror_symmetric() {
        let handle = MatchHandle::new("k1".to_string(), 0.0, identity("white"));
        handle.join(identity("black"));
        handle.randomize(0.0).unwrap();
        let snap = handle.snapshot(0.0);
        for i in 0..8 {
            let white = snap.pieces[i].unwrap();
            let black = snap.pieces[16 + i].unwrap();
            assert_eq!(white.position.file, black.position.file);
            assert_eq!(white.kind, black.kind);
        }
    }

    #[test]
    fn elo_k32_symmetric_example() {
        // Equal ratings: winner gains 16, loser loses 16.
        assert_eq!(elo_delta(1000, 1000), 16);
    }
}

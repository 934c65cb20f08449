//! Pure legality checker over a snapshot of 32 piece slots (§4.2).
//!
//! `Board` never mutates anything; it is rebuilt from the current piece
//! set on every call that needs it and only answers geometry/occupancy
//! questions.

use crate::piece::{Phase, Piece};
use crate::types::{Color, PieceKind, Square};

pub struct Board {
    occupant: [[Option<Piece>; 8]; 8],
    incoming: [[[bool; 8]; 8]; 2],
}

impl Board {
    /// Builds a board from 32 piece slots; `None` means that piece has
    /// been captured and occupies no square.
    pub fn new(pieces: &[Option<Piece>]) -> Self {
        let mut occupant: [[Option<Piece>; 8]; 8] = [[None; 8]; 8];
        let mut incoming = [[[false; 8]; 8]; 2];

        for piece in pieces.iter().flatten() {
            let (f, r) = (piece.position.file as usize, piece.position.rank as usize);
            match piece.phase {
                Phase::Moving => {
                    incoming[piece.color.wire_code() as usize - 1][f][r] = true;
                }
                Phase::Static | Phase::Sleeping => {
                    occupant[f][r] = Some(*piece);
                }
            }
        }

        Self { occupant, incoming }
    }

    pub fn valid_position(name: &str) -> bool {
        Square::parse(name).is_some()
    }

    pub fn has_piece(&self, sq: Square) -> bool {
        self.occupant_at(sq).is_some()
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.occupant_at(sq)
    }

    fn occupant_at(&self, sq: Square) -> Option<Piece> {
        self.occupant[sq.file as usize][sq.rank as usize]
    }

    fn incoming_at(&self, color: Color, sq: Square) -> bool {
        self.incoming[color.wire_code() as usize - 1][sq.file as usize][sq.rank as usize]
    }

    /// Square has no STATIC/SLEEPING occupant (a MOVING piece targeting it
    /// does not count as blocking for this check).
    fn empty(&self, sq: Square) -> bool {
        self.occupant_at(sq).is_none()
    }

    /// Square is empty, or occupied by the opposing color (destination
    /// checks treat a square as open to capture regardless of whether a
    /// piece is mid-flight there; the actual collision is resolved later
    /// by the match engine on arrival).
    fn empty_or_opposing(&self, sq: Square, own_color: Color) -> bool {
        match self.occupant_at(sq) {
            None => true,
            Some(p) => p.color != own_color,
        }
    }

    /// A standing (non-MOVING) opposing piece — used for pawn captures,
    /// which may only take a piece that is actually standing still.
    fn opposing_standing(&self, sq: Square, own_color: Color) -> bool {
        match self.occupant_at(sq) {
            None => false,
            Some(p) => p.color != own_color,
        }
    }

    /// True iff every square strictly between `from` and `to` has no
    /// STATIC/SLEEPING occupant. MOVING pieces never block a path.
    fn clear_path(&self, from: Square, to: Square) -> bool {
        let df = step(to.file as i16 - from.file as i16);
        let dr = step(to.rank as i16 - from.rank as i16);

        let mut f = from.file as i16 + df;
        let mut r = from.rank as i16 + dr;
        while (f, r) != (to.file as i16, to.rank as i16) {
            if !self.empty(Square::new(f as u8, r as u8)) {
                return false;
            }
            f += df;
            r += dr;
        }
        true
    }

    pub fn valid_move(&self, from: Square, to: Square) -> bool {
        if from == to {
            return false;
        }

        let piece = match self.occupant_at(from) {
            Some(p) => p,
            None => return false,
        };
        if piece.phase == Phase::Sleeping {
            return false;
        }
        debug_assert_ne!(piece.phase, Phase::Moving, "moving pieces are not occupants");

        if self.incoming_at(piece.color, to) {
            return false;
        }

        match piece.kind {
            PieceKind::Pawn => self.valid_pawn_move(piece, from, to),
            PieceKind::Rook => {
                (from.file == to.file) != (from.rank == to.rank)
                    && self.clear_path(from, to)
                    && self.empty_or_opposing(to, piece.color)
            }
            PieceKind::Bishop => {
                diag(from, to) && self.clear_path(from, to) && self.empty_or_opposing(to, piece.color)
            }
            PieceKind::Queen => {
                (straight(from, to) || diag(from, to))
                    && self.clear_path(from, to)
                    && self.empty_or_opposing(to, piece.color)
            }
            PieceKind::King => {
                let (df, dr) = delta(from, to);
                df.max(dr) == 1 && self.empty_or_opposing(to, piece.color)
            }
            PieceKind::Knight => {
                let (df, dr) = delta(from, to);
                ((df, dr) == (1, 2) || (df, dr) == (2, 1))
                    && self.empty_or_opposing(to, piece.color)
            }
        }
    }

    fn valid_pawn_move(&self, piece: Piece, from: Square, to: Square) -> bool {
        let d = piece.color.pawn_direction();
        let target_rank = from.rank as i16 + d as i16;
        if target_rank < 0 || target_rank >= 8 {
            return false;
        }
        let one_step = Square::new(from.file, target_rank as u8);

        if from.file == to.file && to == one_step && self.empty(to) {
            return true;
        }

        if from.file == to.file
            && self.empty(one_step)
            && from.rank == piece.color.pawn_home_rank()
        {
            let two_step_rank = from.rank as i16 + 2 * d as i16;
            if two_step_rank >= 0 && two_step_rank < 8 {
                let two_step = Square::new(from.file, two_step_rank as u8);
                if to == two_step && self.empty(to) {
                    return true;
                }
            }
        }

        if (from.file as i16 - to.file as i16).abs() == 1
            && to.rank as i16 == target_rank
            && self.opposing_standing(to, piece.color)
        {
            return true;
        }

        false
    }
}

fn step(d: i16) -> i16 {
    d.signum()
}

fn delta(from: Square, to: Square) -> (i16, i16) {
    (
        (from.file as i16 - to.file as i16).abs(),
        (from.rank as i16 - to.rank as i16).abs(),
    )
}

fn straight(from: Square, to: Square) -> bool {
    from.file == to.file || from.rank == to.rank
}

fn diag(from: Square, to: Square) -> bool {
    let (df, dr) = delta(from, to);
    df == dr && df != 0
}

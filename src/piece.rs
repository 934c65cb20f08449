//! A single piece: its wire codec (§4.1) and its static/moving/sleeping
//! state machine (§4.3).

use thiserror::Error;

use crate::constants::{SLEEP_SECONDS, SQUARES_PER_SECOND};
use crate::types::{Color, PieceKind, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Static,
    Moving,
    Sleeping,
}

/// A piece's mutable state. `position` is the destination square while
/// `Moving`, the current square while `Static`/`Sleeping`. `end_time` is
/// the wall-clock instant (unix seconds) the current `Moving`/`Sleeping`
/// phase ends; meaningless while `Static`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
    pub phase: Phase,
    pub position: Square,
    pub end_time: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PieceCodecError {
    #[error("malformed piece token: {0:?}")]
    Malformed(String),
    #[error("unknown color code in token: {0:?}")]
    UnknownColor(String),
    #[error("unknown piece kind in token: {0:?}")]
    UnknownKind(String),
    #[error("invalid square in token: {0:?}")]
    InvalidSquare(String),
    #[error("invalid timestamp in token: {0:?}")]
    InvalidTimestamp(String),
}

impl Piece {
    pub fn new_static(color: Color, kind: PieceKind, position: Square) -> Self {
        Self {
            color,
            kind,
            phase: Phase::Static,
            position,
            end_time: 0.0,
        }
    }

    /// Initiates a move toward `to`. `end_time` is computed from the
    /// current position before `position` is overwritten, per §4.3's
    /// determinism requirement.
    pub fn begin_move(&mut self, to: Square, now: f64) {
        let seconds = self.position.distance(to) / SQUARES_PER_SECOND;
        self.end_time = now + seconds;
        self.position = to;
        self.phase = Phase::Moving;
    }

    /// Advances this piece's phase against `now`. Returns `true` if a
    /// Moving→Sleeping transition (i.e. an arrival) just happened, so the
    /// caller can resolve collisions before the second pass.
    pub fn advance(&mut self, now: f64) -> bool {
        match self.phase {
            Phase::Static => false,
            Phase::Moving => {
                if now >= self.end_time {
                    self.phase = Phase::Sleeping;
                    if self.kind == PieceKind::Pawn && self.position.rank == self.color.promotion_rank() {
                        self.kind = PieceKind::Queen;
                    }
                    self.end_time += SLEEP_SECONDS;
                    true
                } else {
                    false
                }
            }
            Phase::Sleeping => {
                if now >= self.end_time {
                    self.phase = Phase::Static;
                }
                false
            }
        }
    }

    pub fn encode(&self) -> String {
        let color = self.color.wire_code();
        let kind = self.kind.wire_code();
        let action = match self.phase {
            Phase::Static => self.position.name(),
            Phase::Moving => format!("M,{},{}", fmt_time(self.end_time), self.position.name()),
            Phase::Sleeping => format!("S,{},{}", fmt_time(self.end_time), self.position.name()),
        };
        format!("{color},{kind};{action}")
    }

    pub fn decode(token: &str) -> Result<Self, PieceCodecError> {
        let (color_kind, action) = token
            .split_once(';')
            .ok_or_else(|| PieceCodecError::Malformed(token.to_string()))?;
        let (color_str, kind_str) = color_kind
            .split_once(',')
            .ok_or_else(|| PieceCodecError::Malformed(token.to_string()))?;
        let color_code: u8 = color_str
            .parse()
            .map_err(|_| PieceCodecError::UnknownColor(token.to_string()))?;
        let color = Color::from_wire_code(color_code)
            .ok_or_else(|| PieceCodecError::UnknownColor(token.to_string()))?;
        let kind_code: u8 = kind_str
            .parse()
            .map_err(|_| PieceCodecError::UnknownKind(token.to_string()))?;
        let kind = PieceKind::from_wire_code(kind_code)
            .ok_or_else(|| PieceCodecError::UnknownKind(token.to_string()))?;

        if let Some(rest) = action.strip_prefix("M,") {
            let (end_time, square) = parse_timed_action(rest, token)?;
            Ok(Self {
                color,
                kind,
                phase: Phase::Moving,
                position: square,
                end_time,
            })
        } else if let Some(rest) = action.strip_prefix("S,") {
            let (end_time, square) = parse_timed_action(rest, token)?;
            Ok(Self {
                color,
                kind,
                phase: Phase::Sleeping,
                position: square,
                end_time,
            })
        } else {
            let square = Square::parse(action)
                .ok_or_else(|| PieceCodecError::InvalidSquare(token.to_string()))?;
            Ok(Self {
                color,
                kind,
                phase: Phase::Static,
                position: square,
                end_time: 0.0,
            })
        }
    }
}

fn parse_timed_action(rest: &str, token: &str) -> Result<(f64, Square), PieceCodecError> {
    let (time_str, square_str) = rest
        .split_once(',')
        .ok_or_else(|| PieceCodecError::Malformed(token.to_string()))?;
    let end_time: f64 = time_str
        .parse()
        .map_err(|_| PieceCodecError::InvalidTimestamp(token.to_string()))?;
    let square = Square::parse(square_str)
        .ok_or_else(|| PieceCodecError::InvalidSquare(token.to_string()))?;
    Ok((end_time, square))
}

/// Trims a trailing `.0` so e.g. `3` round-trips as `3` rather than `3.0`,
/// matching the rest of the format (minimal, stable textual form).
fn fmt_time(t: f64) -> String {
    if t.fract() == 0.0 {
        format!("{}", t as i64)
    } else {
        format!("{t}")
    }
}

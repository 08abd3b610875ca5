use thiserror::Error;

use crate::piece::Colour;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenParseError {
    #[error("expected 4 fields, got {0}")]
    FieldCount(usize),
    #[error("expected 8 board segments, got {0}")]
    BoardSegments(usize),
    #[error("board segment does not describe exactly 8 files")]
    BadSquaresInSegment,
    #[error("unexpected character in board field: {0:?}")]
    UnexpectedCharacter(char),
    #[error("invalid side to move: {0:?}")]
    InvalidSide(String),
    #[error("invalid castling field: {0:?}")]
    InvalidCastling(String),
    #[error("invalid en passant field: {0:?}")]
    InvalidEnPassant(String),
    #[error("no {0} king on the board")]
    MissingKing(Colour),
    #[error("more than one {0} king on the board")]
    DuplicateKings(Colour),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveParseError {
    #[error("invalid move length {0}")]
    InvalidLength(usize),
    #[error("invalid from-square file {0:?}")]
    InvalidFromSquareFile(char),
    #[error("invalid from-square rank {0:?}")]
    InvalidFromSquareRank(char),
    #[error("invalid to-square file {0:?}")]
    InvalidToSquareFile(char),
    #[error("invalid to-square rank {0:?}")]
    InvalidToSquareRank(char),
    #[error("invalid promotion piece {0:?}")]
    InvalidPromotionPiece(char),
}

/// A structural invariant of the position has been violated. These are
/// hard errors: a position that passed FEN validation always has exactly
/// one king per side, and make/undo preserve that.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardIntegrityError {
    #[error("no {0} king on the board")]
    KingNotFound(Colour),
}

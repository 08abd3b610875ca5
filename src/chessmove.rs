use std::fmt::{Debug, Display, Formatter};

use crate::{
    errors::MoveParseError,
    piece::{Piece, PieceType},
    types::Square,
};

/// What kind of move this is, beyond "piece goes from A to B".
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MoveFlag {
    #[default]
    Normal,
    DoublePush,
    Promotion(PieceType),
    EnPassant,
    CastleShort,
    CastleLong,
}

/// A move, carrying snapshots of the piece that moves and the piece on the
/// target square at generation time, so undo never has to re-derive what
/// was captured. An en-passant capture has `capture == None`: the captured
/// pawn does not sit on the target square.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub capture: Option<Piece>,
    pub flag: MoveFlag,
}

impl Move {
    pub const fn new(from: Square, to: Square, piece: Piece, capture: Option<Piece>) -> Self {
        Self {
            from,
            to,
            piece,
            capture,
            flag: MoveFlag::Normal,
        }
    }

    pub const fn with_flag(mut self, flag: MoveFlag) -> Self {
        self.flag = flag;
        self
    }

    pub const fn is_capture(&self) -> bool {
        self.capture.is_some() || matches!(self.flag, MoveFlag::EnPassant)
    }

    pub const fn promotion(&self) -> Option<PieceType> {
        match self.flag {
            MoveFlag::Promotion(piece_type) => Some(piece_type),
            _ => None,
        }
    }
}

/// Coordinate notation: 4 characters, or 5 with a trailing lowercase
/// promotion letter. This is the form the engine protocol speaks.
impl Display for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let MoveFlag::Promotion(piece_type) = self.flag {
            write!(f, "{}", piece_type.symbol())?;
        }
        Ok(())
    }
}

impl Debug for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} from {} to {}, capture {:?}, flag {:?}",
            self.piece, self.from, self.to, self.capture, self.flag
        )
    }
}

/// Parses the endpoints of a coordinate-notation move. The result is not
/// yet a [`Move`]: only generation against a position can recover the
/// capture and flag metadata the bare notation omits.
pub fn parse_coords(
    text: &str,
) -> Result<(Square, Square, Option<PieceType>), MoveParseError> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() != 4 && chars.len() != 5 {
        return Err(MoveParseError::InvalidLength(chars.len()));
    }
    let from = Square::from_coords(chars[0], chars[1]).ok_or({
        if ('a'..='h').contains(&chars[0]) {
            MoveParseError::InvalidFromSquareRank(chars[1])
        } else {
            MoveParseError::InvalidFromSquareFile(chars[0])
        }
    })?;
    let to = Square::from_coords(chars[2], chars[3]).ok_or({
        if ('a'..='h').contains(&chars[2]) {
            MoveParseError::InvalidToSquareRank(chars[3])
        } else {
            MoveParseError::InvalidToSquareFile(chars[2])
        }
    })?;
    let promotion = match chars.get(4) {
        None => None,
        Some(&c) => {
            let piece_type = PieceType::from_symbol(c)
                .filter(|pt| pt.legal_promo())
                .ok_or(MoveParseError::InvalidPromotionPiece(c))?;
            Some(piece_type)
        }
    };
    Ok((from, to, promotion))
}

use std::{
    fmt::{Debug, Display},
    ops::{Index, IndexMut, Not},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Colour {
    White,
    Black,
}

impl Display for Colour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::White => write!(f, "White"),
            Self::Black => write!(f, "Black"),
        }
    }
}

impl Colour {
    pub const fn flip(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn all() -> impl DoubleEndedIterator<Item = Self> {
        [Self::White, Self::Black].into_iter()
    }
}

impl Not for Colour {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.flip()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(u8)]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Display for PieceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pawn => write!(f, "Pawn"),
            Self::Knight => write!(f, "Knight"),
            Self::Bishop => write!(f, "Bishop"),
            Self::Rook => write!(f, "Rook"),
            Self::Queen => write!(f, "Queen"),
            Self::King => write!(f, "King"),
        }
    }
}

impl PieceType {
    pub const fn legal_promo(self) -> bool {
        matches!(self, Self::Queen | Self::Knight | Self::Bishop | Self::Rook)
    }

    /// The lowercase letter used for this piece type in FEN and in the
    /// promotion suffix of coordinate notation.
    pub const fn symbol(self) -> char {
        match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            'p' => Some(Self::Pawn),
            'n' => Some(Self::Knight),
            'b' => Some(Self::Bishop),
            'r' => Some(Self::Rook),
            'q' => Some(Self::Queen),
            'k' => Some(Self::King),
            _ => None,
        }
    }

    pub fn all() -> impl DoubleEndedIterator<Item = Self> {
        [
            Self::Pawn,
            Self::Knight,
            Self::Bishop,
            Self::Rook,
            Self::Queen,
            Self::King,
        ]
        .into_iter()
    }
}

/// A piece on the board. Empty squares are `Option::<Piece>::None`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Piece {
    pub colour: Colour,
    pub piece_type: PieceType,
}

impl Piece {
    pub const fn new(colour: Colour, piece_type: PieceType) -> Self {
        Self { colour, piece_type }
    }

    pub const fn is(self, colour: Colour, piece_type: PieceType) -> bool {
        self.colour as u8 == colour as u8 && self.piece_type as u8 == piece_type as u8
    }

    /// The FEN letter for this piece: uppercase for White, lowercase for
    /// Black.
    pub fn char(self) -> char {
        match self.colour {
            Colour::White => self.piece_type.symbol().to_ascii_uppercase(),
            Colour::Black => self.piece_type.symbol(),
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        let piece_type = PieceType::from_symbol(c.to_ascii_lowercase())?;
        let colour = if c.is_ascii_uppercase() {
            Colour::White
        } else {
            Colour::Black
        };
        Some(Self { colour, piece_type })
    }
}

impl Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.char())
    }
}

impl<T> Index<Colour> for [T; 2] {
    type Output = T;

    fn index(&self, index: Colour) -> &Self::Output {
        &self[index.index()]
    }
}

impl<T> IndexMut<Colour> for [T; 2] {
    fn index_mut(&mut self, index: Colour) -> &mut Self::Output {
        &mut self[index.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_round_trip() {
        for colour in Colour::all() {
            for piece_type in PieceType::all() {
                let piece = Piece::new(colour, piece_type);
                assert_eq!(
                    Piece::from_char(piece.char()),
                    Some(piece),
                    "round-trip failed for {colour:?} {piece_type:?}"
                );
            }
        }
    }

    #[test]
    fn char_case_convention() {
        for colour in Colour::all() {
            for piece_type in PieceType::all() {
                let c = Piece::new(colour, piece_type).char();
                if colour == Colour::White {
                    assert!(c.is_uppercase(), "white {piece_type:?} should be uppercase");
                } else {
                    assert!(c.is_lowercase(), "black {piece_type:?} should be lowercase");
                }
            }
        }
    }

    #[test]
    fn reject_non_piece_symbols() {
        for c in ['x', '1', '-', '/', ' '] {
            assert_eq!(Piece::from_char(c), None);
        }
    }

    #[test]
    fn promotion_pieces() {
        assert!(PieceType::Queen.legal_promo());
        assert!(PieceType::Rook.legal_promo());
        assert!(PieceType::Bishop.legal_promo());
        assert!(PieceType::Knight.legal_promo());
        assert!(!PieceType::Pawn.legal_promo());
        assert!(!PieceType::King.legal_promo());
    }
}

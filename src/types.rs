use std::{
    fmt::{self, Display},
    mem::size_of,
    ops::{Index, IndexMut},
};

use crate::piece::Colour;

/// A board square. The discriminant is the mailbox index
/// `file + row * 8`, where row 0 is the first rank of a FEN string
/// (Black's home rank) and file 0 is the a-file.
#[rustfmt::skip]
#[derive(PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum Square {
    A8, B8, C8, D8, E8, F8, G8, H8,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A1, B1, C1, D1, E1, F1, G1, H1,
}

const _SQUARE_ASSERT: () = assert!(size_of::<Square>() == size_of::<Option<Square>>());

static SQUARE_NAMES: [&str; 64] = [
    "a8", "b8", "c8", "d8", "e8", "f8", "g8", "h8", "a7", "b7", "c7", "d7", "e7", "f7", "g7", "h7",
    "a6", "b6", "c6", "d6", "e6", "f6", "g6", "h6", "a5", "b5", "c5", "d5", "e5", "f5", "g5", "h5",
    "a4", "b4", "c4", "d4", "e4", "f4", "g4", "h4", "a3", "b3", "c3", "d3", "e3", "f3", "g3", "h3",
    "a2", "b2", "c2", "d2", "e2", "f2", "g2", "h2", "a1", "b1", "c1", "d1", "e1", "f1", "g1", "h1",
];

impl Square {
    pub const fn new(inner: u8) -> Option<Self> {
        if inner < 64 {
            // SAFETY: inner is less than 64, so it corresponds to a valid enum variant.
            Some(unsafe { std::mem::transmute::<u8, Self>(inner) })
        } else {
            None
        }
    }

    pub const fn from_file_row(file: u8, row: u8) -> Option<Self> {
        if file < 8 && row < 8 {
            Self::new(file + row * 8)
        } else {
            None
        }
    }

    /// The file this square is on, 0 = the a-file.
    pub const fn file(self) -> u8 {
        self as u8 % 8
    }

    /// The row this square is on, 0 = the top of the board (rank 8).
    pub const fn row(self) -> u8 {
        self as u8 / 8
    }

    /// The conventional rank number, 1..=8.
    pub const fn rank(self) -> u8 {
        8 - self.row()
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn inner(self) -> u8 {
        self as u8
    }

    /// The square `file_delta` files and `row_delta` rows away, if it is
    /// on the board.
    pub const fn offset(self, file_delta: i8, row_delta: i8) -> Option<Self> {
        let file = self.file() as i8 + file_delta;
        let row = self.row() as i8 + row_delta;
        if file >= 0 && file < 8 && row >= 0 && row < 8 {
            Self::from_file_row(file as u8, row as u8)
        } else {
            None
        }
    }

    /// Parses the two-character coordinate form, e.g. "e4".
    pub fn from_coords(file_char: char, rank_char: char) -> Option<Self> {
        if !('a'..='h').contains(&file_char) || !('1'..='8').contains(&rank_char) {
            return None;
        }
        let file = file_char as u8 - b'a';
        let row = 7 - (rank_char as u8 - b'1');
        Self::from_file_row(file, row)
    }

    pub const fn file_char(self) -> char {
        (b'a' + self.file()) as char
    }

    pub const fn rank_char(self) -> char {
        (b'0' + self.rank()) as char
    }

    /// The row pawns of this colour promote on.
    pub const fn promotion_row(colour: Colour) -> u8 {
        match colour {
            Colour::White => 0,
            Colour::Black => 7,
        }
    }

    /// The row pawns of this colour start on.
    pub const fn pawn_home_row(colour: Colour) -> u8 {
        match colour {
            Colour::White => 6,
            Colour::Black => 1,
        }
    }

    pub fn all() -> impl DoubleEndedIterator<Item = Self> {
        // SAFETY: all values are within `0..64`.
        (0..64u8).map(|i| unsafe { std::mem::transmute(i) })
    }
}

impl Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SQUARE_NAMES[*self])
    }
}

impl<T> Index<Square> for [T; 64] {
    type Output = T;

    fn index(&self, index: Square) -> &Self::Output {
        &self[index.index()]
    }
}

impl<T> IndexMut<Square> for [T; 64] {
    fn index_mut(&mut self, index: Square) -> &mut Self::Output {
        &mut self[index.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_is_top_left_origin() {
        // rank 0 is the FEN's first (topmost) rank.
        assert_eq!(Square::A8.index(), 0);
        assert_eq!(Square::H8.index(), 7);
        assert_eq!(Square::A1.index(), 56);
        assert_eq!(Square::H1.index(), 63);
        assert_eq!(Square::E1.index(), 60);
        assert_eq!(Square::E8.index(), 4);
        assert_eq!(Square::new(Square::E4.inner()), Some(Square::E4));
        assert_eq!(Square::new(64), None);
    }

    #[test]
    fn rank_and_file_accessors() {
        assert_eq!(Square::E4.rank(), 4);
        assert_eq!(Square::E4.row(), 4);
        assert_eq!(Square::E4.file_char(), 'e');
        assert_eq!(Square::E4.rank_char(), '4');
        assert_eq!(Square::A8.rank(), 8);
        assert_eq!(Square::H1.rank(), 1);
    }

    #[test]
    fn coordinate_round_trip() {
        for sq in Square::all() {
            let name = sq.to_string();
            let mut chars = name.chars();
            let parsed = Square::from_coords(chars.next().unwrap(), chars.next().unwrap());
            assert_eq!(parsed, Some(sq));
        }
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert_eq!(Square::from_coords('i', '1'), None);
        assert_eq!(Square::from_coords('a', '9'), None);
        assert_eq!(Square::from_coords('a', '0'), None);
    }

    #[test]
    fn offsets_clip_at_edges() {
        assert_eq!(Square::A8.offset(-1, 0), None);
        assert_eq!(Square::A8.offset(0, -1), None);
        assert_eq!(Square::H1.offset(1, 0), None);
        assert_eq!(Square::H1.offset(0, 1), None);
        assert_eq!(Square::E4.offset(1, -1), Some(Square::F5));
    }

    #[test]
    fn pawn_rows() {
        assert_eq!(Square::E2.row(), Square::pawn_home_row(Colour::White));
        assert_eq!(Square::E7.row(), Square::pawn_home_row(Colour::Black));
        assert_eq!(Square::E8.row(), Square::promotion_row(Colour::White));
        assert_eq!(Square::E1.row(), Square::promotion_row(Colour::Black));
    }
}

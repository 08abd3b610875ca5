use std::fmt::{self, Display};

use arrayvec::ArrayVec;

use crate::{
    board::{CastlingRights, EnPassant},
    errors::FenParseError,
    piece::{Colour, Piece, PieceType},
    types::Square,
};

/// The canonical starting position, in the 4-field form this codec
/// speaks (no halfmove/fullmove counters are modelled).
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";

/// A parsed FEN representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    pub pieces: [Option<Piece>; 64],
    pub turn: Colour,
    pub castling: CastlingRights,
    pub ep: Option<EnPassant>,
}

impl Fen {
    /// Parse a FEN string. Exactly 4 fields: piece placement, side to
    /// move, castling rights, en passant target.
    pub fn parse(fen: &str) -> Result<Self, FenParseError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(FenParseError::FieldCount(fields.len()));
        }

        let pieces = Self::parse_board(fields[0])?;
        let turn = Self::parse_turn(fields[1])?;
        let castling = Self::parse_castling(fields[2])?;
        let ep = Self::parse_ep(fields[3])?;

        Ok(Self {
            pieces,
            turn,
            castling,
            ep,
        })
    }

    fn parse_board(board_str: &str) -> Result<[Option<Piece>; 64], FenParseError> {
        let mut pieces = [None; 64];

        let mut rows = ArrayVec::<&str, 8>::new();
        let mut board_parts = board_str.split('/');
        while let Some(row) = board_parts.next() {
            if rows.try_push(row).is_err() {
                // 8 successfully parsed, plus one now, plus the rest.
                return Err(FenParseError::BoardSegments(8 + 1 + board_parts.count()));
            }
        }
        if rows.len() != 8 {
            return Err(FenParseError::BoardSegments(rows.len()));
        }

        for (row, row_str) in rows.iter().enumerate() {
            let mut file: u8 = 0;
            for c in row_str.chars() {
                match c {
                    '1'..='8' => {
                        file += c as u8 - b'0';
                        if file > 8 {
                            return Err(FenParseError::BadSquaresInSegment);
                        }
                    }
                    _ => {
                        let piece =
                            Piece::from_char(c).ok_or(FenParseError::UnexpectedCharacter(c))?;
                        if file >= 8 {
                            return Err(FenParseError::BadSquaresInSegment);
                        }
                        pieces[file as usize + row * 8] = Some(piece);
                        file += 1;
                    }
                }
            }
            if file != 8 {
                return Err(FenParseError::BadSquaresInSegment);
            }
        }

        // A position without exactly one king per side is rejected for a
        // different reason than malformed syntax.
        for colour in Colour::all() {
            let kings = pieces
                .iter()
                .flatten()
                .filter(|p| p.is(colour, PieceType::King))
                .count();
            match kings {
                0 => return Err(FenParseError::MissingKing(colour)),
                1 => (),
                _ => return Err(FenParseError::DuplicateKings(colour)),
            }
        }

        Ok(pieces)
    }

    fn parse_turn(s: &str) -> Result<Colour, FenParseError> {
        match s {
            "w" => Ok(Colour::White),
            "b" => Ok(Colour::Black),
            _ => Err(FenParseError::InvalidSide(s.to_string())),
        }
    }

    fn parse_castling(s: &str) -> Result<CastlingRights, FenParseError> {
        if s == "-" {
            return Ok(CastlingRights::default());
        }

        // A subset of "KQkq", in that canonical order.
        let mut white_short = false;
        let mut white_long = false;
        let mut black_short = false;
        let mut black_long = false;
        let mut remaining = "KQkq";
        for c in s.chars() {
            let Some(at) = remaining.find(c) else {
                return Err(FenParseError::InvalidCastling(s.to_string()));
            };
            match c {
                'K' => white_short = true,
                'Q' => white_long = true,
                'k' => black_short = true,
                'q' => black_long = true,
                _ => return Err(FenParseError::InvalidCastling(s.to_string())),
            }
            remaining = &remaining[at + 1..];
        }

        Ok(CastlingRights::new(
            white_short,
            white_long,
            black_short,
            black_long,
        ))
    }

    fn parse_ep(s: &str) -> Result<Option<EnPassant>, FenParseError> {
        if s == "-" {
            return Ok(None);
        }

        let mut chars = s.chars();
        let (Some(file_char), Some(rank_char), None) =
            (chars.next(), chars.next(), chars.next())
        else {
            return Err(FenParseError::InvalidEnPassant(s.to_string()));
        };
        if !('a'..='h').contains(&file_char) {
            return Err(FenParseError::InvalidEnPassant(s.to_string()));
        }
        let file = file_char as u8 - b'a';

        // Only the two ranks reachable by a double push are legal. The
        // stored square is that of the pawn itself, one row behind the
        // target.
        let (row, colour) = match rank_char {
            '3' => (4, Colour::White),
            '6' => (3, Colour::Black),
            _ => return Err(FenParseError::InvalidEnPassant(s.to_string())),
        };
        let Some(pawn) = Square::from_file_row(file, row) else {
            return Err(FenParseError::InvalidEnPassant(s.to_string()));
        };

        Ok(Some(EnPassant { pawn, colour }))
    }
}

impl Display for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Piece placement, top rank first, with empty-run compression.
        for row in 0..8 {
            let mut empty = 0;
            for file in 0..8 {
                match self.pieces[file + row * 8] {
                    Some(piece) => {
                        if empty != 0 {
                            write!(f, "{empty}")?;
                        }
                        empty = 0;
                        write!(f, "{piece}")?;
                    }
                    None => empty += 1,
                }
            }
            if empty != 0 {
                write!(f, "{empty}")?;
            }
            if row < 7 {
                write!(f, "/")?;
            }
        }

        // Side to move.
        match self.turn {
            Colour::White => write!(f, " w ")?,
            Colour::Black => write!(f, " b ")?,
        }

        // Castling rights, canonical letter order, absent letters omitted.
        if self.castling.any(Colour::White) || self.castling.any(Colour::Black) {
            if self.castling.kingside(Colour::White) {
                write!(f, "K")?;
            }
            if self.castling.queenside(Colour::White) {
                write!(f, "Q")?;
            }
            if self.castling.kingside(Colour::Black) {
                write!(f, "k")?;
            }
            if self.castling.queenside(Colour::Black) {
                write!(f, "q")?;
            }
        } else {
            write!(f, "-")?;
        }

        // En passant target: the square behind the double-pushed pawn.
        match self.ep {
            Some(ep) => {
                let rank = match ep.colour {
                    Colour::White => '3',
                    Colour::Black => '6',
                };
                write!(f, " {}{rank}", ep.pawn.file_char())
            }
            None => write!(f, " -"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_startpos() {
        let fen = Fen::parse(START_FEN).unwrap();
        assert_eq!(fen.turn, Colour::White);
        assert!(fen.ep.is_none());
        assert!(fen.castling.kingside(Colour::White));
        assert!(fen.castling.queenside(Colour::Black));
        assert_eq!(
            fen.pieces[Square::E1],
            Some(Piece::new(Colour::White, PieceType::King))
        );
        assert_eq!(
            fen.pieces[Square::A8],
            Some(Piece::new(Colour::Black, PieceType::Rook))
        );
    }

    #[test]
    fn startpos_round_trip() {
        let fen = Fen::parse(START_FEN).unwrap();
        assert_eq!(fen.to_string(), START_FEN);
    }

    #[test]
    fn round_trip_is_idempotent() {
        for fen_str in [
            "4Q3/2B2Pp1/p5kp/P7/4q3/b1p4P/5PPK/4r3 w - -",
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -",
            "4k3/8/8/8/8/8/8/4K3 b -  -",
        ] {
            let once = Fen::parse(fen_str).unwrap().to_string();
            let twice = Fen::parse(&once).unwrap().to_string();
            assert_eq!(once, twice, "normalization not stable for {fen_str}");
        }
    }

    #[test]
    fn parse_ep_square() {
        let fen =
            Fen::parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3").unwrap();
        let ep = fen.ep.unwrap();
        assert_eq!(ep.pawn, Square::E4);
        assert_eq!(ep.colour, Colour::White);

        let fen =
            Fen::parse("rnbqkbnr/ppp1pppp/8/3p4/8/8/PPPPPPPP/RNBQKBNR w KQkq d6").unwrap();
        let ep = fen.ep.unwrap();
        assert_eq!(ep.pawn, Square::D5);
        assert_eq!(ep.colour, Colour::Black);
    }

    #[test]
    fn reject_wrong_field_count() {
        assert_eq!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq"),
            Err(FenParseError::FieldCount(3))
        );
        assert_eq!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenParseError::FieldCount(6))
        );
    }

    #[test]
    fn reject_bad_segments() {
        assert_eq!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"),
            Err(FenParseError::BoardSegments(7))
        );
        assert_eq!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"),
            Err(FenParseError::BoardSegments(9))
        );
    }

    #[test]
    fn reject_bad_rank_sums() {
        // seven files
        assert_eq!(
            Fen::parse("rnbqkbnr/ppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"),
            Err(FenParseError::BadSquaresInSegment)
        );
        // nine files
        assert_eq!(
            Fen::parse("rnbqkbnr/ppppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"),
            Err(FenParseError::BadSquaresInSegment)
        );
    }

    #[test]
    fn reject_unexpected_character() {
        assert_eq!(
            Fen::parse("rnbqkbnr/ppppxppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"),
            Err(FenParseError::UnexpectedCharacter('x'))
        );
    }

    #[test]
    fn reject_invalid_side() {
        assert_eq!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR W KQkq -"),
            Err(FenParseError::InvalidSide("W".to_string()))
        );
    }

    #[test]
    fn castling_letters_must_be_in_canonical_order() {
        assert!(Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w Kq -").is_ok());
        assert_eq!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w QK -"),
            Err(FenParseError::InvalidCastling("QK".to_string()))
        );
        assert_eq!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KK -"),
            Err(FenParseError::InvalidCastling("KK".to_string()))
        );
    }

    #[test]
    fn reject_invalid_ep() {
        for ep in ["e4", "e9", "i3", "e33", "3e"] {
            let fen = format!("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq {ep}");
            assert_eq!(
                Fen::parse(&fen),
                Err(FenParseError::InvalidEnPassant(ep.to_string())),
                "expected rejection of {ep:?}"
            );
        }
    }

    #[test]
    fn king_count_is_a_distinct_rejection() {
        assert_eq!(
            Fen::parse("8/8/8/8/8/8/8/4K3 w - -"),
            Err(FenParseError::MissingKing(Colour::Black))
        );
        assert_eq!(
            Fen::parse("4k3/8/8/8/8/8/8/8 w - -"),
            Err(FenParseError::MissingKing(Colour::White))
        );
        assert_eq!(
            Fen::parse("4k3/8/8/8/8/8/8/2K1K3 w - -"),
            Err(FenParseError::DuplicateKings(Colour::White))
        );
    }
}

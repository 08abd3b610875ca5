use std::fmt::{self, Display};

use crate::{
    chessmove::{Move, MoveFlag},
    errors::{BoardIntegrityError, FenParseError},
    fen::{Fen, START_FEN},
    piece::{Colour, Piece, PieceType},
    types::Square,
};

/// Castling availability. A side's effective right on a wing requires both
/// its aggregate flag (cleared when the king moves) and the wing-specific
/// flag (cleared when that rook moves or is captured on its home square).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CastlingRights {
    white: bool,
    black: bool,
    white_short: bool,
    white_long: bool,
    black_short: bool,
    black_long: bool,
}

impl CastlingRights {
    pub const fn new(
        white_short: bool,
        white_long: bool,
        black_short: bool,
        black_long: bool,
    ) -> Self {
        Self {
            white: white_short || white_long,
            black: black_short || black_long,
            white_short,
            white_long,
            black_short,
            black_long,
        }
    }

    pub const fn kingside(self, colour: Colour) -> bool {
        match colour {
            Colour::White => self.white && self.white_short,
            Colour::Black => self.black && self.black_short,
        }
    }

    pub const fn queenside(self, colour: Colour) -> bool {
        match colour {
            Colour::White => self.white && self.white_long,
            Colour::Black => self.black && self.black_long,
        }
    }

    pub const fn any(self, colour: Colour) -> bool {
        self.kingside(colour) || self.queenside(colour)
    }

    pub fn revoke_all(&mut self, colour: Colour) {
        match colour {
            Colour::White => self.white = false,
            Colour::Black => self.black = false,
        }
    }

    pub fn revoke_kingside(&mut self, colour: Colour) {
        match colour {
            Colour::White => self.white_short = false,
            Colour::Black => self.black_short = false,
        }
    }

    pub fn revoke_queenside(&mut self, colour: Colour) {
        match colour {
            Colour::White => self.white_long = false,
            Colour::Black => self.black_long = false,
        }
    }
}

/// An en-passant opportunity: the square of the pawn that just double
/// pushed, and its colour. The capture target square in FEN terms is the
/// square the pawn skipped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnPassant {
    pub pawn: Square,
    pub colour: Colour,
}

/// The irreversible parts of the position, snapshotted before each move so
/// undo can restore them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GameState {
    castling: CastlingRights,
    ep: Option<EnPassant>,
}

/// A chess position plus its full move history.
///
/// The board is a 64-slot mailbox indexed `file + row * 8` with row 0 at
/// the top (Black's home rank), mirrored by one ordered occupied-square
/// list per colour. The two representations are kept in lockstep by
/// [`Self::make_move`] and [`Self::undo_move`].
///
/// The history is authoritative: the position is always reproducible as
/// `start_fen` plus `moves_played`, which is exactly the form the UCI
/// `position` command wants.
#[derive(Debug, Clone)]
pub struct Board {
    pieces: [Option<Piece>; 64],
    occupied: [Vec<Square>; 2],
    turn: Colour,
    castling: CastlingRights,
    ep: Option<EnPassant>,
    start_fen: String,
    history: Vec<(Move, GameState)>,
    undone: Vec<Move>,
}

impl Board {
    pub fn new() -> Self {
        #[allow(clippy::expect_used)]
        Self::from_fen(START_FEN).expect("the starting position FEN is valid")
    }

    pub fn from_fen(fen_str: &str) -> Result<Self, FenParseError> {
        let fen = Fen::parse(fen_str)?;

        let mut occupied = [Vec::with_capacity(16), Vec::with_capacity(16)];
        for sq in Square::all() {
            if let Some(piece) = fen.pieces[sq] {
                occupied[piece.colour].push(sq);
            }
        }

        Ok(Self {
            pieces: fen.pieces,
            occupied,
            turn: fen.turn,
            castling: fen.castling,
            ep: fen.ep,
            // Stored in normalized form so the derived engine commands are
            // canonical regardless of input spelling.
            start_fen: fen.to_string(),
            history: Vec::new(),
            undone: Vec::new(),
        })
    }

    /// Replaces the position, discarding all history.
    pub fn load_fen(&mut self, fen_str: &str) -> Result<(), FenParseError> {
        *self = Self::from_fen(fen_str)?;
        Ok(())
    }

    /// The current position encoded as FEN.
    pub fn fen(&self) -> String {
        Fen {
            pieces: self.pieces,
            turn: self.turn,
            castling: self.castling,
            ep: self.ep,
        }
        .to_string()
    }

    pub const fn turn(&self) -> Colour {
        self.turn
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.pieces[sq]
    }

    /// The squares occupied by `colour`, in insertion order.
    pub fn occupied(&self, colour: Colour) -> &[Square] {
        &self.occupied[colour]
    }

    pub const fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub const fn en_passant(&self) -> Option<EnPassant> {
        self.ep
    }

    pub fn king_square(&self, colour: Colour) -> Result<Square, BoardIntegrityError> {
        self.occupied[colour]
            .iter()
            .copied()
            .find(|&sq| self.pieces[sq].is_some_and(|p| p.is(colour, PieceType::King)))
            .ok_or(BoardIntegrityError::KingNotFound(colour))
    }

    /// The FEN the history is rooted at, in normalized form.
    pub fn start_fen(&self) -> &str {
        &self.start_fen
    }

    pub fn moves_played(&self) -> impl ExactSizeIterator<Item = Move> + '_ {
        self.history.iter().map(|&(m, _)| m)
    }

    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|&(m, _)| m)
    }

    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    /// The UCI `position` command reproducing this position from the
    /// history root.
    pub fn uci_position(&self) -> String {
        let mut cmd = format!("position fen {}", self.start_fen);
        if !self.history.is_empty() {
            cmd.push_str(" moves");
            for m in self.moves_played() {
                cmd.push(' ');
                cmd.push_str(&m.to_string());
            }
        }
        cmd
    }

    /// Plays a move. The move is trusted: it must have come from move
    /// generation against this exact position. Playing a new move discards
    /// any redoable moves.
    pub fn make_move(&mut self, m: Move) {
        self.undone.clear();
        self.apply_move(m);
    }

    /// Takes back the last move, restoring the position verbatim and
    /// making the move redoable. Returns the move taken back.
    pub fn undo_move(&mut self) -> Option<Move> {
        let (m, state) = self.history.pop()?;
        let colour = m.piece.colour;
        let opponent = !colour;

        // The mover goes back to its source square as the piece it was
        // when the move was made, which also reverts promotions.
        self.pieces[m.from] = Some(m.piece);
        self.pieces[m.to] = m.capture;
        self.remove_occupied(colour, m.to);
        self.occupied[colour].push(m.from);
        if m.capture.is_some() {
            self.occupied[opponent].push(m.to);
        }

        match m.flag {
            MoveFlag::EnPassant => {
                // The captured pawn was not on the target square. Recreate
                // it where the pre-move en-passant state says it stood.
                if let Some(ep) = state.ep {
                    self.pieces[ep.pawn] = Some(Piece::new(opponent, PieceType::Pawn));
                    self.occupied[opponent].push(ep.pawn);
                }
            }
            MoveFlag::CastleShort => {
                let (rook_home, rook_castled) = Self::short_rook_squares(colour);
                self.move_piece(rook_castled, rook_home);
            }
            MoveFlag::CastleLong => {
                let (rook_home, rook_castled) = Self::long_rook_squares(colour);
                self.move_piece(rook_castled, rook_home);
            }
            MoveFlag::Normal | MoveFlag::DoublePush | MoveFlag::Promotion(_) => (),
        }

        self.castling = state.castling;
        self.ep = state.ep;
        self.turn = !self.turn;
        self.undone.push(m);

        #[cfg(debug_assertions)]
        self.check_lockstep();

        Some(m)
    }

    /// Replays the most recently undone move, if any.
    pub fn redo_move(&mut self) -> Option<Move> {
        let m = self.undone.pop()?;
        self.apply_move(m);
        Some(m)
    }

    fn apply_move(&mut self, m: Move) {
        self.history.push((
            m,
            GameState {
                castling: self.castling,
                ep: self.ep,
            },
        ));

        let colour = m.piece.colour;
        let opponent = !colour;
        let prior_ep = self.ep;

        if m.capture.is_some() {
            self.remove_occupied(opponent, m.to);
        }
        self.remove_occupied(colour, m.from);
        self.occupied[colour].push(m.to);
        self.pieces[m.from] = None;
        self.pieces[m.to] = Some(m.piece);

        match m.flag {
            MoveFlag::Normal => {
                self.ep = None;
            }
            MoveFlag::DoublePush => {
                self.ep = Some(EnPassant { pawn: m.to, colour });
            }
            MoveFlag::Promotion(piece_type) => {
                self.pieces[m.to] = Some(Piece::new(colour, piece_type));
                self.ep = None;
            }
            MoveFlag::EnPassant => {
                debug_assert!(prior_ep.is_some_and(|ep| ep.colour == opponent));
                if let Some(ep) = prior_ep {
                    self.pieces[ep.pawn] = None;
                    self.remove_occupied(opponent, ep.pawn);
                }
                self.ep = None;
            }
            MoveFlag::CastleShort => {
                let (rook_home, rook_castled) = Self::short_rook_squares(colour);
                self.move_piece(rook_home, rook_castled);
                self.ep = None;
            }
            MoveFlag::CastleLong => {
                let (rook_home, rook_castled) = Self::long_rook_squares(colour);
                self.move_piece(rook_home, rook_castled);
                self.ep = None;
            }
        }

        // Any move touching a king or rook home square revokes the
        // corresponding rights, including a capture landing on the rook's
        // square.
        for sq in [m.from, m.to] {
            match sq {
                Square::E1 => self.castling.revoke_all(Colour::White),
                Square::E8 => self.castling.revoke_all(Colour::Black),
                Square::H1 => self.castling.revoke_kingside(Colour::White),
                Square::A1 => self.castling.revoke_queenside(Colour::White),
                Square::H8 => self.castling.revoke_kingside(Colour::Black),
                Square::A8 => self.castling.revoke_queenside(Colour::Black),
                _ => (),
            }
        }

        self.turn = !self.turn;

        #[cfg(debug_assertions)]
        self.check_lockstep();
    }

    /// Moves a piece between squares, with no capture and no state
    /// bookkeeping. Used for the rook leg of castling.
    fn move_piece(&mut self, from: Square, to: Square) {
        if let Some(piece) = self.pieces[from].take() {
            self.pieces[to] = Some(piece);
            self.remove_occupied(piece.colour, from);
            self.occupied[piece.colour].push(to);
        }
    }

    fn remove_occupied(&mut self, colour: Colour, sq: Square) {
        if let Some(at) = self.occupied[colour].iter().position(|&s| s == sq) {
            self.occupied[colour].remove(at);
        }
    }

    /// (home, castled) squares for the kingside rook.
    const fn short_rook_squares(colour: Colour) -> (Square, Square) {
        match colour {
            Colour::White => (Square::H1, Square::F1),
            Colour::Black => (Square::H8, Square::F8),
        }
    }

    /// (home, castled) squares for the queenside rook.
    const fn long_rook_squares(colour: Colour) -> (Square, Square) {
        match colour {
            Colour::White => (Square::A1, Square::D1),
            Colour::Black => (Square::A8, Square::D8),
        }
    }

    #[cfg(debug_assertions)]
    fn check_lockstep(&self) {
        for colour in Colour::all() {
            for &sq in &self.occupied[colour] {
                assert!(
                    self.pieces[sq].is_some_and(|p| p.colour == colour),
                    "occupied list for {colour} claims {sq} but the mailbox disagrees"
                );
            }
        }
        let on_board = self.pieces.iter().flatten().count();
        let listed = self.occupied[0].len() + self.occupied[1].len();
        assert_eq!(on_board, listed, "mailbox and occupied lists out of lockstep");
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..8u8 {
            write!(f, "{} ", 8 - row)?;
            for file in 0..8u8 {
                match Square::from_file_row(file, row).and_then(|sq| self.pieces[sq]) {
                    Some(piece) => write!(f, " {piece}")?,
                    None => write!(f, " .")?,
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "   a b c d e f g h")?;
        writeln!(f, "fen: {}", self.fen())
    }
}

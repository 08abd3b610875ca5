use crate::{
    board::Board,
    chessmove::{Move, MoveFlag},
    errors::BoardIntegrityError,
    piece::{Colour, Piece, PieceType},
    types::Square,
};

/// Verdict on the position from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Check,
    Checkmate,
    Stalemate,
}

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

const fn leaper_table(deltas: [(i8, i8); 8]) -> [[Option<Square>; 8]; 64] {
    let mut table = [[None; 8]; 64];
    let mut sq = 0;
    while sq < 64 {
        let square = match Square::new(sq as u8) {
            Some(square) => square,
            None => unreachable!(),
        };
        let mut i = 0;
        while i < 8 {
            table[sq][i] = square.offset(deltas[i].0, deltas[i].1);
            i += 1;
        }
        sq += 1;
    }
    table
}

static KNIGHT_MOVES: [[Option<Square>; 8]; 64] = leaper_table(KNIGHT_DELTAS);
static KING_MOVES: [[Option<Square>; 8]; 64] = leaper_table(KING_DELTAS);

/// Whether `by` attacks `sq`, by direct geometry rather than by scanning
/// generated moves. The distinction matters for castling: a pawn attacks
/// its capture squares even when they are empty, so transit safety cannot
/// be read off the opponent's pseudo-legal move list.
pub fn is_square_attacked(board: &Board, sq: Square, by: Colour) -> bool {
    // Pawns. A pawn of `by` attacks diagonally toward its opponent, so
    // from the target we look one row back toward `by`'s home.
    let back = match by {
        Colour::White => 1,
        Colour::Black => -1,
    };
    for side in [-1, 1] {
        if let Some(from) = sq.offset(side, back) {
            if board
                .piece_at(from)
                .is_some_and(|p| p.is(by, PieceType::Pawn))
            {
                return true;
            }
        }
    }

    for from in KNIGHT_MOVES[sq].iter().flatten() {
        if board
            .piece_at(*from)
            .is_some_and(|p| p.is(by, PieceType::Knight))
        {
            return true;
        }
    }

    for from in KING_MOVES[sq].iter().flatten() {
        if board
            .piece_at(*from)
            .is_some_and(|p| p.is(by, PieceType::King))
        {
            return true;
        }
    }

    slider_attack(board, sq, by, &BISHOP_DIRS, PieceType::Bishop)
        || slider_attack(board, sq, by, &ROOK_DIRS, PieceType::Rook)
}

fn slider_attack(
    board: &Board,
    sq: Square,
    by: Colour,
    dirs: &[(i8, i8); 4],
    slider: PieceType,
) -> bool {
    for &(df, dr) in dirs {
        let mut cur = sq;
        while let Some(next) = cur.offset(df, dr) {
            match board.piece_at(next) {
                None => cur = next,
                Some(p) => {
                    if p.colour == by
                        && (p.piece_type == slider || p.piece_type == PieceType::Queen)
                    {
                        return true;
                    }
                    break;
                }
            }
        }
    }
    false
}

/// Whether `colour`'s king is attacked.
pub fn in_check(board: &Board, colour: Colour) -> Result<bool, BoardIntegrityError> {
    let king = board.king_square(colour)?;
    Ok(is_square_attacked(board, king, !colour))
}

/// Pseudo-legal moves for the piece on `from`, ignoring whose turn it is.
/// Self-check is not filtered here; see [`legal_moves`].
pub fn pseudo_legal_from(board: &Board, from: Square) -> Vec<Move> {
    let mut moves = Vec::new();
    let Some(piece) = board.piece_at(from) else {
        return moves;
    };

    match piece.piece_type {
        PieceType::Pawn => pawn_moves(board, from, piece, &mut moves),
        PieceType::Knight => leaper_moves(board, from, piece, &KNIGHT_MOVES[from], &mut moves),
        PieceType::Bishop => slider_moves(board, from, piece, &BISHOP_DIRS, &mut moves),
        PieceType::Rook => slider_moves(board, from, piece, &ROOK_DIRS, &mut moves),
        PieceType::Queen => {
            slider_moves(board, from, piece, &BISHOP_DIRS, &mut moves);
            slider_moves(board, from, piece, &ROOK_DIRS, &mut moves);
        }
        PieceType::King => {
            leaper_moves(board, from, piece, &KING_MOVES[from], &mut moves);
            castle_moves(board, from, piece, &mut moves);
        }
    }

    moves
}

/// All pseudo-legal moves for `colour`, whether or not it has the move.
pub fn pseudo_legal_moves(board: &Board, colour: Colour) -> Vec<Move> {
    let mut moves = Vec::new();
    for &from in board.occupied(colour) {
        moves.extend(pseudo_legal_from(board, from));
    }
    moves
}

/// All legal moves for `colour`: pseudo-legal moves that do not leave
/// that side's own king attacked, tested by playing each one out on a
/// scratch copy.
pub fn legal_moves(board: &Board, colour: Colour) -> Result<Vec<Move>, BoardIntegrityError> {
    filter_self_check(board, pseudo_legal_moves(board, colour), colour)
}

/// Legal moves for the piece on `from`, regardless of whose turn it is.
/// This is the per-square query a front end uses for highlighting.
pub fn legal_moves_from(board: &Board, from: Square) -> Result<Vec<Move>, BoardIntegrityError> {
    match board.piece_at(from) {
        Some(piece) => filter_self_check(board, pseudo_legal_from(board, from), piece.colour),
        None => Ok(Vec::new()),
    }
}

fn filter_self_check(
    board: &Board,
    moves: Vec<Move>,
    mover: Colour,
) -> Result<Vec<Move>, BoardIntegrityError> {
    let mut scratch = board.clone();
    let mut legal = Vec::new();
    for m in moves {
        scratch.make_move(m);
        let safe = !in_check(&scratch, mover)?;
        scratch.undo_move();
        if safe {
            legal.push(m);
        }
    }
    Ok(legal)
}

/// Looks up the legal move matching the given endpoints and promotion
/// choice, if one exists in the current position.
pub fn find_move(
    board: &Board,
    from: Square,
    to: Square,
    promotion: Option<PieceType>,
) -> Result<Option<Move>, BoardIntegrityError> {
    let found = legal_moves(board, board.turn())?
        .into_iter()
        .find(|m| m.from == from && m.to == to && m.promotion() == promotion);
    Ok(found)
}

/// Classifies the position for the side to move.
pub fn game_status(board: &Board) -> Result<GameStatus, BoardIntegrityError> {
    let checked = in_check(board, board.turn())?;
    let has_moves = !legal_moves(board, board.turn())?.is_empty();
    Ok(match (checked, has_moves) {
        (true, false) => GameStatus::Checkmate,
        (false, false) => GameStatus::Stalemate,
        (true, true) => GameStatus::Check,
        (false, true) => GameStatus::Ongoing,
    })
}

fn push_pawn_move(piece: Piece, m: Move, moves: &mut Vec<Move>) {
    if m.to.row() == Square::promotion_row(piece.colour) {
        for promo in [
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Rook,
            PieceType::Queen,
        ] {
            moves.push(m.with_flag(MoveFlag::Promotion(promo)));
        }
    } else {
        moves.push(m);
    }
}

fn pawn_moves(board: &Board, from: Square, piece: Piece, moves: &mut Vec<Move>) {
    let colour = piece.colour;
    let forward = match colour {
        Colour::White => -1,
        Colour::Black => 1,
    };

    // Pushes. The double push requires both squares empty and the pawn on
    // its home row.
    if let Some(one) = from.offset(0, forward) {
        if board.piece_at(one).is_none() {
            push_pawn_move(piece, Move::new(from, one, piece, None), moves);
            if from.row() == Square::pawn_home_row(colour) {
                if let Some(two) = one.offset(0, forward) {
                    if board.piece_at(two).is_none() {
                        moves.push(
                            Move::new(from, two, piece, None).with_flag(MoveFlag::DoublePush),
                        );
                    }
                }
            }
        }
    }

    // Diagonal captures, including en passant when the neighbouring file
    // holds the opponent's just-double-pushed pawn.
    for side in [-1, 1] {
        let Some(to) = from.offset(side, forward) else {
            continue;
        };
        match board.piece_at(to) {
            Some(target) if target.colour != colour => {
                push_pawn_move(piece, Move::new(from, to, piece, Some(target)), moves);
            }
            Some(_) => (),
            None => {
                let beside = from.offset(side, 0);
                if let Some(ep) = board.en_passant() {
                    if ep.colour != colour && beside == Some(ep.pawn) {
                        moves.push(
                            Move::new(from, to, piece, None).with_flag(MoveFlag::EnPassant),
                        );
                    }
                }
            }
        }
    }
}

fn leaper_moves(
    board: &Board,
    from: Square,
    piece: Piece,
    targets: &[Option<Square>; 8],
    moves: &mut Vec<Move>,
) {
    for &to in targets.iter().flatten() {
        match board.piece_at(to) {
            None => moves.push(Move::new(from, to, piece, None)),
            Some(target) if target.colour != piece.colour => {
                moves.push(Move::new(from, to, piece, Some(target)));
            }
            Some(_) => (),
        }
    }
}

fn slider_moves(
    board: &Board,
    from: Square,
    piece: Piece,
    dirs: &[(i8, i8); 4],
    moves: &mut Vec<Move>,
) {
    for &(df, dr) in dirs {
        let mut cur = from;
        while let Some(to) = cur.offset(df, dr) {
            match board.piece_at(to) {
                None => {
                    moves.push(Move::new(from, to, piece, None));
                    cur = to;
                }
                Some(target) => {
                    if target.colour != piece.colour {
                        moves.push(Move::new(from, to, piece, Some(target)));
                    }
                    break;
                }
            }
        }
    }
}

fn castle_moves(board: &Board, from: Square, piece: Piece, moves: &mut Vec<Move>) {
    let colour = piece.colour;
    let home = match colour {
        Colour::White => Square::E1,
        Colour::Black => Square::E8,
    };
    // Rights imply the king has not moved, but a loaded FEN may claim
    // rights for a king standing elsewhere.
    if from != home {
        return;
    }
    let enemy = !colour;
    if is_square_attacked(board, home, enemy) {
        return;
    }

    if board.castling().kingside(colour) {
        let (f, g) = match colour {
            Colour::White => (Square::F1, Square::G1),
            Colour::Black => (Square::F8, Square::G8),
        };
        if board.piece_at(f).is_none()
            && board.piece_at(g).is_none()
            && !is_square_attacked(board, f, enemy)
            && !is_square_attacked(board, g, enemy)
        {
            moves.push(Move::new(from, g, piece, None).with_flag(MoveFlag::CastleShort));
        }
    }

    if board.castling().queenside(colour) {
        let (d, c, b) = match colour {
            Colour::White => (Square::D1, Square::C1, Square::B1),
            Colour::Black => (Square::D8, Square::C8, Square::B8),
        };
        if board.piece_at(d).is_none()
            && board.piece_at(c).is_none()
            && board.piece_at(b).is_none()
            && !is_square_attacked(board, d, enemy)
            && !is_square_attacked(board, c, enemy)
        {
            moves.push(Move::new(from, c, piece, None).with_flag(MoveFlag::CastleLong));
        }
    }
}

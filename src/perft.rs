use crate::{board::Board, chessmove::Move, errors::BoardIntegrityError, movegen};

/// Counts the leaf nodes of the legal-move tree to the given depth. This
/// is the standard cross-check for move generation and make/undo: any
/// bookkeeping bug shows up as a wrong count somewhere in the tree.
pub fn perft(board: &mut Board, depth: usize) -> Result<u64, BoardIntegrityError> {
    if depth == 0 {
        return Ok(1);
    }
    let moves = movegen::legal_moves(board, board.turn())?;
    if depth == 1 {
        return Ok(moves.len() as u64);
    }
    let mut count = 0;
    for m in moves {
        board.make_move(m);
        count += perft(board, depth - 1)?;
        board.undo_move();
    }
    Ok(count)
}

/// Perft split by root move, for pinpointing which subtree miscounts.
pub fn divide(
    board: &mut Board,
    depth: usize,
) -> Result<Vec<(Move, u64)>, BoardIntegrityError> {
    let mut splits = Vec::new();
    for m in movegen::legal_moves(board, board.turn())? {
        board.make_move(m);
        let count = if depth > 1 { perft(board, depth - 1)? } else { 1 };
        board.undo_move();
        splits.push((m, count));
    }
    Ok(splits)
}

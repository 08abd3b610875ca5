#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]
#![deny(missing_docs)]

//! Fianchetto, a chess rules engine with a bridge to external UCI engines.

mod board;
mod chessmove;
mod cli;
mod errors;
mod fen;
mod movegen;
mod perft;
mod piece;
mod session;
mod types;
mod uci;

use std::{
    io::{self, BufRead},
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    board::Board,
    cli::{Cli, Command},
    movegen::GameStatus,
    piece::Colour,
    session::{Difficulty, Session, SessionConfig},
    uci::{Score, UciEngine},
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Perft { depth, fen, divide } => run_perft(depth, fen.as_deref(), divide),
        Command::BestMove {
            engine,
            fen,
            movetime,
            elo,
        } => run_best_move(&engine, fen.as_deref(), movetime, elo),
        Command::Analyse { engine, fen, depth } => run_analyse(&engine, fen.as_deref(), depth),
        Command::Play {
            engine,
            fen,
            colour,
            difficulty,
            movetime,
        } => run_play(engine, fen, colour.into(), difficulty.into(), movetime),
    }
}

fn board_from(fen: Option<&str>) -> Result<Board> {
    Ok(match fen {
        Some(fen) => Board::from_fen(fen)?,
        None => Board::new(),
    })
}

#[allow(clippy::cast_precision_loss)]
fn run_perft(depth: usize, fen: Option<&str>, divide: bool) -> Result<()> {
    let mut board = board_from(fen)?;
    let start = Instant::now();
    if divide {
        let splits = perft::divide(&mut board, depth)?;
        let mut total = 0;
        for (m, count) in &splits {
            println!("{m}: {count}");
            total += count;
        }
        println!("total: {total}");
    } else {
        let count = perft::perft(&mut board, depth)?;
        let elapsed = start.elapsed();
        println!(
            "{count} nodes in {elapsed:?} ({:.0} nodes/sec)",
            count as f64 / elapsed.as_secs_f64()
        );
    }
    Ok(())
}

fn run_best_move(
    engine_path: &str,
    fen: Option<&str>,
    movetime: u64,
    elo: Option<u32>,
) -> Result<()> {
    let board = board_from(fen)?;
    let mut engine = UciEngine::spawn(engine_path)?;
    engine.limit_strength(elo)?;
    let m = engine.best_move(&board, Duration::from_millis(movetime))?;
    println!("{m}");
    engine.quit()?;
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn run_analyse(engine_path: &str, fen: Option<&str>, depth: u32) -> Result<()> {
    let board = board_from(fen)?;
    let mut engine = UciEngine::spawn(engine_path)?;
    let analysis = engine.analyse(&board, depth)?;
    for line in &analysis.lines {
        println!("{line}");
    }
    match analysis.score {
        Some(Score::Centipawns(cp)) => println!("score: {:+.2}", f64::from(cp) / 100.0),
        Some(Score::MateIn(n)) => println!("score: mate in {n}"),
        None => (),
    }
    println!("best move: {}", analysis.best_move);
    engine.quit()?;
    Ok(())
}

fn run_play(
    engine: String,
    fen: Option<String>,
    colour: Colour,
    difficulty: Difficulty,
    movetime: u64,
) -> Result<()> {
    let session = Session::start(SessionConfig {
        engine_path: engine,
        human: colour,
        movetime: Duration::from_millis(movetime),
        difficulty,
        start_fen: fen,
    })?;

    println!("{}", session.board_text());
    println!(
        "enter moves in coordinate notation, or: hint, undo, redo, moves <square>, \
         difficulty <level>, fen, quit"
    );
    if colour == Colour::Black {
        wait_for_engine(&session);
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        match input {
            "" => continue,
            "quit" => break,
            "fen" => println!("{}", session.fen()),
            "undo" => {
                let displaced = session.undo();
                if displaced.is_empty() {
                    println!("nothing to undo");
                } else {
                    println!("took back {}", join_moves(&displaced));
                    println!("{}", session.board_text());
                }
            }
            "redo" => {
                let replayed = session.redo();
                if replayed.is_empty() {
                    println!("nothing to redo");
                } else {
                    println!("replayed {}", join_moves(&replayed));
                    println!("{}", session.board_text());
                }
            }
            "hint" => match session.hint() {
                Ok(m) => println!("hint: {m}"),
                Err(err) => println!("no hint available: {err}"),
            },
            _ if input.starts_with("moves ") => show_moves(&session, &input[6..]),
            _ if input.starts_with("difficulty ") => change_difficulty(&session, &input[11..]),
            text => match session.play(text) {
                Ok(status) => {
                    println!("{}", session.board_text());
                    if report_status(status) {
                        break;
                    }
                    wait_for_engine(&session);
                    if let Ok(status) = session.status() {
                        if report_status(status) {
                            break;
                        }
                    }
                }
                Err(err) => println!("{err}"),
            },
        }
    }

    session.shutdown()?;
    Ok(())
}

fn join_moves(moves: &[chessmove::Move]) -> String {
    moves
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lists the legal moves for the piece on a square.
fn show_moves(session: &Session, square: &str) {
    let mut chars = square.trim().chars();
    let parsed = match (chars.next(), chars.next(), chars.next()) {
        (Some(file), Some(rank), None) => types::Square::from_coords(file, rank),
        _ => None,
    };
    let Some(sq) = parsed else {
        println!("not a square: {square:?}");
        return;
    };
    if session.piece_at(sq).is_none() {
        println!("{sq} is empty");
        return;
    }
    match session.legal_moves_from(sq) {
        Ok(moves) if moves.is_empty() => println!("no legal moves from {sq}"),
        Ok(moves) => println!("{}", join_moves(&moves)),
        Err(err) => println!("{err}"),
    }
}

fn change_difficulty(session: &Session, level: &str) {
    let difficulty = match level.trim() {
        "novice" => Difficulty::Novice,
        "beginner" => Difficulty::Beginner,
        "intermediate" => Difficulty::Intermediate,
        "advanced" => Difficulty::Advanced,
        "expert" => Difficulty::Expert,
        "full" => Difficulty::Full,
        other => {
            println!("unknown difficulty {other:?}");
            return;
        }
    };
    match session.set_difficulty(difficulty) {
        Ok(()) => println!("difficulty set to {level}"),
        Err(err) => println!("{err}"),
    }
}

/// Polls for the engine's reply, giving up after a minute in case the
/// engine died mid-search.
fn wait_for_engine(session: &Session) {
    let deadline = Instant::now() + Duration::from_secs(60);
    while Instant::now() < deadline {
        if let Some(m) = session.take_engine_reply() {
            println!("engine plays {m}");
            println!("{}", session.board_text());
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    println!("no reply from the engine");
}

/// Prints the position verdict. Returns whether the game is over.
fn report_status(status: GameStatus) -> bool {
    match status {
        GameStatus::Checkmate => {
            println!("checkmate");
            true
        }
        GameStatus::Stalemate => {
            println!("stalemate");
            true
        }
        GameStatus::Check => {
            println!("check");
            false
        }
        GameStatus::Ongoing => false,
    }
}

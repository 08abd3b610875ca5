use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    board::Board,
    chessmove::{parse_coords, Move},
    errors::{BoardIntegrityError, FenParseError, MoveParseError},
    movegen::{self, GameStatus},
    piece::{Colour, Piece},
    types::Square,
    uci::{Analysis, EngineError, EngineStopper, UciEngine},
};

/// Strength presets, mapped onto the engine's `UCI_Elo` option. `Full`
/// leaves the engine unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Novice,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Full,
}

impl Difficulty {
    pub const fn elo(self) -> Option<u32> {
        match self {
            Self::Novice => Some(250),
            Self::Beginner => Some(400),
            Self::Intermediate => Some(800),
            Self::Advanced => Some(1400),
            Self::Expert => Some(1800),
            Self::Full => None,
        }
    }
}

/// Everything a session needs to start. There is no hidden global state:
/// a session behaves the same however it was constructed.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub engine_path: String,
    pub human: Colour,
    pub movetime: Duration,
    pub difficulty: Difficulty,
    /// Starting position. An invalid FEN falls back to the standard
    /// start with a warning rather than failing session startup.
    pub start_fen: Option<String>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("{0:?} is not a legal move in this position")]
    IllegalMove(String),
    #[error(transparent)]
    MoveParse(#[from] MoveParseError),
    #[error(transparent)]
    Fen(#[from] FenParseError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Integrity(#[from] BoardIntegrityError),
    #[error("failed to start the engine worker thread")]
    Worker(#[source] std::io::Error),
}

struct Shared {
    board: Board,
    /// The engine's latest committed reply, awaiting pickup by the owner.
    reply: Option<Move>,
}

/// A human-versus-engine game.
///
/// The engine thinks on a dedicated worker thread so the owner never
/// blocks on a search. An mpsc channel wakes the worker when the engine
/// has the move; a generation counter stamps every board mutation, and a
/// search result is only committed if the board generation still matches
/// the one the search started from. Cancelling is therefore just bumping
/// the counter: a stale search runs to completion and its result is
/// discarded.
///
/// Lock discipline: the board lock and the engine lock are never held at
/// the same time. The worker snapshots the board, releases it, and only
/// then talks to the engine.
pub struct Session {
    shared: Arc<Mutex<Shared>>,
    engine: Arc<Mutex<UciEngine>>,
    stopper: EngineStopper,
    generation: Arc<AtomicU64>,
    turns: mpsc::Sender<()>,
    worker: JoinHandle<()>,
    human: Colour,
    movetime: Duration,
}

impl Session {
    pub fn start(config: SessionConfig) -> Result<Self, SessionError> {
        let board = match &config.start_fen {
            Some(fen) => match Board::from_fen(fen) {
                Ok(board) => board,
                Err(err) => {
                    warn!(%err, %fen, "invalid start FEN, using the standard start position");
                    Board::new()
                }
            },
            None => Board::new(),
        };

        let mut engine = UciEngine::spawn(&config.engine_path)?;
        engine.limit_strength(config.difficulty.elo())?;
        info!(
            human = %config.human,
            difficulty = ?config.difficulty,
            "session started"
        );

        let shared = Arc::new(Mutex::new(Shared {
            board,
            reply: None,
        }));
        let stopper = engine.stopper();
        let engine = Arc::new(Mutex::new(engine));
        let generation = Arc::new(AtomicU64::new(0));
        let (turns, requests) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("engine-worker".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                let engine = Arc::clone(&engine);
                let generation = Arc::clone(&generation);
                let movetime = config.movetime;
                let human = config.human;
                move || worker_loop(&shared, &engine, &generation, &requests, movetime, human)
            })
            .map_err(SessionError::Worker)?;

        let session = Self {
            shared,
            engine,
            stopper,
            generation,
            turns,
            worker,
            human: config.human,
            movetime: config.movetime,
        };

        let shared = session.shared.lock();
        session.wake_if_engine_turn(&shared);
        drop(shared);

        Ok(session)
    }

    /// Plays the human's move, given in coordinate notation, and wakes
    /// the engine if the game goes on.
    pub fn play(&self, text: &str) -> Result<GameStatus, SessionError> {
        let mut shared = self.shared.lock();
        if shared.board.turn() != self.human {
            return Err(SessionError::NotYourTurn);
        }
        let (from, to, promotion) = parse_coords(text)?;
        let m = movegen::find_move(&shared.board, from, to, promotion)?
            .ok_or_else(|| SessionError::IllegalMove(text.to_string()))?;
        shared.board.make_move(m);
        self.generation.fetch_add(1, Ordering::AcqRel);
        let status = movegen::game_status(&shared.board)?;
        if matches!(status, GameStatus::Ongoing | GameStatus::Check) {
            self.wake_if_engine_turn(&shared);
        }
        Ok(status)
    }

    /// The engine's reply, if one has been committed since the last call.
    pub fn take_engine_reply(&self) -> Option<Move> {
        self.shared.lock().reply.take()
    }

    /// Takes back a full move pair, so the same side is to move
    /// afterwards. Returns the displaced moves, most recent first.
    pub fn undo(&self) -> Vec<Move> {
        self.cancel_search();
        let mut shared = self.shared.lock();
        let displaced = rewind(&mut shared.board, 2);
        shared.reply = None;
        self.wake_if_engine_turn(&shared);
        displaced
    }

    /// Replays a previously undone move pair. Returns the replayed moves
    /// in the order they were put back on the board.
    pub fn redo(&self) -> Vec<Move> {
        self.cancel_search();
        let mut shared = self.shared.lock();
        let replayed = replay(&mut shared.board, 2);
        self.wake_if_engine_turn(&shared);
        replayed
    }

    /// Replaces the position mid-session. Unlike the startup fallback,
    /// an invalid FEN here is rejected.
    pub fn load_fen(&self, fen: &str) -> Result<(), SessionError> {
        self.cancel_search();
        let mut shared = self.shared.lock();
        shared.board.load_fen(fen)?;
        shared.reply = None;
        self.wake_if_engine_turn(&shared);
        Ok(())
    }

    /// Abandons any search in flight: the worker's result, when it
    /// arrives, no longer matches the current generation and is dropped,
    /// and the engine is asked to cut the search short so that happens
    /// promptly.
    pub fn stop_calculating(&self) {
        self.cancel_search();
    }

    /// Changes the engine's strength cap mid-session.
    pub fn set_difficulty(&self, difficulty: Difficulty) -> Result<(), SessionError> {
        info!(?difficulty, "difficulty changed");
        Ok(self.engine.lock().limit_strength(difficulty.elo())?)
    }

    /// Asks the engine what it would play for the side to move, without
    /// playing it. Blocks for up to the configured movetime.
    pub fn hint(&self) -> Result<Move, SessionError> {
        let snapshot = self.shared.lock().board.clone();
        let m = self.engine.lock().best_move(&snapshot, self.movetime)?;
        Ok(m)
    }

    /// Runs a fixed-depth engine analysis of the current position.
    pub fn analyse(&self, depth: u32) -> Result<Analysis, SessionError> {
        let snapshot = self.shared.lock().board.clone();
        let analysis = self.engine.lock().analyse(&snapshot, depth)?;
        Ok(analysis)
    }

    pub fn fen(&self) -> String {
        self.shared.lock().board.fen()
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.shared.lock().board.piece_at(sq)
    }

    /// Legal moves for the piece on a square, for highlighting.
    pub fn legal_moves_from(&self, sq: Square) -> Result<Vec<Move>, SessionError> {
        let shared = self.shared.lock();
        Ok(movegen::legal_moves_from(&shared.board, sq)?)
    }

    /// A printable rendering of the current board.
    pub fn board_text(&self) -> String {
        self.shared.lock().board.to_string()
    }

    pub fn last_move(&self) -> Option<Move> {
        self.shared.lock().board.last_move()
    }

    pub fn status(&self) -> Result<GameStatus, SessionError> {
        let shared = self.shared.lock();
        Ok(movegen::game_status(&shared.board)?)
    }

    /// Shuts the session down: discards any in-flight search, waits for
    /// the worker to finish, and quits the engine.
    pub fn shutdown(self) -> Result<(), SessionError> {
        self.cancel_search();
        // Closing the channel ends the worker loop once the current
        // request, if any, completes.
        drop(self.turns);
        if self.worker.join().is_err() {
            error!("engine worker panicked");
        }
        match Arc::try_unwrap(self.engine) {
            Ok(mutex) => mutex.into_inner().quit()?,
            // The worker held the only other reference and has exited.
            Err(_) => error!("engine still shared after worker join"),
        }
        Ok(())
    }

    fn wake_if_engine_turn(&self, shared: &Shared) {
        if shared.board.turn() != self.human {
            // The worker may already have exited during shutdown.
            let _ = self.turns.send(());
        }
    }

    /// Bumps the generation so any in-flight result is discarded, and
    /// asks the engine to wind its search down early. The stop goes
    /// through the stdin lock, not the engine lock, so it works while
    /// the worker is blocked reading search output.
    fn cancel_search(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Err(err) = self.stopper.stop() {
            warn!(%err, "failed to send stop to the engine");
        }
    }
}

fn worker_loop(
    shared: &Mutex<Shared>,
    engine: &Mutex<UciEngine>,
    generation: &AtomicU64,
    requests: &mpsc::Receiver<()>,
    movetime: Duration,
    human: Colour,
) {
    while requests.recv().is_ok() {
        let (snapshot, started_at) = {
            let guard = shared.lock();
            (guard.board.clone(), generation.load(Ordering::Acquire))
        };

        // A wake can outlive the turn it was sent for: the board may have
        // been rewound between the send and this snapshot. Searching now
        // would produce a move for the human, so drop the request.
        if snapshot.turn() == human {
            debug!("skipping stale turn signal");
            continue;
        }

        // The search happens with only the engine lock held, so the owner
        // stays free to mutate the board meanwhile.
        let result = engine.lock().best_move(&snapshot, movetime);

        match result {
            Ok(m) => {
                let mut guard = shared.lock();
                if !commit_reply(&mut guard, generation, started_at, m) {
                    debug!(%m, "discarding stale engine reply");
                }
            }
            Err(EngineError::NoMove) => {
                debug!("engine has no move, game is over");
            }
            Err(err) => {
                error!(%err, "engine search failed");
            }
        }
    }
}

/// Commits an engine reply unless the board has changed generation since
/// the search snapshot was taken.
fn commit_reply(
    shared: &mut Shared,
    generation: &AtomicU64,
    started_at: u64,
    m: Move,
) -> bool {
    if generation.load(Ordering::Acquire) != started_at {
        return false;
    }
    shared.board.make_move(m);
    shared.reply = Some(m);
    true
}

/// Takes back up to `plies` half-moves, returning them most recent first.
fn rewind(board: &mut Board, plies: usize) -> Vec<Move> {
    (0..plies).map_while(|_| board.undo_move()).collect()
}

/// Replays up to `plies` previously undone half-moves, in replay order.
fn replay(board: &mut Board, plies: usize) -> Vec<Move> {
    (0..plies).map_while(|_| board.redo_move()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    fn legal(board: &Board, text: &str) -> Move {
        let (from, to, promo) = parse_coords(text).unwrap();
        movegen::find_move(board, from, to, promo).unwrap().unwrap()
    }

    #[test]
    fn difficulty_elo_presets() {
        assert_eq!(Difficulty::Novice.elo(), Some(250));
        assert_eq!(Difficulty::Beginner.elo(), Some(400));
        assert_eq!(Difficulty::Intermediate.elo(), Some(800));
        assert_eq!(Difficulty::Advanced.elo(), Some(1400));
        assert_eq!(Difficulty::Expert.elo(), Some(1800));
        assert_eq!(Difficulty::Full.elo(), None);
    }

    #[test]
    fn stale_reply_is_discarded() {
        let mut shared = Shared {
            board: Board::new(),
            reply: None,
        };
        let generation = AtomicU64::new(0);
        let m = legal(&shared.board, "e2e4");

        // The board moved on while the search was running.
        generation.fetch_add(1, Ordering::AcqRel);
        assert!(!commit_reply(&mut shared, &generation, 0, m));
        assert!(shared.reply.is_none());
        assert_eq!(shared.board.moves_played().len(), 0);

        // A fresh search against the current generation commits.
        assert!(commit_reply(&mut shared, &generation, 1, m));
        assert_eq!(shared.reply, Some(m));
        assert_eq!(shared.board.last_move().map(|m| m.to), Some(Square::E4));
    }

    #[test]
    fn rewind_and_replay_are_bounded_by_history() {
        let mut board = Board::new();
        board.make_move(legal(&board, "e2e4"));
        assert_eq!(rewind(&mut board, 2).len(), 1);
        assert_eq!(replay(&mut board, 2).len(), 1);

        board.make_move(legal(&board, "e7e5"));
        board.make_move(legal(&board, "g1f3"));
        let displaced = rewind(&mut board, 2);
        // Most recent ply first.
        assert_eq!(displaced[0].to_string(), "g1f3");
        assert_eq!(displaced[1].to_string(), "e7e5");
        assert_eq!(board.moves_played().len(), 1);
        let replayed = replay(&mut board, 2);
        assert_eq!(replayed[0].to_string(), "e7e5");
        assert_eq!(replayed[1].to_string(), "g1f3");
        assert_eq!(board.moves_played().len(), 3);
    }

    #[cfg(unix)]
    mod with_fake_engine {
        use super::*;
        use std::{fs, os::unix::fs::PermissionsExt, time::Instant};

        fn fake_engine(name: &str, go_response: &str) -> String {
            scripted_engine(name, &format!("printf '%s\\n' \"{go_response}\""))
        }

        /// Like [`fake_engine`], but each search takes a second, so the
        /// board can be mutated while a search is in flight.
        fn slow_fake_engine(name: &str, go_response: &str) -> String {
            scripted_engine(name, &format!("sleep 1; printf '%s\\n' \"{go_response}\""))
        }

        fn scripted_engine(name: &str, on_go: &str) -> String {
            let path = std::env::temp_dir().join(format!(
                "fake-uci-session-{name}-{}",
                std::process::id()
            ));
            let script = format!(
                "#!/bin/sh\nwhile read line; do\n  case \"$line\" in\n    go*) {on_go};;\n    quit) exit 0;;\n  esac\ndone\n"
            );
            fs::write(&path, script).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.to_str().unwrap().to_string()
        }

        #[test]
        fn engine_reply_is_played_by_the_worker() {
            let path = fake_engine("reply", "bestmove e7e5");
            let session = Session::start(SessionConfig {
                engine_path: path.clone(),
                human: Colour::White,
                movetime: Duration::from_millis(10),
                difficulty: Difficulty::Full,
                start_fen: None,
            })
            .unwrap();

            let status = session.play("e2e4").unwrap();
            assert_eq!(status, GameStatus::Ongoing);

            let deadline = Instant::now() + Duration::from_secs(5);
            let reply = loop {
                if let Some(m) = session.take_engine_reply() {
                    break m;
                }
                assert!(Instant::now() < deadline, "no engine reply");
                std::thread::sleep(Duration::from_millis(5));
            };
            assert_eq!(reply.to_string(), "e7e5");
            assert_eq!(
                session.fen(),
                "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6"
            );
            assert!(session.play("e7e5").is_err());

            session.shutdown().unwrap();
            let _ = fs::remove_file(path);
        }

        #[test]
        fn undo_during_search_never_moves_for_the_human() {
            // The engine answers every search with the human's own
            // opening move, which is only legal when it is the human's
            // turn. Playing and taking back twice while a slow search is
            // running leaves stale turn signals queued against a board
            // where White (the human) is to move; none of them may be
            // acted on.
            let path = slow_fake_engine("rewind", "bestmove e2e4");
            let session = Session::start(SessionConfig {
                engine_path: path.clone(),
                human: Colour::White,
                movetime: Duration::from_millis(10),
                difficulty: Difficulty::Full,
                start_fen: None,
            })
            .unwrap();
            let start = session.fen();

            session.play("e2e4").unwrap();
            assert_eq!(session.undo().len(), 1);
            session.play("e2e4").unwrap();
            assert_eq!(session.undo().len(), 1);

            // Let the worker drain both queued signals.
            std::thread::sleep(Duration::from_millis(2_500));
            assert_eq!(session.take_engine_reply(), None);
            assert_eq!(session.fen(), start);

            session.shutdown().unwrap();
            let _ = fs::remove_file(path);
        }

        #[test]
        fn playing_out_of_turn_is_rejected() {
            // The canned reply is illegal for White, so the worker never
            // commits anything and it stays the engine's turn throughout.
            let path = fake_engine("turn", "bestmove e7e5");
            let session = Session::start(SessionConfig {
                engine_path: path.clone(),
                human: Colour::Black,
                movetime: Duration::from_millis(10),
                difficulty: Difficulty::Full,
                start_fen: None,
            })
            .unwrap();

            // White is the engine; Black cannot move first.
            let err = session.play("e7e5").unwrap_err();
            assert!(matches!(err, SessionError::NotYourTurn));

            session.shutdown().unwrap();
            let _ = fs::remove_file(path);
        }
    }
}

use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    board::Board,
    chessmove::{parse_coords, Move},
    errors::{BoardIntegrityError, MoveParseError},
    movegen,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn engine process {path:?}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine process has no piped stdin/stdout")]
    StdioUnavailable,
    #[error("i/o error talking to the engine")]
    Io(#[from] std::io::Error),
    #[error("engine closed its output stream")]
    Closed,
    #[error("malformed bestmove line: {0:?}")]
    MalformedBestMove(String),
    #[error("engine has no move in this position")]
    NoMove,
    #[error("engine move {text:?} is not legal in the current position")]
    BestMoveMismatch { text: String },
    #[error("engine move does not parse: {0}")]
    MoveParse(#[from] MoveParseError),
    #[error(transparent)]
    Integrity(#[from] BoardIntegrityError),
}

/// An engine evaluation, from the point of view of the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    MateIn(i32),
}

/// The result of a fixed-depth analysis request.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub best_move: Move,
    pub score: Option<Score>,
    /// Raw `info` lines as the engine printed them, deepest last.
    pub lines: Vec<String>,
}

/// A UCI engine running as a child process, spoken to over its stdio.
///
/// The dialogue is deliberately minimal: positions are always sent in
/// full as `position fen ... moves ...`, so the engine carries no state
/// between requests that we would have to keep synchronized.
///
/// Writes to the engine's stdin go through their own lock, separate from
/// exclusive access to the engine value itself. That lets a
/// [`EngineStopper`] inject a `stop` command while a search's blocking
/// read loop is in progress; the read loop itself is not interruptible
/// and ends when the shortened search prints its `bestmove`.
pub struct UciEngine {
    child: Child,
    writer: Arc<Mutex<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
}

/// A handle that can ask the engine to cut a search short, usable while
/// another thread is blocked reading the search's output.
#[derive(Clone)]
pub struct EngineStopper {
    writer: Arc<Mutex<ChildStdin>>,
}

impl EngineStopper {
    pub fn stop(&self) -> Result<(), EngineError> {
        trace!("-> engine: stop");
        let mut stdin = self.writer.lock();
        writeln!(stdin, "stop")?;
        stdin.flush()?;
        Ok(())
    }
}

impl UciEngine {
    pub fn spawn(path: &str) -> Result<Self, EngineError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.to_string(),
                source,
            })?;
        let stdin = child.stdin.take().ok_or(EngineError::StdioUnavailable)?;
        let stdout = child.stdout.take().ok_or(EngineError::StdioUnavailable)?;
        debug!(path, "engine spawned");
        Ok(Self {
            child,
            writer: Arc::new(Mutex::new(stdin)),
            stdout: BufReader::new(stdout),
        })
    }

    pub fn stopper(&self) -> EngineStopper {
        EngineStopper {
            writer: Arc::clone(&self.writer),
        }
    }

    fn send(&self, command: &str) -> Result<(), EngineError> {
        trace!(command, "-> engine");
        let mut stdin = self.writer.lock();
        writeln!(stdin, "{command}")?;
        stdin.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(EngineError::Closed);
        }
        let line = line.trim_end().to_string();
        trace!(line, "<- engine");
        Ok(line)
    }

    /// Caps the engine's playing strength, or restores full strength when
    /// `elo` is `None`.
    pub fn limit_strength(&mut self, elo: Option<u32>) -> Result<(), EngineError> {
        match elo {
            Some(elo) => {
                self.send("setoption name UCI_LimitStrength value true")?;
                self.send(&format!("setoption name UCI_Elo value {elo}"))
            }
            None => self.send("setoption name UCI_LimitStrength value false"),
        }
    }

    /// Thinks about the given position for `movetime` and returns the
    /// engine's choice, decoded against our own legal move list.
    pub fn best_move(
        &mut self,
        board: &Board,
        movetime: Duration,
    ) -> Result<Move, EngineError> {
        self.send(&board.uci_position())?;
        self.send(&format!("go movetime {}", movetime.as_millis()))?;
        let text = self.wait_for_best_move()?;
        Self::decode(board, &text)
    }

    /// Runs a fixed-depth search and returns the best move together with
    /// the deepest evaluation the engine reported.
    pub fn analyse(&mut self, board: &Board, depth: u32) -> Result<Analysis, EngineError> {
        self.send(&board.uci_position())?;
        self.send(&format!("go depth {depth}"))?;

        let mut lines = Vec::new();
        let mut score = None;
        let text = loop {
            let line = self.read_line()?;
            if let Some(rest) = line.strip_prefix("bestmove") {
                break Self::best_move_token(rest)
                    .ok_or(EngineError::MalformedBestMove(line.clone()))?
                    .to_string();
            }
            if line.starts_with("info") {
                if let Some(parsed) = Self::parse_score(&line) {
                    // Info lines arrive in increasing depth; the last
                    // score seen is the deepest.
                    score = Some(parsed);
                }
                lines.push(line);
            }
        };

        let best_move = Self::decode(board, &text)?;
        Ok(Analysis {
            best_move,
            score,
            lines,
        })
    }

    /// Shuts the engine down, waiting for the process to exit.
    pub fn quit(mut self) -> Result<(), EngineError> {
        self.send("quit")?;
        self.child.wait()?;
        Ok(())
    }

    fn wait_for_best_move(&mut self) -> Result<String, EngineError> {
        loop {
            let line = self.read_line()?;
            if let Some(rest) = line.strip_prefix("bestmove") {
                return Ok(Self::best_move_token(rest)
                    .ok_or(EngineError::MalformedBestMove(line.clone()))?
                    .to_string());
            }
        }
    }

    /// Maps engine move text back onto our own legal move list. An
    /// unmatched move means the engine and board disagree about the
    /// position, which is an error rather than something to play anyway.
    fn decode(board: &Board, text: &str) -> Result<Move, EngineError> {
        if text == "(none)" || text == "0000" {
            return Err(EngineError::NoMove);
        }
        let (from, to, promotion) = parse_coords(text)?;
        movegen::find_move(board, from, to, promotion)?.ok_or_else(|| {
            EngineError::BestMoveMismatch {
                text: text.to_string(),
            }
        })
    }

    fn best_move_token(rest: &str) -> Option<&str> {
        rest.split_whitespace().next()
    }

    /// Extracts `score cp N` or `score mate N` from an info line.
    fn parse_score(line: &str) -> Option<Score> {
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            if token != "score" {
                continue;
            }
            return match (tokens.next(), tokens.next()) {
                (Some("cp"), Some(n)) => n.parse().ok().map(Score::Centipawns),
                (Some("mate"), Some(n)) => n.parse().ok().map(Score::MateIn),
                _ => None,
            };
        }
        None
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        // Best effort: if quit was never sent, do not leave the child
        // running.
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.send("quit");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_move_token_takes_first_word() {
        assert_eq!(UciEngine::best_move_token(" e2e4 ponder e7e5"), Some("e2e4"));
        assert_eq!(UciEngine::best_move_token(" a7a8q"), Some("a7a8q"));
        assert_eq!(UciEngine::best_move_token("  "), None);
    }

    #[test]
    fn parse_centipawn_score() {
        let line = "info depth 20 seldepth 30 score cp 35 nodes 12345 pv e2e4";
        assert_eq!(UciEngine::parse_score(line), Some(Score::Centipawns(35)));
    }

    #[test]
    fn parse_mate_score() {
        let line = "info depth 12 score mate -3 pv h7h8";
        assert_eq!(UciEngine::parse_score(line), Some(Score::MateIn(-3)));
    }

    #[test]
    fn score_absent_from_noise_lines() {
        assert_eq!(
            UciEngine::parse_score("info string NNUE evaluation enabled"),
            None
        );
        assert_eq!(UciEngine::parse_score("info depth 1 score"), None);
    }

    #[cfg(unix)]
    mod with_fake_engine {
        use super::*;
        use crate::types::Square;
        use std::{fs, os::unix::fs::PermissionsExt, path::PathBuf};

        /// Writes a shell script that acts as a canned UCI engine.
        fn fake_engine(name: &str, go_response: &str) -> PathBuf {
            let path = std::env::temp_dir().join(format!("fake-uci-{name}-{}", std::process::id()));
            let script = format!(
                "#!/bin/sh\nwhile read line; do\n  case \"$line\" in\n    go*) printf '%s\\n' \"{go_response}\";;\n    quit) exit 0;;\n  esac\ndone\n"
            );
            fs::write(&path, script).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn best_move_round_trip() {
            let path = fake_engine("bestmove", "info depth 1 score cp 20 pv e2e4\nbestmove e2e4");
            let mut engine = UciEngine::spawn(path.to_str().unwrap()).unwrap();
            let board = Board::new();
            let m = engine.best_move(&board, Duration::from_millis(10)).unwrap();
            assert_eq!(m.from, Square::E2);
            assert_eq!(m.to, Square::E4);
            engine.quit().unwrap();
            let _ = fs::remove_file(path);
        }

        #[test]
        fn analysis_collects_score() {
            let path = fake_engine(
                "analysis",
                "info depth 1 score cp 10 pv d2d4\ninfo depth 2 score cp 25 pv e2e4\nbestmove e2e4",
            );
            let mut engine = UciEngine::spawn(path.to_str().unwrap()).unwrap();
            let analysis = engine.analyse(&Board::new(), 2).unwrap();
            assert_eq!(analysis.best_move.to_string(), "e2e4");
            assert_eq!(analysis.score, Some(Score::Centipawns(25)));
            assert_eq!(analysis.lines.len(), 2);
            engine.quit().unwrap();
            let _ = fs::remove_file(path);
        }

        #[test]
        fn illegal_engine_move_is_an_error() {
            let path = fake_engine("illegal", "bestmove e2e5");
            let mut engine = UciEngine::spawn(path.to_str().unwrap()).unwrap();
            let err = engine
                .best_move(&Board::new(), Duration::from_millis(10))
                .unwrap_err();
            assert!(matches!(err, EngineError::BestMoveMismatch { .. }));
            engine.quit().unwrap();
            let _ = fs::remove_file(path);
        }

        #[test]
        fn no_move_is_reported() {
            let path = fake_engine("none", "bestmove (none)");
            let mut engine = UciEngine::spawn(path.to_str().unwrap()).unwrap();
            let err = engine
                .best_move(&Board::new(), Duration::from_millis(10))
                .unwrap_err();
            assert!(matches!(err, EngineError::NoMove));
            engine.quit().unwrap();
            let _ = fs::remove_file(path);
        }
    }
}

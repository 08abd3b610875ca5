use clap::{Parser, Subcommand, ValueEnum};

use crate::{piece::Colour, session::Difficulty};

#[derive(Parser)]
#[command(name = "fianchetto", version, about = "Chess rules engine with a UCI engine bridge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Count legal-move tree leaves, the standard move generation check.
    Perft {
        #[arg(short, long, default_value_t = 3)]
        depth: usize,
        /// Position to count from, defaulting to the start position.
        #[arg(long)]
        fen: Option<String>,
        /// Print per-root-move subtotals.
        #[arg(long)]
        divide: bool,
    },
    /// Ask an engine for its move in a position.
    BestMove {
        /// Path to a UCI engine binary.
        #[arg(long)]
        engine: String,
        #[arg(long)]
        fen: Option<String>,
        /// Thinking time in milliseconds.
        #[arg(long, default_value_t = 1000)]
        movetime: u64,
        /// Cap the engine's strength at this Elo.
        #[arg(long)]
        elo: Option<u32>,
    },
    /// Fixed-depth engine analysis of a position.
    Analyse {
        #[arg(long)]
        engine: String,
        #[arg(long)]
        fen: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        depth: u32,
    },
    /// Play against an engine on the terminal.
    Play {
        #[arg(long)]
        engine: String,
        #[arg(long)]
        fen: Option<String>,
        /// The side you play.
        #[arg(long, value_enum, default_value_t = ColourArg::White)]
        colour: ColourArg,
        #[arg(long, value_enum, default_value_t = DifficultyArg::Full)]
        difficulty: DifficultyArg,
        /// Engine thinking time per move, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        movetime: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColourArg {
    White,
    Black,
}

impl From<ColourArg> for Colour {
    fn from(arg: ColourArg) -> Self {
        match arg {
            ColourArg::White => Self::White,
            ColourArg::Black => Self::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DifficultyArg {
    Novice,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Full,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Novice => Self::Novice,
            DifficultyArg::Beginner => Self::Beginner,
            DifficultyArg::Intermediate => Self::Intermediate,
            DifficultyArg::Advanced => Self::Advanced,
            DifficultyArg::Expert => Self::Expert,
            DifficultyArg::Full => Self::Full,
        }
    }
}

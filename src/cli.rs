use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Sort ROM collections by whether RetroAchievements supports them.
#[derive(Debug, Parser)]
#[command(name = "rasort", version)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "RASORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Hash library file, overriding the configured one
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// More logging; repeat for more detail. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify every ROM in a directory and sort it into the output tree
    Sort(SortArgs),
    /// Download the catalog game list into the hash library
    Refresh {
        /// Only fetch games that have achievements
        #[arg(long)]
        with_achievements_only: bool,
    },
    /// Merge a saved game list or another hash library into the hash library
    Import {
        file: PathBuf,
    },
    /// Set aside duplicate ROMs in an already sorted output tree
    Dedupe {
        /// Sorted output directory; defaults to the configured one
        dir: Option<PathBuf>,
    },
    /// Print the content hash of ROM files
    Hash {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct SortArgs {
    /// Directory containing the ROM files
    pub rom_dir: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Move files instead of copying them
    #[arg(long = "move")]
    pub move_files: bool,

    /// Do not fetch the catalog game list when a hash is unknown
    #[arg(long)]
    pub no_refresh: bool,

    /// Set aside ROMs whose content matches one already sorted
    #[arg(long)]
    pub dedupe: bool,
}

impl Cli {
    /// Default log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

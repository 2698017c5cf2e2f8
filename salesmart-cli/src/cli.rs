use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "salesmart",
    about = "Loads supermarket sales into a star-schema warehouse",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show debug logs of the loader
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database to use instead of the configured one (`memory`, `sqlite:...`, `postgres://...`)
    #[arg(long, global = true)]
    pub database_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directories and the warehouse schema
    Setup,

    /// Extract a source file, synchronize the dimensions and load the facts
    Run {
        /// CSV file to load, defaults to the first one of the raw directory
        #[arg(long, short = 's')]
        source: Option<PathBuf>,
    },

    /// Synchronize the dimensions with a source file without loading facts
    Sync {
        #[arg(long, short = 's')]
        source: Option<PathBuf>,
    },

    /// Check the data quality of a source file
    Validate {
        #[arg(long, short = 's')]
        source: Option<PathBuf>,
    },

    /// Write the warehouse tables and reports as CSV files
    Export {
        /// Output directory, defaults to the configured warehouse directory
        #[arg(long, short = 'o')]
        dir: Option<PathBuf>,
    },

    /// Print the sales reports as JSON
    Report,
}

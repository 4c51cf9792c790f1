use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the best subtitle for every video in the given files and directories
    Fetch {
        /// Video files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Subtitle language (ISO 639-1, defaults to the configured language)
        #[arg(short, long)]
        language: Option<String>,

        /// Print the per-file reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every subtitle candidate for a single video without downloading
    Search {
        /// Video file
        file: PathBuf,

        /// Subtitle language (ISO 639-1, defaults to the configured language)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Print the fingerprints providers use to identify a video
    Hash {
        /// Video file
        file: PathBuf,
    },

    /// List the configured providers in query order
    Providers,
}

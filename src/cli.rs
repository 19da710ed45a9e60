use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sentimind")]
#[command(about = "Harvest posts by keyword and classify their sentiment")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file (defaults to ./sentimind.toml when present)
    #[arg(short, long, global = true, env = "SENTIMIND_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Harvest posts for a keyword and store the new ones
    Scrape {
        #[arg(short, long)]
        keyword: String,

        /// Number of posts to aim for
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Earliest post date, YYYY-MM-DD
        #[arg(long)]
        since: Option<String>,

        /// Latest post date, YYYY-MM-DD
        #[arg(long)]
        until: Option<String>,

        #[arg(long)]
        batch_size: Option<usize>,

        /// Seconds to wait between batches
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Classify stored posts that have no sentiment yet
    Analyze {
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only analyze these post ids
        #[arg(long, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Classify a single text with the local models
    Predict { text: String },

    /// Show the newest stored posts with their sentiment
    Recent {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::source::client::DEFAULT_BASE_URL;

#[derive(Parser, Debug)]
#[command(name = "arkdata-to-sqlite")]
#[command(version, about = "Load Arknights gamedata tables into a SQLite database")]
pub struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch (if needed) and load every source document into the database
    Sync {
        /// SQLite database path
        #[arg(env = "ARKDATA_DB")]
        db: PathBuf,

        /// Only run these loaders (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Skip these loaders (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        /// Force re-download even if cached
        #[arg(short, long)]
        force: bool,

        /// Custom cache directory
        #[arg(short, long, env = "ARKDATA_CACHE_DIR")]
        cache_dir: Option<PathBuf>,

        /// Base URL the documents are fetched from
        #[arg(long, env = "ARKDATA_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Read `<doc>.json` files from this directory instead of the network
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Fetch attempts per document
        #[arg(long, default_value_t = 3)]
        retries: u32,

        /// Delay before the first retry, doubled after each attempt
        #[arg(long, default_value_t = 1000)]
        retry_delay_ms: u64,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,

        /// Skip the post-load integrity checks
        #[arg(long)]
        no_validate: bool,
    },

    /// Download every source document into the cache
    Download {
        /// Output directory
        #[arg(short, long, env = "ARKDATA_CACHE_DIR")]
        output: Option<PathBuf>,

        /// Force re-download even if cached
        #[arg(short, long)]
        force: bool,

        /// Base URL the documents are fetched from
        #[arg(long, env = "ARKDATA_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },

    /// Load local `<doc>.json` files into the database
    Load {
        /// Directory containing the JSON documents
        input_dir: PathBuf,

        /// SQLite database path
        #[arg(env = "ARKDATA_DB")]
        db: PathBuf,

        /// Only run these loaders (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Skip these loaders (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the integrity checks against an existing database
    Validate {
        /// SQLite database path
        #[arg(env = "ARKDATA_DB")]
        db: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List loaders in the order they run
    ListStages,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use clap's "derive" API: the struct below IS the CLI. Every field becomes
// an argument, and the #[arg(...)] attributes say how it's spelled and what
// its default is.
//
// clap only checks that values have the right TYPE. Whether they make sense
// together (e.g. at least one worker) is checked in config.rs.
//
// Rust concepts:
// - Derive macros: Automatically generate the parser for our struct
// - FromStr: clap parses the cap flags straight into our Cap type
// - Option<T>: For arguments that may be left out entirely
// =============================================================================

use clap::Parser;
use std::path::PathBuf;

use crate::limit::Cap;

// #[derive(Parser)] tells clap to generate the parsing code
// The #[command(...)] attributes configure --help and --version
#[derive(Parser, Debug)]
#[command(
    name = "tweet-crawler",
    version = "0.1.0",
    about = "Crawl tweets matching a keyword, together with their reply threads",
    long_about = "tweet-crawler searches for tweets matching a keyword and downloads each one \
                  with its reply threads (\"timelines\") into one JSON file per tweet. \
                  Caps accept -1 for no limit."
)]
pub struct Cli {
    /// Keyword to search for
    ///
    /// This is a positional argument (required, no flag needed)
    pub keyword: String,

    /// Folder the JSON records are written to
    #[arg(short, long, default_value = "./data")]
    pub output: PathBuf,

    /// Number of tweets to crawl (-1 = no limit)
    ///
    /// allow_negative_numbers lets clap read "-1" as a value, not a flag
    #[arg(long, default_value = "10", allow_negative_numbers = true)]
    pub max_result: Cap,

    /// Number of tweets downloaded at the same time
    #[arg(long, default_value_t = 1)]
    pub max_thread: usize,

    /// Seconds to wait between requests of the same task
    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub sleep: f64,

    /// Timeline groups kept per tweet (-1 = no limit)
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub max_timelines: Cap,

    /// Replies kept per timeline group (-1 = no limit)
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub timeline_length: Cap,

    /// Seconds before the access tokens are fetched again
    #[arg(long, default_value_t = 300)]
    pub token_refresh_interval: u64,

    /// Seconds before a single HTTP request is abandoned
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,

    /// Failed page fetches in a row before a tweet is given up
    #[arg(long, default_value_t = 3)]
    pub max_retries: usize,

    /// Drop tweet ids the search has already returned
    #[arg(long)]
    pub dedupe: bool,

    /// Client language sent to the platform
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Print the final summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

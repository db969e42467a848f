// src/config.rs
// =============================================================================
// The validated settings for one crawl.
//
// cli.rs only knows how to PARSE arguments. This module decides whether the
// parsed values make sense (a blank keyword, zero workers or a negative sleep
// are all rejected here) and converts them into the types the crawler uses:
// Durations instead of float seconds, Cap instead of -1.
//
// Anything wrong here is a Config error, reported before any network traffic.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::{CrawlError, Result};
use crate::limit::Cap;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub keyword: String,
    /// Folder the JSON records are written to
    pub output: PathBuf,
    /// How many tweet ids the search may hand over in total
    pub max_result: Cap,
    /// How many tweets are downloaded at the same time
    pub max_thread: usize,
    /// Pause between rounds, for the search loop and for every worker
    pub sleep: Duration,
    /// Timeline groups kept per tweet
    pub max_timelines: Cap,
    /// Replies kept per timeline group
    pub timeline_length: Cap,
    pub token_refresh_interval: Duration,
    pub request_timeout: Duration,
    pub max_retries: usize,
    pub dedupe: bool,
    pub lang: String,
}

impl CrawlConfig {
    // Validates the parsed command line
    //
    // Returns: Config error naming the first bad value
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let keyword = cli.keyword.trim();
        if keyword.is_empty() {
            return Err(CrawlError::Config("keyword must not be empty".to_string()));
        }

        if cli.max_thread == 0 {
            return Err(CrawlError::Config("--max-thread must be at least 1".to_string()));
        }

        // Fails on negative, NaN and out-of-range values
        let sleep = Duration::try_from_secs_f64(cli.sleep).map_err(|_| {
            CrawlError::Config(format!(
                "--sleep must be a non-negative number of seconds, got {}",
                cli.sleep
            ))
        })?;

        if cli.request_timeout == 0 {
            return Err(CrawlError::Config("--request-timeout must be at least 1 second".to_string()));
        }

        let lang = cli.lang.trim();
        if lang.is_empty() {
            return Err(CrawlError::Config("--lang must not be empty".to_string()));
        }

        Ok(Self {
            keyword: keyword.to_string(),
            output: cli.output.clone(),
            max_result: cli.max_result,
            max_thread: cli.max_thread,
            sleep,
            max_timelines: cli.max_timelines,
            timeline_length: cli.timeline_length,
            token_refresh_interval: Duration::from_secs(cli.token_refresh_interval),
            request_timeout: Duration::from_secs(cli.request_timeout),
            max_retries: cli.max_retries,
            dedupe: cli.dedupe,
            lang: lang.to_string(),
        })
    }
}

// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap and validate them
// 2. Set up logging (stderr, plus an optional log file)
// 3. Build the real HTTP transport and the JSON storage, start the crawl
// 4. Stop gracefully on Ctrl-C
// 5. Print a summary and exit with a proper code
//    (0 = finished, 1 = some tweets failed, 2 = error)
//
// Rust concepts used:
// - async/await: The crawl is a handful of tokio tasks
// - Arc<dyn Trait>: The crawler only sees Transport and Storage traits
// - Result<T, E>: For error handling (anyhow at this level)
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;           // src/cli.rs - command-line parsing
mod config;        // src/config.rs - validated settings
mod crawl;         // src/crawl/ - the crawl engine
mod error;         // src/error.rs - error kinds of the crawl core
mod limit;         // src/limit.rs - the -1/N caps
mod logging;       // src/logging.rs - tracing setup
mod storage;       // src/storage/ - where records are written
mod twitter;       // src/twitter/ - HTTP transport and payload types

#[cfg(test)]
mod testing;       // src/testing.rs - scripted transport for tests

use std::sync::Arc;

use anyhow::Result;
use clap::Parser; // Parser trait enables the parse() method
use tracing::warn;

use cli::Cli;
use config::CrawlConfig;
use crawl::{CrawlSummary, Crawler};
use storage::JsonStorage;
use twitter::HttpTransport;

// The #[tokio::main] attribute transforms our async main into a real main function
// It creates a multi-threaded tokio runtime and runs our async code inside it
#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Bad arguments, unusable log file, ... : nothing was crawled
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// This is the main application logic
// Returns:
//   Ok(0) = crawl finished
//   Ok(1) = crawl finished but some tweets were given up
//   Err = could not run the crawl at all
async fn run() -> Result<i32> {
    // This will automatically handle --help, --version, etc.
    let cli = Cli::parse();
    let config = CrawlConfig::from_cli(&cli)?;

    logging::init(cli.log_file.as_deref())?;

    println!("🔍 Crawling tweets for: {}", config.keyword);
    println!(
        "📊 Max results: {}, workers: {}, output: {}",
        config.max_result,
        config.max_thread,
        config.output.display()
    );

    let transport = Arc::new(HttpTransport::new(config.request_timeout, &config.lang)?);
    let storage = Arc::new(JsonStorage::new(&config.output));
    let mut crawler = Crawler::new(config, transport, storage);

    crawler.start().await;

    // Either the crawl finishes on its own, or Ctrl-C stops it and we wait
    // for every worker to wind down
    let finished = tokio::select! {
        summary = crawler.wait() => Some(summary),
        _ = tokio::signal::ctrl_c() => None,
    };
    let summary = match finished {
        Some(summary) => summary,
        None => {
            warn!("Ctrl-C received, stopping crawl");
            crawler.stop().await
        }
    };

    print_summary(&summary, cli.json)?;

    if summary.failed > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Prints the summary either as a table or JSON
// Parameters:
//   summary: final numbers of the crawl
//   json: whether to output JSON format
fn print_summary(summary: &CrawlSummary, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(summary)?;
        println!("{}", json_output);
        return Ok(());
    }

    println!();
    println!("📊 Summary:");
    println!("   🔎 Found: {}", summary.enqueued);
    println!("   🚀 Started: {}", summary.dispatched);
    println!("   ✅ Completed: {}", summary.completed);
    println!("   ❌ Failed: {}", summary.failed);
    if summary.stopped > 0 {
        println!("   ⏹️  Stopped: {}", summary.stopped);
    }
    println!("   🧵 Timelines written: {}", summary.groups_written);
    println!("   ⚙️  Peak workers: {}", summary.peak_running);
    Ok(())
}

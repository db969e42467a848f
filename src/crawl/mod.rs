// src/crawl/mod.rs
// =============================================================================
// This module is the crawl engine.
//
// How the pieces fit:
//
//   SearchLoop ──push ids──▶ WorkQueue ──claim──▶ DownloadScheduler
//                                                     │ spawn (≤ max_thread)
//                                                     ▼
//                                   worker: ConversationPager ──▶ Storage
//
// Submodules:
// - credentials: shared token cache with single-flight refresh
// - search: search pagination and the search loop
// - conversation: walks the reply tree of one tweet
// - text_index: id -> text lookup for one conversation
// - queue: work queue and running registry (the concurrency invariant)
// - scheduler: turns queued ids into worker tasks
// - worker: the per-tweet download task
// - orchestrator: the Crawler, owning start/wait/stop
// - record / stats: what gets stored and what gets reported
//
// Rust concepts:
// - Arc: shared ownership of state between tasks
// - CancellationToken: one stop signal observed by every loop
// =============================================================================

mod conversation;
mod credentials;
mod orchestrator;
mod queue;
mod record;
mod scheduler;
mod search;
mod stats;
mod text_index;
mod worker;

pub use orchestrator::Crawler;
pub use record::{ItemRecord, TimelineGroup};
pub use stats::CrawlSummary;

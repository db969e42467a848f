// src/twitter/mod.rs
// =============================================================================
// This module talks to the platform.
//
// Submodules:
// - payload: typed view of the JSON pages the API returns
// - tokens: scrapes the home page for the bearer token and activates a guest
// - fetch: the reqwest-based Transport used by the real binary
//
// The rest of the crawler never sees URLs or headers. It only sees the
// Transport trait below, so tests can swap in a scripted fake.
// =============================================================================

mod fetch;
pub mod payload;
mod tokens;

use async_trait::async_trait;
use std::time::Instant;

use crate::error::Result;
use payload::RawPage;

pub use fetch::HttpTransport;

/// The three tokens every API request needs, plus when we got them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSet {
    pub access_token: String,
    pub csrf_token: String,
    pub guest_token: String,
    pub issued_at: Instant,
}

/// Everything the crawler needs from the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs the full token-acquisition flow
    async fn acquire_credentials(&self) -> Result<CredentialSet>;

    /// One page of search results for `keyword`, starting at `cursor`
    async fn search_page(
        &self,
        keyword: &str,
        credentials: &CredentialSet,
        cursor: Option<&str>,
    ) -> Result<RawPage>;

    /// One page of the conversation under tweet `id`, starting at `cursor`
    async fn item_page(
        &self,
        id: &str,
        credentials: &CredentialSet,
        cursor: Option<&str>,
    ) -> Result<RawPage>;
}

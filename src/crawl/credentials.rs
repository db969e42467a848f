// src/crawl/credentials.rs
// =============================================================================
// Keeps the process-wide CredentialSet fresh.
//
// refresh(force) is called before every search round and every download
// round. Most calls are just a timestamp comparison and return the cached
// set. When the set is missing, expired or `force` is set, the caller runs the
// acquisition flow while holding the lock, so concurrent workers that all see
// an expired set wait for one refresh instead of each starting their own.
//
// If acquisition fails, the stored set is left as it was but is NOT handed
// out: an expired set is an error for the caller, who retries next round.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::twitter::{CredentialSet, Transport};

pub struct CredentialManager {
    transport: Arc<dyn Transport>,
    refresh_interval: Duration,
    current: Mutex<Option<CredentialSet>>,
}

impl CredentialManager {
    pub fn new(transport: Arc<dyn Transport>, refresh_interval: Duration) -> Self {
        Self {
            transport,
            refresh_interval,
            current: Mutex::new(None),
        }
    }

    // Returns a usable CredentialSet, fetching a new one if needed
    //
    // Parameters:
    //   force: always run the acquisition flow, even if the cached set is fresh
    //
    // Returns: CredentialFetch error if a needed refresh failed
    pub async fn refresh(&self, force: bool) -> Result<CredentialSet> {
        let mut current = self.current.lock().await;

        if !force {
            if let Some(set) = current.as_ref() {
                if set.issued_at.elapsed() < self.refresh_interval {
                    return Ok(set.clone());
                }
            }
        }

        info!("Start refresh tokens");
        match self.transport.acquire_credentials().await {
            Ok(set) => {
                info!("Tokens refreshed");
                *current = Some(set.clone());
                Ok(set)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                Err(e)
            }
        }
    }
}

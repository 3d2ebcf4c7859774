//! Rhyme artwork fetcher with best-effort prefetch.
//!
//! Prefetch never blocks layout: requests are spawned and forgotten. Every code has one cell;
//! concurrent requests for the same code (prefetch or direct) wait on the same fetch, and
//! fetched bytes are cached for the lifetime of the process. Failed fetches are not cached.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Client;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::errors::AppError;

pub struct AssetPrefetcher {
    client: Client,
    base_url: Option<String>,
    artwork: Mutex<HashMap<String, Arc<OnceCell<Bytes>>>>,
}

impl AssetPrefetcher {
    pub fn new(base_url: Option<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url,
            artwork: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// Returns the artwork for `code`, fetching it if it is not cached yet.
    /// Joins a fetch already in flight for the same code instead of starting another.
    pub async fn get(&self, code: &str) -> Result<Bytes, AppError> {
        let cell = self.cell(code).await;
        cell.get_or_try_init(|| self.fetch(code)).await.cloned()
    }

    /// Spawns background fetches for every code not already cached.
    pub fn prefetch(self: &Arc<Self>, codes: Vec<String>) {
        if !self.is_enabled() {
            return;
        }
        for code in codes {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                if this.cell(&code).await.initialized() {
                    return;
                }
                match this.get(&code).await {
                    Ok(bytes) => debug!("Prefetched artwork for '{code}' ({} bytes)", bytes.len()),
                    Err(e) => warn!("Artwork prefetch for '{code}' failed: {e}"),
                }
            });
        }
    }

    async fn cell(&self, code: &str) -> Arc<OnceCell<Bytes>> {
        let mut artwork = self.artwork.lock().await;
        Arc::clone(artwork.entry(code.to_string()).or_default())
    }

    async fn fetch(&self, code: &str) -> Result<Bytes, AppError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| AppError::NotFound("Artwork serving is not configured".to_string()))?;
        let url = format!("{base}/{code}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Asset(format!("GET {url}: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("No artwork for rhyme '{code}'")));
        }
        response
            .error_for_status()
            .map_err(|e| AppError::Asset(format!("GET {url}: {e}")))?
            .bytes()
            .await
            .map_err(|e| AppError::Asset(format!("Reading {url}: {e}")))
    }
}

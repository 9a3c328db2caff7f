use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::domain::{Card, Selection};
use storage::LocalCache;
use tracing::{info, warn};

use crate::error::MirrorError;

pub const DEFAULT_CACHE_KEY: &str = "storedCards";

/// Mirrors the selection into a local cache slot. Reads never fail: absent or
/// corrupt data yields an empty selection.
pub struct LocalMirror {
    cache: Arc<dyn LocalCache>,
    key: String,
    parse_failures: AtomicU64,
}

impl LocalMirror {
    pub fn new(cache: Arc<dyn LocalCache>, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
            parse_failures: AtomicU64::new(0),
        }
    }

    pub fn with_default_key(cache: Arc<dyn LocalCache>) -> Self {
        Self::new(cache, DEFAULT_CACHE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub async fn load(&self) -> Selection {
        match self.try_load().await {
            Ok(selection) => selection,
            Err(err) => {
                if matches!(err, MirrorError::Parse(_)) {
                    self.parse_failures.fetch_add(1, Ordering::Relaxed);
                }
                warn!(key = %self.key, %err, "mirror: using empty selection");
                Selection::new()
            }
        }
    }

    pub async fn try_load(&self) -> Result<Selection, MirrorError> {
        let raw = self
            .cache
            .read(&self.key)
            .await
            .map_err(|err| MirrorError::Read(format!("{err:#}")))?;
        let Some(raw) = raw else {
            return Ok(Selection::new());
        };

        let cards: Vec<Card> = serde_json::from_str(&raw)?;
        let total = cards.len();
        let selection = Selection::from_cards(cards);
        if selection.len() != total {
            info!(
                key = %self.key,
                kept = selection.len(),
                total,
                "mirror: dropped duplicate or excess cards from snapshot"
            );
        }
        Ok(selection)
    }

    /// Write failures are logged only; the remote copy stays authoritative.
    pub async fn save(&self, selection: &Selection) {
        if let Err(err) = self.try_save(selection).await {
            warn!(key = %self.key, %err, "mirror: snapshot not written");
        }
    }

    pub async fn try_save(&self, selection: &Selection) -> Result<(), MirrorError> {
        let raw =
            serde_json::to_string(selection).map_err(|err| MirrorError::Write(err.to_string()))?;
        self.cache
            .write(&self.key, &raw)
            .await
            .map_err(|err| MirrorError::Write(format!("{err:#}")))
    }
}

#[cfg(test)]
#[path = "tests/local_mirror_tests.rs"]
mod tests;

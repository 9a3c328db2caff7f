use std::{fs, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use server_api::{CardSource, StaticCatalog};
use shared::{domain::Card, protocol::parse_random_card};
use tracing::info;
use url::Url;

use crate::config::CatalogChoice;

/// Draws one random card per call from the upstream trading-card API by
/// requesting a single-card page at a random offset.
pub struct TcgCatalog {
    http: Client,
    url: Url,
    api_key: String,
    total_cards: u32,
}

impl TcgCatalog {
    pub fn new(url: Url, api_key: impl Into<String>, total_cards: u32) -> Self {
        Self {
            http: Client::new(),
            url,
            api_key: api_key.into(),
            total_cards: total_cards.max(1),
        }
    }
}

#[async_trait]
impl CardSource for TcgCatalog {
    async fn random_card(&self) -> Result<Card> {
        let page = rand::rng().random_range(1..=self.total_cards);
        let body = self
            .http
            .get(self.url.clone())
            .header("X-Api-Key", &self.api_key)
            .query(&[("page", page), ("pageSize", 1)])
            .send()
            .await
            .context("catalog request failed")?
            .error_for_status()?
            .bytes()
            .await?;
        parse_random_card(&body).with_context(|| format!("catalog page {page} was unusable"))
    }
}

pub fn build_card_source(choice: CatalogChoice) -> Result<Arc<dyn CardSource>> {
    let source: Arc<dyn CardSource> = match choice {
        CatalogChoice::Upstream {
            url,
            api_key,
            total_cards,
        } => {
            info!(%url, total_cards, "catalog: using upstream api");
            Arc::new(TcgCatalog::new(url, api_key, total_cards))
        }
        CatalogChoice::File(path) => {
            let raw = fs::read(&path).with_context(|| format!("failed to read catalog '{path}'"))?;
            let catalog = StaticCatalog::from_json(&raw)?;
            info!(%path, cards = catalog.len(), "catalog: loaded from file");
            Arc::new(catalog)
        }
        CatalogChoice::Builtin => {
            info!("catalog: using builtin cards");
            Arc::new(StaticCatalog::builtin())
        }
    };
    Ok(source)
}

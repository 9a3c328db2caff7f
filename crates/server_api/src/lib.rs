use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use shared::{
    domain::{Card, SELECTION_CAPACITY},
    error::{ApiError, ErrorCode, CARD_STORED},
    protocol::CatalogCard,
};
use storage::{StoreCardResult, Storage};
use tracing::{info, warn};

/// Where random cards come from.
#[async_trait]
pub trait CardSource: Send + Sync {
    async fn random_card(&self) -> Result<Card>;
}

/// A fixed in-memory catalog.
pub struct StaticCatalog {
    cards: Vec<Card>,
}

impl StaticCatalog {
    pub fn new(cards: Vec<Card>) -> Result<Self> {
        if cards.is_empty() {
            return Err(anyhow!("static catalog must contain at least one card"));
        }
        Ok(Self { cards })
    }

    /// Loads a JSON array of catalog cards (flat or upstream image shape).
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let entries: Vec<CatalogCard> =
            serde_json::from_slice(raw).context("catalog file is not a JSON array of cards")?;
        let cards = entries
            .into_iter()
            .map(Card::try_from)
            .collect::<Result<Vec<_>, _>>()
            .context("catalog file contains an invalid card")?;
        Self::new(cards)
    }

    pub fn builtin() -> Self {
        let cards = [
            ("base1-58", "Pikachu", "https://images.pokemontcg.io/base1/58_hires.png"),
            ("base1-4", "Charizard", "https://images.pokemontcg.io/base1/4_hires.png"),
            ("base1-2", "Blastoise", "https://images.pokemontcg.io/base1/2_hires.png"),
            ("base1-15", "Venusaur", "https://images.pokemontcg.io/base1/15_hires.png"),
            ("base1-10", "Mewtwo", "https://images.pokemontcg.io/base1/10_hires.png"),
            ("base1-16", "Zapdos", "https://images.pokemontcg.io/base1/16_hires.png"),
            ("base1-14", "Raichu", "https://images.pokemontcg.io/base1/14_hires.png"),
            ("xy7-54", "Gardevoir", "https://images.pokemontcg.io/xy7/54_hires.png"),
        ]
        .into_iter()
        .map(|(id, name, image)| Card::new(id, name, image))
        .collect();
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[async_trait]
impl CardSource for StaticCatalog {
    async fn random_card(&self) -> Result<Card> {
        self.cards
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| anyhow!("static catalog is empty"))
    }
}

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub cards: Arc<dyn CardSource>,
}

pub async fn random_card(ctx: &ApiContext) -> Result<Card, ApiError> {
    ctx.cards.random_card().await.map_err(|err| {
        warn!(%err, "card source failed");
        ApiError::new(ErrorCode::Upstream, "Could not fetch random card")
    })
}

/// Appends `card` to the stored selection. Duplicates are rejected before the
/// capacity check, matching what clients expect to read back.
pub async fn store_card(ctx: &ApiContext, card: Card) -> Result<&'static str, ApiError> {
    validate_card(&card)?;

    match ctx
        .storage
        .store_card_bounded(&card, SELECTION_CAPACITY)
        .await
        .map_err(internal)?
    {
        StoreCardResult::Stored => {
            info!(card_id = %card.id, "store: card stored");
            Ok(CARD_STORED)
        }
        StoreCardResult::Duplicate => {
            info!(card_id = %card.id, "store: duplicate rejected");
            Err(ApiError::duplicate())
        }
        StoreCardResult::Full => {
            info!(card_id = %card.id, capacity = SELECTION_CAPACITY, "store: capacity rejected");
            Err(ApiError::capacity_exceeded())
        }
    }
}

pub async fn list_stored(ctx: &ApiContext) -> Result<Vec<Card>, ApiError> {
    let stored = ctx.storage.list_stored_cards().await.map_err(internal)?;
    Ok(stored.into_iter().map(|stored| stored.card).collect())
}

fn validate_card(card: &Card) -> Result<(), ApiError> {
    if card.id.as_str().trim().is_empty() || card.name.trim().is_empty() {
        return Err(ApiError::validation());
    }
    Ok(())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::{CARD_ALREADY_STORED, CARD_LIMIT_REACHED};

    async fn setup() -> ApiContext {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        ApiContext {
            storage,
            cards: Arc::new(StaticCatalog::builtin()),
        }
    }

    fn card(id: &str) -> Card {
        Card::new(id, format!("card {id}"), "https://img")
    }

    #[tokio::test]
    async fn seventh_card_is_rejected_with_limit_message() {
        let ctx = setup().await;
        for i in 0..SELECTION_CAPACITY {
            store_card(&ctx, card(&i.to_string())).await.expect("store");
        }

        let err = store_card(&ctx, card("overflow"))
            .await
            .expect_err("should fail");
        assert_eq!(err.code, ErrorCode::CapacityExceeded);
        assert_eq!(err.message, CARD_LIMIT_REACHED);
        assert_eq!(list_stored(&ctx).await.expect("list").len(), SELECTION_CAPACITY);
    }

    #[tokio::test]
    async fn duplicate_wins_over_capacity_on_a_full_selection() {
        let ctx = setup().await;
        for i in 0..SELECTION_CAPACITY {
            store_card(&ctx, card(&i.to_string())).await.expect("store");
        }

        let err = store_card(&ctx, card("0")).await.expect_err("should fail");
        assert_eq!(err.code, ErrorCode::Duplicate);
        assert_eq!(err.message, CARD_ALREADY_STORED);
    }

    #[tokio::test]
    async fn blank_id_is_a_validation_error() {
        let ctx = setup().await;
        let err = store_card(&ctx, Card::new(" ", "x", "y"))
            .await
            .expect_err("should fail");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn random_card_comes_from_catalog() {
        let ctx = setup().await;
        let drawn = random_card(&ctx).await.expect("card");
        let catalog = StaticCatalog::builtin();
        assert!(catalog.cards.iter().any(|c| c == &drawn));
    }

    #[test]
    fn catalog_file_accepts_upstream_image_shape() {
        let catalog = StaticCatalog::from_json(
            br#"[{"id":"1","name":"Pikachu","images":{"large":"url"}},{"id":"2","name":"Eevee","image":"e"}]"#,
        )
        .expect("catalog");
        assert_eq!(catalog.len(), 2);
        assert!(StaticCatalog::from_json(b"[]").is_err());
    }
}

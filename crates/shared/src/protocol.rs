use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Card, CardId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,
}

/// A card as served by the catalog: either already flattened (`image`) or in
/// the upstream shape (`images.large` / `images.small`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCard {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<CardImages>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RandomCardBody {
    Envelope { data: Vec<CatalogCard> },
    List(Vec<CatalogCard>),
    Single(CatalogCard),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("card payload is not valid JSON of a known shape: {0}")]
    Malformed(String),
    #[error("card payload contained no cards")]
    Empty,
    #[error("card payload is missing an id")]
    MissingId,
    #[error("card {0} has no image reference")]
    MissingImage(String),
}

impl TryFrom<CatalogCard> for Card {
    type Error = PayloadError;

    fn try_from(value: CatalogCard) -> Result<Self, Self::Error> {
        let id = value.id.trim();
        if id.is_empty() {
            return Err(PayloadError::MissingId);
        }
        let images = value.images.unwrap_or_default();
        let image = value
            .image
            .filter(|image| !image.is_empty())
            .or(images.large)
            .or(images.small)
            .ok_or_else(|| PayloadError::MissingImage(id.to_string()))?;
        Ok(Card {
            id: CardId::new(id),
            name: value.name,
            image,
        })
    }
}

/// Parses a random-card response body into a [`Card`]. Accepts a bare card, a
/// list (first element wins) or a `{ "data": [...] }` envelope.
pub fn parse_random_card(body: &[u8]) -> Result<Card, PayloadError> {
    let parsed: RandomCardBody =
        serde_json::from_slice(body).map_err(|err| PayloadError::Malformed(err.to_string()))?;
    let first = match parsed {
        RandomCardBody::Envelope { data } | RandomCardBody::List(data) => data.into_iter().next(),
        RandomCardBody::Single(card) => Some(card),
    };
    first.ok_or(PayloadError::Empty)?.try_into()
}

/// Parses a stored-cards listing. Every element must be a valid card.
pub fn parse_card_list(body: &[u8]) -> Result<Vec<Card>, PayloadError> {
    let cards: Vec<CatalogCard> =
        serde_json::from_slice(body).map_err(|err| PayloadError::Malformed(err.to_string()))?;
    cards.into_iter().map(Card::try_from).collect()
}

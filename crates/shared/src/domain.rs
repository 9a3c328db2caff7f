use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of cards a selection may hold.
pub const SELECTION_CAPACITY: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog item. Identity is `id`; the other fields are display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub image: String,
}

impl Card {
    pub fn new(id: impl Into<String>, name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: CardId::new(id),
            name: name.into(),
            image: image.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionInsertError {
    Duplicate,
    Full,
}

/// Ordered cards, unique by id, never more than [`SELECTION_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection {
    cards: Vec<Card>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selection from an untrusted list. Later duplicates are dropped
    /// and anything past capacity is cut off.
    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut selection = Self::new();
        for card in cards {
            if selection.is_full() {
                break;
            }
            let _ = selection.try_push(card);
        }
        selection
    }

    pub fn try_push(&mut self, card: Card) -> Result<(), SelectionInsertError> {
        if self.contains(&card.id) {
            return Err(SelectionInsertError::Duplicate);
        }
        if self.is_full() {
            return Err(SelectionInsertError::Full);
        }
        self.cards.push(card);
        Ok(())
    }

    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.iter().any(|card| &card.id == id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.cards.len() >= SELECTION_CAPACITY
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Card> {
        self.cards.iter()
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let cards = Vec::<Card>::deserialize(deserializer)?;
        Ok(Self::from_cards(cards))
    }
}

impl<'a> IntoIterator for &'a Selection {
    type Item = &'a Card;
    type IntoIter = std::slice::Iter<'a, Card>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}

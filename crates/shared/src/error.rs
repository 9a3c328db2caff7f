use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::SELECTION_CAPACITY;

/// Plain-text bodies the store endpoint answers with. Clients classify
/// rejections by matching these strings, so they are part of the wire contract.
pub const CARD_ALREADY_STORED: &str = "Card already stored";
pub const CARD_LIMIT_REACHED: &str = "Limit of 6 cards reached";
pub const COULD_NOT_STORE_CARD: &str = "Could not store card";
pub const CARD_STORED: &str = "Card stored successfully";
pub const INVALID_REQUEST: &str = "Invalid request";

const _: () = assert!(SELECTION_CAPACITY == 6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Duplicate,
    CapacityExceeded,
    Validation,
    Upstream,
    Internal,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn duplicate() -> Self {
        Self::new(ErrorCode::Duplicate, CARD_ALREADY_STORED)
    }

    pub fn capacity_exceeded() -> Self {
        Self::new(ErrorCode::CapacityExceeded, CARD_LIMIT_REACHED)
    }

    pub fn validation() -> Self {
        Self::new(ErrorCode::Validation, INVALID_REQUEST)
    }
}

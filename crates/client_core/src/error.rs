use shared::{
    domain::SELECTION_CAPACITY,
    error::{CARD_ALREADY_STORED, CARD_LIMIT_REACHED, COULD_NOT_STORE_CARD},
    protocol::PayloadError,
};
use thiserror::Error;

pub const FETCH_FAILED: &str = "fetch failed";
pub const LIST_FAILED: &str = "Could not fetch stored cards";
pub const NO_CARD_TO_STORE: &str = "no card to store";

/// Everything a selection operation can fail with. The display text is what
/// gets shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("{0}")]
    Network(String),
    #[error("{}", CARD_ALREADY_STORED)]
    Duplicate,
    #[error("{}", CARD_LIMIT_REACHED)]
    Capacity,
}

impl SelectionError {
    pub fn fetch_failed() -> Self {
        Self::Network(FETCH_FAILED.to_string())
    }

    pub fn store_failed() -> Self {
        Self::Network(COULD_NOT_STORE_CARD.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("unexpected response payload: {0}")]
    Schema(#[from] PayloadError),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Local snapshot problems. Logged, never shown to the user.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("cached selection is not a card list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read cached selection: {0}")]
    Read(String),
    #[error("failed to write cached selection: {0}")]
    Write(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    Duplicate,
    Capacity,
    /// Generic store failure that only means "full" when the local selection
    /// is already at capacity.
    CapacityIfFull,
}

/// Known rejection bodies from the store endpoint. Matching free text is
/// fragile; anything not listed here is a generic network failure.
pub const REJECTION_TABLE: &[(&str, RejectionKind)] = &[
    (CARD_ALREADY_STORED, RejectionKind::Duplicate),
    (CARD_LIMIT_REACHED, RejectionKind::Capacity),
    (COULD_NOT_STORE_CARD, RejectionKind::CapacityIfFull),
];

pub fn rejection_kind(body: &str) -> Option<RejectionKind> {
    let body = body.trim();
    REJECTION_TABLE
        .iter()
        .find(|(text, _)| *text == body)
        .map(|(_, kind)| *kind)
}

pub fn classify_rejection(body: &str, selection_len: usize) -> SelectionError {
    match rejection_kind(body) {
        Some(RejectionKind::Duplicate) => SelectionError::Duplicate,
        Some(RejectionKind::Capacity) => SelectionError::Capacity,
        Some(RejectionKind::CapacityIfFull) if selection_len >= SELECTION_CAPACITY => {
            SelectionError::Capacity
        }
        _ => SelectionError::store_failed(),
    }
}

/// Some servers answer 2xx with a rejection text. Those still count as
/// rejections; any other 2xx body is an acknowledgement.
pub fn classify_acknowledgement(body: &str) -> Option<SelectionError> {
    match rejection_kind(body)? {
        RejectionKind::Duplicate => Some(SelectionError::Duplicate),
        RejectionKind::Capacity => Some(SelectionError::Capacity),
        RejectionKind::CapacityIfFull => None,
    }
}

use std::sync::Arc;

use shared::domain::{Card, Selection};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod error;
mod local_mirror;
mod remote;

pub use error::{MirrorError, RemoteError, SelectionError};
pub use local_mirror::{LocalMirror, DEFAULT_CACHE_KEY};
pub use remote::{HttpRemoteStore, RemoteStore, StoreAck};

use error::{classify_acknowledgement, classify_rejection, LIST_FAILED, NO_CARD_TO_STORE};

/// Where a `save_current` call is while it runs. Always `Idle` between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePhase {
    #[default]
    Idle,
    Validating,
    Persisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    CapacityRejected,
    DuplicateRejected,
    NetworkFailed,
    Persisted,
}

impl From<&SelectionError> for SaveOutcome {
    fn from(err: &SelectionError) -> Self {
        match err {
            SelectionError::Capacity => Self::CapacityRejected,
            SelectionError::Duplicate => Self::DuplicateRejected,
            SelectionError::Network(_) => Self::NetworkFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SelectionEvent {
    RandomCardChanged(Card),
    SelectionChanged(Selection),
    SaveFinished(SaveOutcome),
    Error(String),
}

#[derive(Debug, Default)]
struct SelectionState {
    random_card: Option<Card>,
    selection: Selection,
    error: Option<SelectionError>,
    phase: SavePhase,
}

/// Owns the displayed candidate card, the cached selection and the current
/// error. All mutation goes through the operations below.
pub struct SelectionController {
    remote: Arc<dyn RemoteStore>,
    mirror: LocalMirror,
    state: Mutex<SelectionState>,
    save_guard: Mutex<()>,
    events: broadcast::Sender<SelectionEvent>,
}

impl SelectionController {
    pub fn new(remote: Arc<dyn RemoteStore>, mirror: LocalMirror) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            remote,
            mirror,
            state: Mutex::new(SelectionState::default()),
            save_guard: Mutex::new(()),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SelectionEvent> {
        self.events.subscribe()
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }

    /// Seeds the selection from the local snapshot, then shows a first random
    /// card. A failed fetch only lands in the error state.
    pub async fn initialize(&self) {
        let snapshot = self.mirror.load().await;
        info!(cards = snapshot.len(), "selection: seeded from local snapshot");
        self.state.lock().await.selection = snapshot.clone();
        self.emit(SelectionEvent::SelectionChanged(snapshot));

        let _ = self.fetch_random().await;
    }

    pub async fn fetch_random(&self) -> Result<Card, SelectionError> {
        match self.remote.fetch_random().await {
            Ok(card) => {
                {
                    let mut state = self.state.lock().await;
                    state.random_card = Some(card.clone());
                    state.error = None;
                }
                info!(card_id = %card.id, "selection: random card fetched");
                self.emit(SelectionEvent::RandomCardChanged(card.clone()));
                Ok(card)
            }
            Err(err) => {
                warn!(%err, "selection: random card fetch failed");
                let err = SelectionError::fetch_failed();
                self.record_error(&err).await;
                Err(err)
            }
        }
    }

    pub async fn next_random(&self) -> Result<Card, SelectionError> {
        self.fetch_random().await
    }

    /// Saves and refreshes on one controller run one at a time. The selection
    /// and its mirror change only after the remote store acknowledged a card.
    pub async fn save_current(&self) -> Result<(), SelectionError> {
        let _in_flight = self.save_guard.lock().await;

        let (card, stored_len) = {
            let mut state = self.state.lock().await;
            state.phase = SavePhase::Validating;
            let Some(card) = state.random_card.clone() else {
                let err = SelectionError::Network(NO_CARD_TO_STORE.to_string());
                return Err(self.reject(&mut state, err));
            };
            // A full selection never reaches the remote store.
            if state.selection.is_full() {
                return Err(self.reject(&mut state, SelectionError::Capacity));
            }
            state.phase = SavePhase::Persisting;
            (card, state.selection.len())
        };

        let verdict = match self.remote.persist(&card).await {
            Ok(ack) => match classify_acknowledgement(&ack.message) {
                Some(err) => Err(err),
                None => Ok(()),
            },
            Err(RemoteError::Rejected { status, body }) => {
                warn!(status, %body, card_id = %card.id, "selection: store rejected");
                Err(classify_rejection(&body, stored_len))
            }
            Err(err) => {
                warn!(%err, card_id = %card.id, "selection: store failed");
                Err(SelectionError::store_failed())
            }
        };
        if let Err(err) = verdict {
            let mut state = self.state.lock().await;
            return Err(self.reject(&mut state, err));
        }
        info!(card_id = %card.id, "selection: card persisted");

        let selection = self.refreshed_selection(&card).await;
        let already_held = {
            let mut state = self.state.lock().await;
            let held = state.selection.contains(&card.id);
            state.selection = selection.clone();
            state.error = None;
            held
        };
        self.emit(SelectionEvent::SelectionChanged(selection.clone()));
        self.mirror.save(&selection).await;

        // The store accepted a card this client already listed, so the local
        // copy was stale. It is resynced above and still reads as a duplicate.
        if already_held {
            let mut state = self.state.lock().await;
            return Err(self.reject(&mut state, SelectionError::Duplicate));
        }

        let _ = self.fetch_random().await;

        self.state.lock().await.phase = SavePhase::Idle;
        self.emit(SelectionEvent::SaveFinished(SaveOutcome::Persisted));
        Ok(())
    }

    pub async fn list_stored(&self) -> Selection {
        self.state.lock().await.selection.clone()
    }

    /// Re-reads the authoritative list and mirrors it locally.
    pub async fn refresh_stored(&self) -> Result<Selection, SelectionError> {
        let _in_flight = self.save_guard.lock().await;
        let cards = match self.remote.list_stored().await {
            Ok(cards) => cards,
            Err(err) => {
                warn!(%err, "selection: stored cards fetch failed");
                let err = SelectionError::Network(LIST_FAILED.to_string());
                self.record_error(&err).await;
                return Err(err);
            }
        };

        let selection = bounded(cards);
        {
            let mut state = self.state.lock().await;
            state.selection = selection.clone();
            state.error = None;
        }
        self.emit(SelectionEvent::SelectionChanged(selection.clone()));
        self.mirror.save(&selection).await;
        Ok(selection)
    }

    pub async fn random_card(&self) -> Option<Card> {
        self.state.lock().await.random_card.clone()
    }

    pub async fn error(&self) -> Option<SelectionError> {
        self.state.lock().await.error.clone()
    }

    pub async fn phase(&self) -> SavePhase {
        self.state.lock().await.phase
    }

    pub async fn dismiss_error(&self) {
        self.state.lock().await.error = None;
    }

    /// After an acknowledged store: the remote list if it can be read,
    /// otherwise the local selection with the card appended.
    async fn refreshed_selection(&self, card: &Card) -> Selection {
        match self.remote.list_stored().await {
            Ok(cards) => bounded(cards),
            Err(err) => {
                warn!(
                    %err,
                    card_id = %card.id,
                    "selection: list after store failed, appending locally"
                );
                let mut selection = self.state.lock().await.selection.clone();
                let _ = selection.try_push(card.clone());
                selection
            }
        }
    }

    fn reject(&self, state: &mut SelectionState, err: SelectionError) -> SelectionError {
        state.error = Some(err.clone());
        state.phase = SavePhase::Idle;
        self.emit(SelectionEvent::Error(err.to_string()));
        self.emit(SelectionEvent::SaveFinished(SaveOutcome::from(&err)));
        err
    }

    async fn record_error(&self, err: &SelectionError) {
        self.state.lock().await.error = Some(err.clone());
        self.emit(SelectionEvent::Error(err.to_string()));
    }

    fn emit(&self, event: SelectionEvent) {
        let _ = self.events.send(event);
    }
}

fn bounded(cards: Vec<Card>) -> Selection {
    let total = cards.len();
    let selection = Selection::from_cards(cards);
    if selection.len() != total {
        warn!(
            kept = selection.len(),
            total, "selection: remote list had duplicate or excess cards"
        );
    }
    selection
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

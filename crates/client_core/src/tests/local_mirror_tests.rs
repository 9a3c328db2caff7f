use super::*;
use anyhow::anyhow;
use async_trait::async_trait;
use shared::domain::SELECTION_CAPACITY;
use storage::{MemoryCache, Storage};

struct BrokenCache;

#[async_trait]
impl LocalCache for BrokenCache {
    async fn read(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Err(anyhow!("storage quota exceeded"))
    }

    async fn write(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        Err(anyhow!("storage quota exceeded"))
    }
}

fn card(id: &str) -> Card {
    Card::new(id, format!("card {id}"), format!("https://img/{id}.png"))
}

#[tokio::test]
async fn absent_slot_loads_as_empty() {
    let mirror = LocalMirror::with_default_key(Arc::new(MemoryCache::new()));
    assert!(mirror.load().await.is_empty());
    assert_eq!(mirror.parse_failures(), 0);
}

#[tokio::test]
async fn saved_selection_loads_back_equal() {
    let mirror = LocalMirror::with_default_key(Arc::new(MemoryCache::new()));
    let selection = Selection::from_cards(["1", "2", "3"].map(card));

    mirror.save(&selection).await;

    assert_eq!(mirror.load().await, selection);
}

#[tokio::test]
async fn full_selection_round_trips_through_sqlite() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mirror = LocalMirror::new(Arc::new(storage), "pick-six");
    let selection = Selection::from_cards((0..SELECTION_CAPACITY).map(|i| card(&i.to_string())));

    mirror.try_save(&selection).await.expect("save");

    assert_eq!(mirror.try_load().await.expect("load"), selection);
}

#[tokio::test]
async fn invalid_snapshot_loads_as_empty_and_is_counted() {
    let snapshots = [
        "{not json",
        "null",
        "",
        r#"[{"id":"1"}]"#,
        r#"{"id":"1","name":"a","image":"b"}"#,
    ];
    for raw in snapshots {
        let cache = Arc::new(MemoryCache::with_slot(DEFAULT_CACHE_KEY, raw));
        let mirror = LocalMirror::with_default_key(cache);

        assert!(mirror.load().await.is_empty(), "snapshot {raw:?}");
        assert_eq!(mirror.parse_failures(), 1, "snapshot {raw:?}");
        assert!(matches!(mirror.try_load().await, Err(MirrorError::Parse(_))));
    }
}

#[tokio::test]
async fn oversized_snapshot_is_cut_to_capacity() {
    let cards: Vec<Card> = (0..9).map(|i| card(&i.to_string())).collect();
    let raw = serde_json::to_string(&cards).expect("json");
    let cache = Arc::new(MemoryCache::with_slot(DEFAULT_CACHE_KEY, raw));
    let mirror = LocalMirror::with_default_key(cache);

    let selection = mirror.load().await;

    assert_eq!(selection.len(), SELECTION_CAPACITY);
    assert_eq!(selection.cards()[0], card("0"));
}

#[tokio::test]
async fn unreadable_cache_loads_as_empty_without_counting_a_parse_error() {
    let mirror = LocalMirror::with_default_key(Arc::new(BrokenCache));

    assert!(mirror.load().await.is_empty());
    assert_eq!(mirror.parse_failures(), 0);
    assert!(matches!(mirror.try_load().await, Err(MirrorError::Read(_))));
}

#[tokio::test]
async fn write_failure_is_not_propagated() {
    let mirror = LocalMirror::with_default_key(Arc::new(BrokenCache));
    let selection = Selection::from_cards([card("1")]);

    mirror.save(&selection).await;

    assert!(matches!(
        mirror.try_save(&selection).await,
        Err(MirrorError::Write(_))
    ));
}

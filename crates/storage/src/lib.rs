use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::sync::Mutex;

use shared::domain::{Card, CardId};

/// A single named slot per key holding a serialized value. Writes replace the
/// whole slot.
#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;
    async fn write(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryCache {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut slots = HashMap::new();
        slots.insert(key.into(), value.into());
        Self {
            slots: Mutex::new(slots),
        }
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.slots
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredCard {
    pub card: Card,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCardResult {
    Stored,
    Duplicate,
    Full,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Appends `card` unless its id is already stored or `capacity` cards are
    /// already present. Duplicate detection wins over the capacity check.
    pub async fn store_card_bounded(
        &self,
        card: &Card,
        capacity: usize,
    ) -> Result<StoreCardResult> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT position FROM stored_cards WHERE card_id = ?")
                .bind(card.id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Ok(StoreCardResult::Duplicate);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stored_cards")
            .fetch_one(&mut *tx)
            .await?;
        if count as usize >= capacity {
            return Ok(StoreCardResult::Full);
        }

        sqlx::query("INSERT INTO stored_cards (card_id, name, image) VALUES (?, ?, ?)")
            .bind(card.id.as_str())
            .bind(&card.name)
            .bind(&card.image)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert stored card {}", card.id))?;
        tx.commit().await?;
        Ok(StoreCardResult::Stored)
    }

    pub async fn list_stored_cards(&self) -> Result<Vec<StoredCard>> {
        let rows = sqlx::query(
            "SELECT card_id, name, image, stored_at FROM stored_cards ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StoredCard {
                card: Card {
                    id: CardId(r.get::<String, _>(0)),
                    name: r.get::<String, _>(1),
                    image: r.get::<String, _>(2),
                },
                stored_at: r.get::<DateTime<Utc>, _>(3),
            })
            .collect())
    }
}

#[async_trait]
impl LocalCache for Storage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM local_cache WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read cache slot '{key}'"))?;
        Ok(value)
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO local_cache (cache_key, value, updated_at)
            VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(cache_key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write cache slot '{key}'"))?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

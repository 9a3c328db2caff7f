use std::{collections::HashMap, fs};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CATALOG_URL: &str = "https://api.pokemontcg.io/v2/cards";
pub const DEFAULT_CATALOG_TOTAL_CARDS: u32 = 18506;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub catalog_api_key: Option<String>,
    pub catalog_url: String,
    pub catalog_total_cards: u32,
    pub catalog_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            database_url: "sqlite://./data/server.db".into(),
            catalog_api_key: None,
            catalog_url: DEFAULT_CATALOG_URL.into(),
            catalog_total_cards: DEFAULT_CATALOG_TOTAL_CARDS,
            catalog_file: None,
        }
    }
}

/// Where `GET /random-card` draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogChoice {
    Upstream {
        url: Url,
        api_key: String,
        total_cards: u32,
    },
    File(String),
    Builtin,
}

impl Settings {
    pub fn catalog_choice(&self) -> anyhow::Result<CatalogChoice> {
        if let Some(api_key) = self.catalog_api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            let url = Url::parse(&self.catalog_url)
                .with_context(|| format!("invalid catalog url '{}'", self.catalog_url))?;
            if self.catalog_total_cards == 0 {
                return Err(anyhow!("catalog_total_cards must be greater than zero"));
            }
            return Ok(CatalogChoice::Upstream {
                url,
                api_key: api_key.clone(),
                total_cards: self.catalog_total_cards,
            });
        }
        if let Some(path) = &self.catalog_file {
            return Ok(CatalogChoice::File(path.clone()));
        }
        Ok(CatalogChoice::Builtin)
    }
}

pub fn load_settings() -> Settings {
    let file_cfg = fs::read_to_string("server.toml").ok();
    load_settings_from(file_cfg.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `server.toml` keys, then environment. Later sources win; a
/// prefixed `APP__` variable wins over its bare counterpart.
pub fn load_settings_from(
    file_cfg: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_cfg {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) {
            let text = |key: &str| file_cfg.get(key).and_then(|v| v.as_str()).map(str::to_string);
            if let Some(v) = text("bind_addr") {
                settings.server_bind = v;
            }
            if let Some(v) = text("database_url") {
                settings.database_url = v;
            }
            if let Some(v) = text("catalog_url") {
                settings.catalog_url = v;
            }
            if let Some(v) = text("catalog_file") {
                settings.catalog_file = Some(v);
            }
            if let Some(v) = file_cfg.get("catalog_total_cards").and_then(|v| v.as_integer()) {
                if let Ok(v) = u32::try_from(v) {
                    settings.catalog_total_cards = v;
                }
            }
        }
    }

    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = env(key) {
            settings.server_bind = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    for key in ["POKEMON_API_KEY", "APP__CATALOG_API_KEY"] {
        if let Some(v) = env(key) {
            settings.catalog_api_key = Some(v);
        }
    }
    if let Some(v) = env("APP__CATALOG_URL") {
        settings.catalog_url = v;
    }
    if let Some(v) = env("APP__CATALOG_FILE") {
        settings.catalog_file = Some(v);
    }
    if let Some(v) = env("APP__CATALOG_TOTAL_CARDS") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.catalog_total_cards = parsed;
        }
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

pub(crate) fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

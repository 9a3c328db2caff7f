use std::{collections::HashMap, fs};

use anyhow::Context;
use client_core::DEFAULT_CACHE_KEY;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub cache_url: String,
    pub cache_key: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            cache_url: "sqlite://./data/client.db".into(),
            cache_key: DEFAULT_CACHE_KEY.into(),
        }
    }
}

/// Values given on the command line. `None` keeps the layered value.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub cache_url: Option<String>,
    pub cache_key: Option<String>,
}

impl ClientSettings {
    pub fn validated_server_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url '{}'", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("server url must be http or https, got '{}'", url.scheme());
        }
        Ok(url)
    }
}

pub fn load_settings(overrides: Overrides) -> ClientSettings {
    let file_cfg = fs::read_to_string("client.toml").ok();
    load_settings_from(file_cfg.as_deref(), |key| std::env::var(key).ok(), overrides)
}

/// Defaults, then `client.toml`, then `PICK_SIX_*` environment, then flags.
pub fn load_settings_from(
    file_cfg: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    overrides: Overrides,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file_cfg {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) {
            let text = |key: &str| file_cfg.get(key).and_then(|v| v.as_str()).map(str::to_string);
            if let Some(v) = text("server_url") {
                settings.server_url = v;
            }
            if let Some(v) = text("cache_url") {
                settings.cache_url = v;
            }
            if let Some(v) = text("cache_key") {
                settings.cache_key = v;
            }
        }
    }

    if let Some(v) = env("PICK_SIX_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("PICK_SIX_CACHE_URL") {
        settings.cache_url = v;
    }
    if let Some(v) = env("PICK_SIX_CACHE_KEY") {
        settings.cache_key = v;
    }

    if let Some(v) = overrides.server_url {
        settings.server_url = v;
    }
    if let Some(v) = overrides.cache_url {
        settings.cache_url = v;
    }
    if let Some(v) = overrides.cache_key {
        settings.cache_key = v;
    }

    if settings.cache_key.trim().is_empty() {
        settings.cache_key = DEFAULT_CACHE_KEY.into();
    }
    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

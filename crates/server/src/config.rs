use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub llm_api_base: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub history_limit: u32,
    pub cors_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8001".into(),
            database_url: "sqlite://./data/history.db".into(),
            llm_api_base: "https://api.openai.com/v1".into(),
            llm_api_key: None,
            llm_model: "gpt-5".into(),
            history_limit: 50,
            cors_origins: vec!["*".into()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    llm_api_base: Option<String>,
    llm_api_key: Option<String>,
    llm_model: Option<String>,
    history_limit: Option<u32>,
    cors_origins: Option<Vec<String>>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(error) => warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file"),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.llm_api_base {
        settings.llm_api_base = v;
    }
    if let Some(v) = file_cfg.llm_api_key {
        settings.llm_api_key = Some(v);
    }
    if let Some(v) = file_cfg.llm_model {
        settings.llm_model = v;
    }
    if let Some(v) = file_cfg.history_limit {
        settings.history_limit = v;
    }
    if let Some(v) = file_cfg.cors_origins {
        settings.cors_origins = v;
    }
}

/// Later keys in each list win, so `APP__*` names override the plain ones.
fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    let lookup = |keys: &[&str]| keys.iter().filter_map(|key| env(*key)).last();

    if let Some(v) = lookup(&["SERVER_BIND", "APP__BIND_ADDR"]) {
        settings.server_bind = v;
    }
    if let Some(v) = lookup(&["DATABASE_URL", "APP__DATABASE_URL"]) {
        settings.database_url = v;
    }
    if let Some(v) = lookup(&["LLM_API_BASE", "APP__LLM_API_BASE"]) {
        settings.llm_api_base = v;
    }
    if let Some(v) = lookup(&["EMERGENT_LLM_KEY", "LLM_API_KEY", "APP__LLM_API_KEY"]) {
        settings.llm_api_key = Some(v).filter(|key| !key.trim().is_empty());
    }
    if let Some(v) = lookup(&["LLM_MODEL", "APP__LLM_MODEL"]) {
        settings.llm_model = v;
    }
    if let Some(v) = lookup(&["HISTORY_LIMIT", "APP__HISTORY_LIMIT"]) {
        match v.parse::<u32>() {
            Ok(parsed) => settings.history_limit = parsed,
            Err(error) => warn!(value = %v, %error, "ignoring invalid HISTORY_LIMIT"),
        }
    }
    if let Some(v) = lookup(&["CORS_ORIGINS", "APP__CORS_ORIGINS"]) {
        settings.cors_origins = v
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

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
#[path = "tests/config_tests.rs"]
mod tests;

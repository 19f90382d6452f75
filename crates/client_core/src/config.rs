use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::session::{SessionConfig, DEFAULT_REQUEST_TIMEOUT};

pub const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8001".into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            request_timeout: self.request_timeout,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// Defaults, then `client.toml` (or the given file), then environment.
pub fn load_client_settings(path: Option<&Path>) -> ClientSettings {
    let mut settings = ClientSettings::default();
    let path = path.unwrap_or_else(|| Path::new(SETTINGS_FILE));

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(error) => {
                warn!(%error, file = %path.display(), "ignoring unreadable client settings")
            }
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_settings(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.timeout_secs.filter(|secs| *secs > 0) {
        settings.request_timeout = Duration::from_secs(v);
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("REPHRASE_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("REPHRASE_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(secs) if secs > 0 => settings.request_timeout = Duration::from_secs(secs),
            _ => warn!(value = %v, "ignoring invalid REPHRASE_TIMEOUT_SECS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_then_env_values_apply_in_order() {
        let mut settings = ClientSettings::default();
        let file_cfg: FileSettings =
            toml::from_str("server_url = \"http://files.test\"\ntimeout_secs = 15").expect("toml");
        apply_file_settings(&mut settings, file_cfg);
        assert_eq!(settings.server_url, "http://files.test");
        assert_eq!(settings.request_timeout, Duration::from_secs(15));

        apply_env_overrides(&mut settings, |key| match key {
            "REPHRASE_SERVER_URL" => Some("http://env.test".into()),
            _ => None,
        });
        assert_eq!(settings.server_url, "http://env.test");
        assert_eq!(settings.session_config().request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn zero_or_garbage_timeouts_are_ignored() {
        let mut settings = ClientSettings::default();
        apply_env_overrides(&mut settings, |key| {
            (key == "REPHRASE_TIMEOUT_SECS").then(|| "0".to_string())
        });
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);

        apply_env_overrides(&mut settings, |key| {
            (key == "REPHRASE_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}

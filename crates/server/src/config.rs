use std::{fs, path::Path};

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    /// Upper bound on a request body; base64 adds a third on top of the image.
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:5000".into(),
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    max_body_bytes: Option<usize>,
}

/// Defaults, then `server.toml` if present, then the environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(DEFAULT_CONFIG_PATH));
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<FileSettings>(&raw) {
        Ok(file_cfg) => {
            if let Some(v) = file_cfg.bind_addr {
                settings.server_bind = v;
            }
            if let Some(v) = file_cfg.max_body_bytes {
                settings.max_body_bytes = v;
            }
        }
        Err(error) => warn!(path = %path.display(), %error, "ignoring unreadable config file"),
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = lookup("APP__MAX_BODY_BYTES") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.max_body_bytes = parsed,
            Err(error) => warn!(value = %v, %error, "ignoring invalid APP__MAX_BODY_BYTES"),
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

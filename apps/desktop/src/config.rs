use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::{
    remote::{DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT},
    RemotePredictorConfig,
};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "desktop.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Settings {
    pub fn predictor_config(&self) -> anyhow::Result<RemotePredictorConfig> {
        let endpoint = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid classification endpoint '{}'", self.endpoint))?;
        Ok(RemotePredictorConfig::new(endpoint)
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    endpoint: Option<String>,
    request_timeout_ms: Option<u64>,
}

/// Defaults, then the config file, then the environment. An explicitly
/// named file must exist; the default one is optional.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match explicit_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config '{}'", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("failed to parse config '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_PATH) {
                apply_file(&mut settings, &raw)
                    .with_context(|| format!("failed to parse config '{DEFAULT_CONFIG_PATH}'"))?;
            }
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.endpoint {
        settings.endpoint = v;
    }
    if let Some(v) = file_cfg.request_timeout_ms {
        settings.request_timeout_ms = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PREDICT_ENDPOINT") {
        settings.endpoint = v;
    }
    if let Some(v) = lookup("APP__PREDICT_ENDPOINT") {
        settings.endpoint = v;
    }

    for key in ["PREDICT_TIMEOUT_MS", "APP__PREDICT_TIMEOUT_MS"] {
        if let Some(v) = lookup(key) {
            if let Ok(parsed) = v.parse::<u64>() {
                settings.request_timeout_ms = parsed;
            }
        }
    }
}

use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use souschef::EngineConfig;
use url::Url;

pub const SETTINGS_FILE: &str = "onionbot.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub control_url: String,
    pub recipe_path: PathBuf,
    pub tick_ms: u64,
    pub settle_factor: f64,
    pub request_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            control_url: "http://127.0.0.1:5000/".into(),
            recipe_path: "recipes/pasta.toml".into(),
            tick_ms: 100,
            settle_factor: 5.0,
            request_timeout_ms: 2000,
        }
    }
}

impl Settings {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick: Duration::from_millis(self.tick_ms),
            settle_factor: self.settle_factor,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

pub fn load_settings() -> Settings {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from(raw.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file, then environment overrides.
pub fn settings_from(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) {
            if let Some(v) = file_cfg.get("control_url").and_then(toml::Value::as_str) {
                settings.control_url = v.to_string();
            }
            if let Some(v) = file_cfg.get("recipe_path").and_then(toml::Value::as_str) {
                settings.recipe_path = v.into();
            }
            if let Some(v) = file_cfg.get("tick_ms").and_then(toml::Value::as_integer) {
                if let Ok(v) = u64::try_from(v) {
                    settings.tick_ms = v;
                }
            }
            if let Some(v) = file_cfg.get("settle_factor").and_then(as_float) {
                settings.settle_factor = v;
            }
            if let Some(v) = file_cfg
                .get("request_timeout_ms")
                .and_then(toml::Value::as_integer)
            {
                if let Ok(v) = u64::try_from(v) {
                    settings.request_timeout_ms = v;
                }
            }
        }
    }

    if let Some(v) = env("ONIONBOT_CONTROL_URL") {
        settings.control_url = v;
    }
    if let Some(v) = env("APP__CONTROL_URL") {
        settings.control_url = v;
    }

    if let Some(v) = env("ONIONBOT_RECIPE") {
        settings.recipe_path = v.into();
    }
    if let Some(v) = env("APP__RECIPE_PATH") {
        settings.recipe_path = v.into();
    }

    if let Some(v) = env("APP__TICK_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.tick_ms = parsed;
        }
    }
    if let Some(v) = env("APP__SETTLE_FACTOR") {
        if let Ok(parsed) = v.parse::<f64>() {
            settings.settle_factor = parsed;
        }
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_ms = parsed;
        }
    }

    settings
}

fn as_float(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|v| v as f64))
}

pub fn prepare_control_url(raw_control_url: &str) -> anyhow::Result<String> {
    let control_url = normalize_control_url(raw_control_url);
    let parsed = Url::parse(&control_url)
        .with_context(|| format!("invalid control url '{raw_control_url}'"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("control url '{raw_control_url}' must use http or https");
    }
    if parsed.host_str().is_none() {
        bail!("control url '{raw_control_url}' has no host");
    }

    Ok(parsed.to_string())
}

fn normalize_control_url(raw_control_url: &str) -> String {
    let raw_control_url = raw_control_url.trim();

    if raw_control_url.is_empty() {
        return Settings::default().control_url;
    }

    let with_scheme = if raw_control_url.contains("://") {
        raw_control_url.to_string()
    } else {
        format!("http://{raw_control_url}")
    };

    if with_scheme.ends_with('/') {
        with_scheme
    } else {
        format!("{with_scheme}/")
    }
}

pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    if settings.tick_ms == 0 {
        bail!("tick_ms must be greater than zero");
    }
    if !settings.settle_factor.is_finite() || settings.settle_factor < 0.0 {
        bail!(
            "settle_factor must be a non-negative number, got {}",
            settings.settle_factor
        );
    }
    if settings.request_timeout_ms == 0 {
        bail!("request_timeout_ms must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

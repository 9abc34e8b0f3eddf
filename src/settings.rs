//! Application settings
//!
//! Resolution order: built-in defaults, then `settings.json` in the platform
//! config directory, then `HEMPVERSE_*` environment variables.

use bevy::prelude::*;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Base URL of the backend-as-a-service project
    pub backend_url: String,
    /// Public (anon) API key sent with every backend request
    pub backend_key: String,
    /// Base URL of the serverless payment functions
    pub payments_url: String,
    pub architect_passphrase: Option<String>,
    pub member_email: Option<String>,
    pub member_password: Option<String>,
    pub persist_architect: bool,
    pub autosave_secs: f32,
    pub watch_interval_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:54321".to_string(),
            backend_key: String::new(),
            payments_url: "http://127.0.0.1:8888/.netlify/functions".to_string(),
            architect_passphrase: None,
            member_email: None,
            member_password: None,
            persist_architect: true,
            autosave_secs: 2.0,
            watch_interval_secs: 15,
        }
    }
}

impl AppSettings {
    pub fn load() -> Self {
        let mut settings = Self::default_path()
            .and_then(|path| match Self::from_file(&path) {
                Ok(found) => found,
                Err(err) => {
                    warn!("[INIT] ignoring unreadable {}: {}", path.display(), err);
                    None
                }
            })
            .unwrap_or_default();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    /// Autosave throttle; out-of-range values fall back to the default.
    pub fn autosave_interval(&self) -> Duration {
        match Duration::try_from_secs_f32(self.autosave_secs) {
            Ok(interval) => interval,
            Err(err) => {
                warn!("[INIT] ignoring autosave_secs={}: {}", self.autosave_secs, err);
                Duration::from_secs_f32(Self::default().autosave_secs)
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hempverse").map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Ok(None) when the file does not exist. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Option<Self>, anyhow::Error> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("HEMPVERSE_BACKEND_URL") {
            self.backend_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty("HEMPVERSE_BACKEND_KEY") {
            self.backend_key = v;
        }
        if let Some(v) = non_empty("HEMPVERSE_PAYMENTS_URL") {
            self.payments_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty("HEMPVERSE_ARCHITECT_PASSPHRASE") {
            self.architect_passphrase = Some(v);
        }
        if let Some(v) = non_empty("HEMPVERSE_MEMBER_EMAIL") {
            self.member_email = Some(v);
        }
        if let Some(v) = non_empty("HEMPVERSE_MEMBER_PASSWORD") {
            self.member_password = Some(v);
        }
        if let Some(v) = non_empty("HEMPVERSE_WATCH_INTERVAL_SECS") {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => self.watch_interval_secs = secs,
                _ => warn!("[INIT] ignoring HEMPVERSE_WATCH_INTERVAL_SECS={}", v),
            }
        }
    }
}

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_REDIRECT_KEY;
use crate::config;

pub const SHOW_POPUP: &str = "show-popup";
pub const REDIRECT_KEY: &str = "redirect-key";

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("unknown preference {0:?}")]
    UnknownKey(String),
    #[error("invalid value for preference {key:?}: {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    Checkbox,
    Text,
}

/// Static description of one preference, as shown on the options page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreferenceInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub kind: PreferenceKind,
}

pub const PREFERENCES: &[PreferenceInfo] = &[
    PreferenceInfo {
        key: SHOW_POPUP,
        name: "Show popup when creating a bookmark.",
        description: None,
        kind: PreferenceKind::Checkbox,
    },
    PreferenceInfo {
        key: REDIRECT_KEY,
        name: "Redirect Key:",
        description: Some(
            "The key that is used to trigger the redirect. For example, the default redirect key is \"container\", which appends \"#container-%name%\" to the end of the original URL and makes \"http://www.%name%.container/%original-url%\" the redirect URL.",
        ),
        kind: PreferenceKind::Text,
    },
];

pub fn info(key: &str) -> Option<&'static PreferenceInfo> {
    PREFERENCES.iter().find(|info| info.key == key)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for PreferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceValue::Bool(value) => write!(f, "{value}"),
            PreferenceValue::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_redirect_key")]
    pub redirect_key: String,
    #[serde(default = "default_show_popup")]
    pub show_popup: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            redirect_key: default_redirect_key(),
            show_popup: default_show_popup(),
        }
    }
}

fn default_redirect_key() -> String {
    DEFAULT_REDIRECT_KEY.to_string()
}

fn default_show_popup() -> bool {
    true
}

impl Preferences {
    pub fn get(&self, key: &str) -> Option<PreferenceValue> {
        match key {
            SHOW_POPUP => Some(PreferenceValue::Bool(self.show_popup)),
            REDIRECT_KEY => Some(PreferenceValue::Text(self.redirect_key.clone())),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: PreferenceValue) -> Result<(), PreferenceError> {
        match (key, value) {
            (SHOW_POPUP, PreferenceValue::Bool(value)) => self.show_popup = value,
            (REDIRECT_KEY, PreferenceValue::Text(value)) => {
                let value = value.trim();
                if value.is_empty() {
                    return Err(PreferenceError::InvalidValue {
                        key: key.to_string(),
                        reason: "redirect key must not be empty".into(),
                    });
                }
                self.redirect_key = value.to_string();
            }
            (SHOW_POPUP | REDIRECT_KEY, value) => {
                return Err(PreferenceError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("unexpected value {value}"),
                })
            }
            _ => return Err(PreferenceError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<Preferences>;
    fn save(&self, preferences: &Preferences) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    current: RwLock<Preferences>,
}

impl MemoryPreferences {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            current: RwLock::new(preferences),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> Result<Preferences> {
        Ok(self.current.read().clone())
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        *self.current.write() = preferences.clone();
        Ok(())
    }
}

/// Preferences backed by the YAML config file. Every load re-reads the file
/// and the environment.
#[derive(Debug, Clone, Default)]
pub struct FilePreferences {
    options: config::LoadOptions,
}

impl FilePreferences {
    pub fn new(options: config::LoadOptions) -> Self {
        Self { options }
    }
}

impl PreferenceStore for FilePreferences {
    fn load(&self) -> Result<Preferences> {
        let cfg = config::load(self.options.clone()).context("preferences: load config")?;
        Ok(cfg.preferences)
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        let path: Option<PathBuf> = self.options.config_file.clone();
        config::save_preferences(path, preferences).context("preferences: save config")?;
        Ok(())
    }
}

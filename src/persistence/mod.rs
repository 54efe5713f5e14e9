//! # Persistence Module
//!
//! Read-only access to the user's settings file and the typed settings built
//! from it once per session.
//!
//! ## Key Abstractions
//! - **[`SettingsProvider`]**: `(section, key) → value` lookup with typed,
//!   fallback-taking helpers. Missing or malformed entries never fail; they log
//!   and yield the fallback.
//! - **[`TomlSettings`]**: provider over a TOML file with `[AxisMapping]`,
//!   `[KeyMapping]`, `[TrialSettings]`, `[Settings]` and `[Controller]` tables.
//! - **[`MemorySettings`]**: in-memory provider for tests and embedding.
//! - **[`SessionSettings`]**: the typed struct the rest of the crate consumes.
//!
//! ## Error Handling Strategy
//! Only reading and parsing the file itself can fail ([`SettingsError`]). The
//! application boundary turns those into `color_eyre` reports; everything past
//! parsing degrades to documented defaults.

pub mod session_settings;
pub mod toml_settings;

pub use session_settings::{HudSettings, SessionSettings};
pub use toml_settings::{default_config_path, TomlSettings};

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

pub const SECTION_AXIS_MAPPING: &str = "AxisMapping";
pub const SECTION_KEY_MAPPING: &str = "KeyMapping";
pub const SECTION_TRIAL: &str = "TrialSettings";
pub const SECTION_SETTINGS: &str = "Settings";
pub const SECTION_CONTROLLER: &str = "Controller";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Raw value of one settings entry
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Str(String),
    Float(f64),
    Integer(i64),
    Bool(bool),
}

impl SettingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(v) => Some(*v),
            SettingValue::Integer(v) => Some(*v as f64),
            SettingValue::Str(s) => s.trim().parse().ok(),
            SettingValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            SettingValue::Str(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            SettingValue::Integer(v) => Some(*v != 0),
            SettingValue::Float(_) => None,
        }
    }

    /// Non-negative integral value usable as an axis or button index
    pub fn as_index(&self) -> Option<usize> {
        match self {
            SettingValue::Integer(v) => usize::try_from(*v).ok(),
            SettingValue::Float(v) if v.fract() == 0.0 && *v >= 0.0 => Some(*v as usize),
            SettingValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Str(v) => write!(f, "{}", v),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Integer(v) => write!(f, "{}", v),
            SettingValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Str(value.to_string())
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

/// Read-only settings lookup
pub trait SettingsProvider {
    fn get(&self, section: &str, key: &str) -> Option<SettingValue>;

    /// Keys present in a section, in no particular order
    fn keys(&self, section: &str) -> Vec<String>;

    fn get_f64(&self, section: &str, key: &str, fallback: f64) -> f64 {
        match self.get(section, key) {
            None => fallback,
            Some(value) => value.as_f64().filter(|v| v.is_finite()).unwrap_or_else(|| {
                warn!("{}.{} = {} is not a number, using {}", section, key, value, fallback);
                fallback
            }),
        }
    }

    fn get_bool(&self, section: &str, key: &str, fallback: bool) -> bool {
        match self.get(section, key) {
            None => fallback,
            Some(value) => value.as_bool().unwrap_or_else(|| {
                warn!("{}.{} = {} is not a boolean, using {}", section, key, value, fallback);
                fallback
            }),
        }
    }

    fn get_string(&self, section: &str, key: &str, fallback: &str) -> String {
        match self.get(section, key) {
            None => fallback.to_string(),
            Some(value) => value.to_string(),
        }
    }
}

/// Settings held in memory, keyed by `(section, key)`
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<(String, String), SettingValue>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        section: &str,
        key: &str,
        value: impl Into<SettingValue>,
    ) -> &mut Self {
        self.values
            .insert((section.to_string(), key.to_string()), value.into());
        self
    }
}

impl SettingsProvider for MemorySettings {
    fn get(&self, section: &str, key: &str) -> Option<SettingValue> {
        self.values
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }

    fn keys(&self, section: &str) -> Vec<String> {
        self.values
            .keys()
            .filter(|(s, _)| s == section)
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_helpers_fall_back() {
        let mut settings = MemorySettings::new();
        settings
            .set(SECTION_TRIAL, "speed_limit", "fast")
            .set(SECTION_TRIAL, "location_x", 12_i64)
            .set(SECTION_SETTINGS, "flag", "yes");

        assert_eq!(settings.get_f64(SECTION_TRIAL, "speed_limit", 45.0), 45.0);
        assert_eq!(settings.get_f64(SECTION_TRIAL, "location_x", 0.0), 12.0);
        assert_eq!(settings.get_f64(SECTION_TRIAL, "missing", 1.5), 1.5);
        assert!(settings.get_bool(SECTION_SETTINGS, "flag", false));
        assert_eq!(settings.get_string(SECTION_SETTINGS, "speed_unit", "km/h"), "km/h");
    }

    #[test]
    fn test_index_parsing() {
        assert_eq!(SettingValue::Integer(3).as_index(), Some(3));
        assert_eq!(SettingValue::Integer(-1).as_index(), None);
        assert_eq!(SettingValue::Float(2.0).as_index(), Some(2));
        assert_eq!(SettingValue::Float(2.5).as_index(), None);
        assert_eq!(SettingValue::from(" 4 ").as_index(), Some(4));
        assert_eq!(SettingValue::from("None").as_index(), None);
    }

    #[test]
    fn test_keys_of_section() {
        let mut settings = MemorySettings::new();
        settings
            .set(SECTION_KEY_MAPPING, "key_reverse", "r")
            .set(SECTION_AXIS_MAPPING, "joy_steering", 0_i64);
        assert_eq!(settings.keys(SECTION_KEY_MAPPING), vec!["key_reverse".to_string()]);
    }
}

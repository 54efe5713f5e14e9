//! TOML-backed settings file

use super::{SettingValue, SettingsError, SettingsProvider};
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "simdrive";
const CONFIG_FILE: &str = "user_config.toml";
/// Overrides the settings file location
pub const CONFIG_PATH_ENV: &str = "SIMDRIVE_CONFIG";

/// `$SIMDRIVE_CONFIG`, else `<config dir>/simdrive/user_config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    let mut path = dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    });
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

#[derive(Debug, Clone, Default)]
pub struct TomlSettings {
    table: Table,
}

impl TomlSettings {
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let table: Table = toml::from_str(content)?;
        Ok(Self { table })
    }

    pub fn from_table(table: Table) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Reads the file; a missing file gives an empty provider
    pub async fn load(path: &Path) -> Result<Self, SettingsError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if !exists {
            info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let settings = Self::parse(&content)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Like [`TomlSettings::load`], but an unreadable or malformed file is
    /// logged and replaced by an empty provider
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings from {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Writes `table` to `path` unless a file already exists there
    ///
    /// Returns whether a file was written.
    pub async fn ensure_file(path: &Path, table: &Table) -> Result<bool, SettingsError> {
        let write_error = |source: std::io::Error| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };

        if tokio::fs::try_exists(path).await.map_err(write_error)? {
            debug!("Settings file {} already present", path.display());
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let content = toml::to_string_pretty(table)?;
        tokio::fs::write(path, content).await.map_err(write_error)?;
        info!("Wrote default settings to {}", path.display());
        Ok(true)
    }
}

impl SettingsProvider for TomlSettings {
    fn get(&self, section: &str, key: &str) -> Option<SettingValue> {
        let value = self.table.get(section)?.as_table()?.get(key)?;
        match value {
            Value::String(s) => Some(SettingValue::Str(s.clone())),
            Value::Integer(i) => Some(SettingValue::Integer(*i)),
            Value::Float(f) => Some(SettingValue::Float(*f)),
            Value::Boolean(b) => Some(SettingValue::Bool(*b)),
            other => {
                warn!("{}.{} has unsupported type {}", section, key, other.type_str());
                None
            }
        }
    }

    fn keys(&self, section: &str) -> Vec<String> {
        self.table
            .get(section)
            .and_then(Value::as_table)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[AxisMapping]
joy_steering = 0
joy_throttle = 2
steering_damping = 0.75

[KeyMapping]
key_reverse = "r"

[TrialSettings]
speed_limit = 30
nested = { a = 1 }
"#;

    #[test]
    fn test_lookup_by_section_and_key() {
        let settings = TomlSettings::parse(SAMPLE).unwrap();
        assert_eq!(
            settings.get("AxisMapping", "joy_throttle"),
            Some(SettingValue::Integer(2))
        );
        assert_eq!(settings.get_f64("AxisMapping", "steering_damping", 0.5), 0.75);
        assert_eq!(settings.get_f64("TrialSettings", "speed_limit", 45.0), 30.0);
        assert_eq!(settings.get_string("KeyMapping", "key_reverse", "q"), "r");
        assert_eq!(settings.get("TrialSettings", "nested"), None);
        assert_eq!(settings.get("Missing", "key"), None);
        assert_eq!(settings.keys("KeyMapping"), vec!["key_reverse".to_string()]);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(matches!(
            TomlSettings::parse("[AxisMapping\njoy = "),
            Err(SettingsError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let path = std::env::temp_dir().join("simdrive-missing-settings-file.toml");
        let settings = TomlSettings::load(&path).await.unwrap();
        assert!(settings.table().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("simdrive-broken-{}", std::process::id()));
        let path = dir.join("user_config.toml");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(&path, "[AxisMapping\njoy_steering = ").await.unwrap();

        assert!(matches!(
            TomlSettings::load(&path).await,
            Err(SettingsError::Parse(_))
        ));
        let settings = TomlSettings::load_or_default(&path).await;
        assert!(settings.table().is_empty());
        assert_eq!(settings.get_f64("TrialSettings", "speed_limit", 45.0), 45.0);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_ensure_file_writes_once() {
        let dir = std::env::temp_dir().join(format!("simdrive-settings-{}", std::process::id()));
        let path = dir.join("user_config.toml");
        let table = TomlSettings::parse(SAMPLE).unwrap().table().clone();

        assert!(TomlSettings::ensure_file(&path, &table).await.unwrap());
        assert!(!TomlSettings::ensure_file(&path, &Table::new()).await.unwrap());

        let loaded = TomlSettings::load(&path).await.unwrap();
        assert_eq!(loaded.get_f64("AxisMapping", "steering_damping", 0.0), 0.75);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::APIError;
use crate::settings::{AdditionalConfig, ConfigValue, SettingRecord};
use crate::utils::{
    DEFAULT_USER_ID, LEGACY_DATA_DIR, LEGACY_IMPORT_MARKER_FNAME, LEGACY_SETTINGS_FNAME, LOGS_DIR,
};

/// A row of the flat JSON file the dashboard used before the database store.
#[derive(Debug, Deserialize)]
pub(crate) struct LegacySetting {
    #[serde(default = "default_user_id")]
    pub(crate) user_id: String,
    pub(crate) service_name: String,
    #[serde(default)]
    pub(crate) api_key: Option<String>,
    #[serde(default)]
    pub(crate) additional_config: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub(crate) created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

impl LegacySetting {
    /// Keeps string and boolean entries; numbers become text, anything else is dropped.
    pub(crate) fn config(&self) -> AdditionalConfig {
        let mut config = AdditionalConfig::new();
        let Some(raw) = &self.additional_config else {
            return config;
        };
        for (key, value) in raw {
            let value = match value {
                serde_json::Value::Bool(b) => ConfigValue::Flag(*b),
                serde_json::Value::String(s) => ConfigValue::Text(s.clone()),
                serde_json::Value::Number(n) => ConfigValue::Text(n.to_string()),
                other => {
                    tracing::warn!(
                        "Dropping unsupported additional_config value for {}.{}: {}",
                        self.service_name,
                        key,
                        other
                    );
                    continue;
                }
            };
            config.insert(key.clone(), value);
        }
        config
    }
}

pub(crate) fn logs_dir(storage_dir: &Path) -> Result<PathBuf, APIError> {
    let logs_path = storage_dir.join(LOGS_DIR);
    fs::create_dir_all(&logs_path)?;
    Ok(logs_path)
}

pub(crate) fn legacy_settings_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join(LEGACY_DATA_DIR).join(LEGACY_SETTINGS_FNAME)
}

pub(crate) fn legacy_import_marker_path(storage_dir: &Path) -> PathBuf {
    storage_dir
        .join(LEGACY_DATA_DIR)
        .join(LEGACY_IMPORT_MARKER_FNAME)
}

/// Reads the legacy settings file. Unreadable or malformed content yields
/// `None`; the file itself is never modified here.
pub(crate) fn read_legacy_settings(path: &Path) -> Option<Vec<LegacySetting>> {
    match File::open(path) {
        Ok(file) => match serde_json::from_reader(BufReader::new(file)) {
            Ok(settings) => return Some(settings),
            Err(e) => tracing::warn!("Ignoring malformed {}: {}", path.display(), e),
        },
        Err(e) => tracing::warn!("Unable to open {}: {}", path.display(), e),
    }
    None
}

pub(crate) fn write_import_marker(path: &Path) -> Result<(), APIError> {
    fs::write(path, Utc::now().to_rfc3339())?;
    Ok(())
}

/// Rewrites the legacy settings file with `records`, creating `data/` if needed.
///
/// Content goes to a uniquely named temp file in the same directory first and
/// is then renamed over `path`, so readers only ever see a complete file.
pub(crate) fn write_legacy_settings(path: &Path, records: &[SettingRecord]) -> Result<(), APIError> {
    let dir = path
        .parent()
        .ok_or_else(|| APIError::Unexpected(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| APIError::Unexpected(format!("Failed to serialize settings: {e}")))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path).map_err(|e| APIError::IO(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_file_written_by_the_dashboard() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(LEGACY_SETTINGS_FNAME);
        fs::write(
            &path,
            r#"[
  {
    "id": 1718000000000,
    "user_id": "default_user",
    "service_name": "Ayrshare",
    "api_key": "ABCD1234-ABCD1234-ABCD1234-ABCD1234",
    "additional_config": {"profileKey": "main", "autoShorten": true, "retries": 3, "tags": []},
    "created_at": "2024-06-10T08:00:00.000Z",
    "updated_at": "2024-06-11T09:30:00.000Z"
  },
  {"service_name": "Instagram"}
]"#,
        )
        .unwrap();

        let settings = read_legacy_settings(&path).unwrap();
        assert_eq!(settings.len(), 2);

        let config = settings[0].config();
        assert_eq!(config["profileKey"], ConfigValue::Text("main".to_string()));
        assert_eq!(config["autoShorten"], ConfigValue::Flag(true));
        assert_eq!(config["retries"], ConfigValue::Text("3".to_string()));
        assert!(!config.contains_key("tags"));

        assert_eq!(settings[1].user_id, DEFAULT_USER_ID);
        assert!(settings[1].api_key.is_none());
        assert!(settings[1].config().is_empty());
    }

    #[test]
    fn corrupt_file_reads_as_empty_and_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(LEGACY_SETTINGS_FNAME);
        fs::write(&path, "[{\"service_name\": ").unwrap();

        assert!(read_legacy_settings(&path).is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[{\"service_name\": ");
    }

    #[test]
    fn write_creates_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = legacy_settings_path(temp_dir.path());

        write_legacy_settings(&path, &[]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}

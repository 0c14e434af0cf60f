use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::settings::SettingsStore;

pub(crate) const DEFAULT_USER_ID: &str = "default_user";

pub(crate) const LOGS_DIR: &str = "logs";
pub(crate) const LOG_FILE_NAME: &str = "settings.log";

pub(crate) const SETTINGS_DB_NAME: &str = "settings_db";

pub(crate) const LEGACY_DATA_DIR: &str = "data";
pub(crate) const LEGACY_SETTINGS_FNAME: &str = "settings.json";
pub(crate) const LEGACY_IMPORT_MARKER_FNAME: &str = "settings.json.imported";

pub(crate) const DEFAULT_MAX_CONNECTIONS: u32 = 10;

pub(crate) struct AppState {
    pub(crate) store: Arc<dyn SettingsStore>,
    /// The single implicit owner of every record served by this daemon.
    pub(crate) user_id: String,
    pub(crate) storage_dir: PathBuf,
    pub(crate) database_url_configured: bool,
    pub(crate) mirror_legacy_file: bool,
    /// Serializes rewrites of the legacy settings file.
    pub(crate) mirror_lock: Mutex<()>,
}

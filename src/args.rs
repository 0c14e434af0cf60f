use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::{DEFAULT_MAX_CONNECTIONS, DEFAULT_USER_ID, SETTINGS_DB_NAME};

/// Settings store daemon for the marketing dashboard
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path for the storage directory (SQLite database, logs, legacy settings file)
    #[arg(env = "SETTINGS_STORAGE_DIR")]
    storage_directory_path: PathBuf,

    /// Listening port of the daemon
    #[arg(long, env = "SETTINGS_PORT", default_value_t = 3001)]
    daemon_listening_port: u16,

    /// Database URL (sqlite:// or postgres://), defaults to a SQLite file in the storage directory
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Owner of every stored setting
    #[arg(long, env = "SETTINGS_USER_ID", default_value = DEFAULT_USER_ID)]
    user_id: String,

    /// How long a read setting is served from memory
    #[arg(long, env = "SETTINGS_CACHE_TTL", default_value = "5m", value_parser = humantime::parse_duration)]
    cache_ttl: Duration,

    /// Maximum number of pooled database connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: u32,

    /// Do not import data/settings.json on startup
    #[arg(long)]
    disable_legacy_import: bool,

    /// Rewrite data/settings.json after every successful write
    #[arg(long)]
    mirror_legacy_file: bool,
}

#[derive(Debug)]
pub(crate) struct UserArgs {
    pub(crate) storage_dir_path: PathBuf,
    pub(crate) daemon_listening_port: u16,
    pub(crate) database_url: String,
    pub(crate) database_url_configured: bool,
    pub(crate) user_id: String,
    pub(crate) cache_ttl: Duration,
    pub(crate) max_connections: u32,
    pub(crate) import_legacy_file: bool,
    pub(crate) mirror_legacy_file: bool,
}

pub(crate) fn parse_startup_args() -> Result<UserArgs> {
    resolve(Args::parse())
}

fn resolve(args: Args) -> Result<UserArgs> {
    if args.user_id.trim().is_empty() {
        bail!("user id must not be empty");
    }
    if args.max_connections == 0 {
        bail!("max connections must be at least 1");
    }

    let storage_dir_path = args.storage_directory_path;
    fs::create_dir_all(&storage_dir_path).with_context(|| {
        format!(
            "failed to create storage directory {}",
            storage_dir_path.display()
        )
    })?;

    let database_url_configured = args.database_url.is_some();
    let database_url = args.database_url.unwrap_or_else(|| {
        format!(
            "sqlite://{}?mode=rwc",
            storage_dir_path.join(SETTINGS_DB_NAME).display()
        )
    });

    Ok(UserArgs {
        storage_dir_path,
        daemon_listening_port: args.daemon_listening_port,
        database_url,
        database_url_configured,
        user_id: args.user_id,
        cache_ttl: args.cache_ttl,
        max_connections: args.max_connections,
        import_legacy_file: !args.disable_legacy_import,
        mirror_legacy_file: args.mirror_legacy_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(extra: &[&str], storage: &TempDir) -> Result<UserArgs> {
        let mut argv = vec!["dashboard-settings", storage.path().to_str().unwrap()];
        argv.extend_from_slice(extra);
        resolve(Args::try_parse_from(argv)?)
    }

    #[test]
    fn defaults_to_sqlite_in_storage_dir() {
        let storage = TempDir::new().unwrap();
        let args = resolve(Args {
            storage_directory_path: storage.path().join("nested"),
            daemon_listening_port: 3001,
            database_url: None,
            user_id: DEFAULT_USER_ID.to_string(),
            cache_ttl: Duration::from_secs(300),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            disable_legacy_import: false,
            mirror_legacy_file: false,
        })
        .unwrap();
        assert!(args.storage_dir_path.is_dir());
        assert!(!args.database_url_configured);
        assert!(args.database_url.starts_with("sqlite://"));
        assert!(args.database_url.ends_with("settings_db?mode=rwc"));
        assert!(args.import_legacy_file);
    }

    #[test]
    fn flags_override_defaults() {
        let storage = TempDir::new().unwrap();
        let args = parse(
            &[
                "--daemon-listening-port",
                "4000",
                "--database-url",
                "postgres://localhost/dashboard",
                "--cache-ttl",
                "30s",
                "--disable-legacy-import",
                "--mirror-legacy-file",
            ],
            &storage,
        )
        .unwrap();
        assert_eq!(args.daemon_listening_port, 4000);
        assert!(args.database_url_configured);
        assert_eq!(args.database_url, "postgres://localhost/dashboard");
        assert_eq!(args.cache_ttl, Duration::from_secs(30));
        assert_eq!(args.user_id, DEFAULT_USER_ID);
        assert!(!args.import_legacy_file);
        assert!(args.mirror_legacy_file);
    }

    #[test]
    fn rejects_blank_user() {
        let storage = TempDir::new().unwrap();
        assert!(parse(&["--user-id", " "], &storage).is_err());
    }
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::cache::DEFAULT_CACHE_TTL;
use crate::database::DatabaseManager;
use crate::routes;
use crate::settings::SettingsStore;
use crate::utils::{AppState, DEFAULT_USER_ID};


const TEST_DB_NAME: &str = "test.db";

async fn new_db_manager(temp_dir: &TempDir) -> DatabaseManager {
    new_db_manager_with_ttl(temp_dir, DEFAULT_CACHE_TTL).await
}

async fn new_db_manager_with_ttl(temp_dir: &TempDir, cache_ttl: Duration) -> DatabaseManager {
    let db_path = temp_dir.path().join(TEST_DB_NAME);
    DatabaseManager::new(&db_path, cache_ttl).await.unwrap()
}

fn app_state(temp_dir: &TempDir, store: Arc<dyn SettingsStore>, mirror_legacy_file: bool) -> AppState {
    AppState {
        store,
        user_id: DEFAULT_USER_ID.to_string(),
        storage_dir: temp_dir.path().to_path_buf(),
        database_url_configured: false,
        mirror_legacy_file,
        mirror_lock: Default::default(),
    }
}

/// Serves the router on an ephemeral port and returns its base URL.
async fn spawn_app(state: AppState) -> String {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let router = routes::app(Arc::new(state));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::settings::SettingRecord;

pub(crate) const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

struct CachedSetting {
    record: SettingRecord,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    // Bumped by every `clear`; a read only populates the map if no write
    // happened since it captured the generation.
    generation: u64,
    entries: HashMap<(String, String), CachedSetting>,
}

/// Memo of recently read settings keyed by (user, service).
///
/// Entries expire after `ttl`; any write to the store clears the whole map.
pub(crate) struct CredentialCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl CredentialCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub(crate) async fn get(&self, user_id: &str, service_name: &str) -> Option<SettingRecord> {
        let mut state = self.state.lock().await;
        let key = (user_id.to_string(), service_name.to_string());
        match state.entries.get(&key) {
            Some(cached) if cached.fetched_at.elapsed() < self.ttl => Some(cached.record.clone()),
            Some(_) => {
                state.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Generation to pass to [`CredentialCache::insert`]; capture it before
    /// reading from storage.
    pub(crate) async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Caches `record` unless the cache was cleared after `generation` was taken.
    pub(crate) async fn insert(&self, record: &SettingRecord, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        state.entries.insert(
            (record.user_id.clone(), record.service_name.clone()),
            CachedSetting {
                record: record.clone(),
                fetched_at: Instant::now(),
            },
        );
    }

    pub(crate) async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.generation = state.generation.wrapping_add(1);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

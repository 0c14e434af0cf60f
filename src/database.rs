use crate::cache::CredentialCache;
use crate::disk::{
    legacy_import_marker_path, legacy_settings_path, read_legacy_settings, write_import_marker,
};
use crate::entities::{prelude::*, user_settings};
use crate::error::APIError;
use crate::settings::{SettingInput, SettingRecord, SettingsStore};
use crate::utils::DEFAULT_MAX_CONNECTIONS;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migration::MigratorTrait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, DeleteResult, EntityTrait, QueryFilter,
};
use std::path::Path;
use std::time::Duration;

pub struct DatabaseManager {
    db: DatabaseConnection,
    // Reads are served from here for up to the TTL; writes clear it
    cache: CredentialCache,
}

impl DatabaseManager {
    /// Opens (creating if needed) a SQLite database file.
    pub async fn new(db_path: &Path, cache_ttl: Duration) -> Result<Self, APIError> {
        tracing::info!("Initializing database at path: {}", db_path.display());
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        Self::connect(&db_url, DEFAULT_MAX_CONNECTIONS, cache_ttl).await
    }

    /// Connects to any supported backend URL (`sqlite://` or `postgres://`) and
    /// brings its schema up to date.
    pub async fn connect(
        db_url: &str,
        max_connections: u32,
        cache_ttl: Duration,
    ) -> Result<Self, APIError> {
        // The serving pool is opened only once the schema is current, so none of
        // its connections predates the unique index the upsert relies on.
        Self::run_migrations(db_url).await?;

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .connect_timeout(Duration::from_secs(30))
            .sqlx_logging(false);
        let db = Database::connect(opt).await?;
        tracing::info!(
            "Database connected successfully ({:?} backend)",
            db.get_database_backend()
        );

        Ok(Self {
            db,
            cache: CredentialCache::new(cache_ttl),
        })
    }

    async fn run_migrations(db_url: &str) -> Result<(), APIError> {
        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(30))
            .sqlx_logging(false);
        let db = Database::connect(opt).await?;

        tracing::info!("Running migrations");
        migration::Migrator::up(&db, None).await?;
        db.close().await?;
        tracing::info!("Migrations completed");
        Ok(())
    }

    async fn find_model(
        &self,
        user_id: &str,
        service_name: &str,
    ) -> Result<Option<user_settings::Model>, APIError> {
        Ok(UserSettings::find()
            .filter(user_settings::Column::UserId.eq(user_id))
            .filter(user_settings::Column::ServiceName.eq(service_name))
            .one(&self.db)
            .await?)
    }

    fn new_active_model(
        user_id: &str,
        input: SettingInput,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<user_settings::ActiveModel, APIError> {
        let additional_config = serde_json::to_string(&input.additional_config.unwrap_or_default())
            .map_err(|e| APIError::Unexpected(format!("Failed to encode additional_config: {e}")))?;

        Ok(user_settings::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id.to_string()),
            service_name: ActiveValue::Set(input.service_name),
            api_key: ActiveValue::Set(input.api_key.unwrap_or_default()),
            additional_config: ActiveValue::Set(additional_config),
            created_at: ActiveValue::Set(created_at),
            updated_at: ActiveValue::Set(updated_at),
        })
    }

    fn natural_key() -> OnConflict {
        OnConflict::columns([
            user_settings::Column::UserId,
            user_settings::Column::ServiceName,
        ])
    }

    /// Inserts or overwrites the record for (`user_id`, `input.service_name`).
    ///
    /// The write is a single `INSERT .. ON CONFLICT DO UPDATE` against the
    /// unique (user_id, service_name) index, so concurrent callers can never
    /// create a second row; the last writer's values win. `created_at` is only
    /// set when a new row is inserted.
    async fn upsert_now(&self, user_id: &str, input: SettingInput) -> Result<SettingRecord, APIError> {
        let service_name = input.service_name.clone();
        let now = Utc::now();
        let new_setting = Self::new_active_model(user_id, input, now, now)?;

        UserSettings::insert(new_setting)
            .on_conflict(
                Self::natural_key()
                    .update_columns([
                        user_settings::Column::ApiKey,
                        user_settings::Column::AdditionalConfig,
                        user_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        self.cache.clear().await;

        let model = self
            .find_model(user_id, &service_name)
            .await?
            .ok_or_else(|| {
                APIError::StorageUnavailable(format!(
                    "setting '{service_name}' missing right after upsert"
                ))
            })?;
        model.try_into()
    }

    /// Inserts the record only when its key is not stored yet. Returns whether a
    /// row was written.
    async fn insert_if_absent(
        &self,
        user_id: &str,
        input: SettingInput,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, APIError> {
        let new_setting = Self::new_active_model(user_id, input, created_at, updated_at)?;
        let inserted = UserSettings::insert(new_setting)
            .on_conflict(Self::natural_key().do_nothing().to_owned())
            .exec_without_returning(&self.db)
            .await?;
        if inserted > 0 {
            self.cache.clear().await;
        }
        Ok(inserted > 0)
    }

    /// Imports the flat `data/settings.json` file the dashboard used to keep.
    ///
    /// The import happens once per storage directory: a marker file next to the
    /// legacy file records it, so later startups leave the database alone and
    /// deleted records stay deleted. Entries whose (user, service) key is already
    /// stored are skipped, the stored record wins. Original timestamps are kept.
    /// A missing file is a no-op, a corrupt one is skipped with a warning and
    /// retried on the next start. The legacy file itself is left in place.
    pub async fn migrate_settings_from_file(&self, storage_dir: &Path) -> Result<usize, APIError> {
        let legacy_path = legacy_settings_path(storage_dir);

        if !legacy_path.exists() {
            tracing::info!("No existing settings file found, skipping migration");
            return Ok(0);
        }

        let marker_path = legacy_import_marker_path(storage_dir);
        if marker_path.exists() {
            tracing::info!(
                "Settings file already imported (marker {}), skipping migration",
                marker_path.display()
            );
            return Ok(0);
        }

        tracing::info!("Found existing settings file, migrating to database");

        let Some(legacy_settings) = read_legacy_settings(&legacy_path) else {
            return Ok(0);
        };

        let mut migrated = 0;
        for legacy in legacy_settings {
            if legacy.service_name.is_empty() {
                tracing::warn!("Skipping legacy setting without a service name");
                continue;
            }
            let now = Utc::now();
            let created_at = legacy.created_at.unwrap_or(now);
            let updated_at = legacy.updated_at.unwrap_or(created_at);
            let input = SettingInput {
                service_name: legacy.service_name.clone(),
                api_key: legacy.api_key.clone(),
                additional_config: Some(legacy.config()),
            };
            if self
                .insert_if_absent(&legacy.user_id, input, created_at, updated_at)
                .await?
            {
                migrated += 1;
            } else {
                tracing::debug!(
                    "Keeping stored setting for {}, legacy entry skipped",
                    legacy.service_name
                );
            }
        }
        write_import_marker(&marker_path)?;

        tracing::info!(
            "Successfully migrated {} settings from file to database",
            migrated
        );

        Ok(migrated)
    }
}

#[async_trait]
impl SettingsStore for DatabaseManager {
    async fn list(&self, user_id: &str) -> Result<Vec<SettingRecord>, APIError> {
        tracing::debug!("Loading settings from database");

        let models = UserSettings::find()
            .filter(user_settings::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?;

        let records = models
            .into_iter()
            .map(SettingRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded {} settings from database", records.len());
        Ok(records)
    }

    async fn get(
        &self,
        user_id: &str,
        service_name: &str,
    ) -> Result<Option<SettingRecord>, APIError> {
        tracing::debug!("Loading setting from cache/database: {}", service_name);

        if let Some(cached) = self.cache.get(user_id, service_name).await {
            return Ok(Some(cached));
        }
        let generation = self.cache.generation().await;

        let record = match self.find_model(user_id, service_name).await? {
            Some(model) => SettingRecord::try_from(model)?,
            None => return Ok(None),
        };
        self.cache.insert(&record, generation).await;

        Ok(Some(record))
    }

    async fn upsert(&self, user_id: &str, input: SettingInput) -> Result<SettingRecord, APIError> {
        input.validate()?;
        tracing::info!("Saving setting to database: {}", input.service_name);

        let record = self.upsert_now(user_id, input).await?;

        tracing::info!("Setting saved successfully (id {})", record.id);
        Ok(record)
    }

    async fn delete(&self, user_id: &str, service_name: &str) -> Result<(), APIError> {
        tracing::info!("Deleting setting from database: {}", service_name);

        let result: DeleteResult = UserSettings::delete_many()
            .filter(user_settings::Column::UserId.eq(user_id))
            .filter(user_settings::Column::ServiceName.eq(service_name))
            .exec(&self.db)
            .await?;
        self.cache.clear().await;

        if result.rows_affected > 0 {
            tracing::info!("Setting deleted successfully");
        } else {
            tracing::debug!("No setting found for deletion: {}", service_name);
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<(), APIError> {
        self.db.ping().await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        match self.db.get_database_backend() {
            DbBackend::Sqlite => "sqlite",
            DbBackend::Postgres => "postgres",
            DbBackend::MySql => "mysql",
        }
    }
}

#[cfg(test)]
impl DatabaseManager {
    pub(crate) async fn cached_entries(&self) -> usize {
        self.cache.len().await
    }
}

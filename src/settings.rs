use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::user_settings;
use crate::error::APIError;

/// Service-specific extras stored next to a credential.
pub type AdditionalConfig = BTreeMap<String, ConfigValue>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Flag(bool),
    Text(String),
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Flag(value)
    }
}

/// A stored credential for one external service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingRecord {
    pub id: i32,
    pub user_id: String,
    pub service_name: String,
    pub api_key: String,
    pub additional_config: AdditionalConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettingRecord {
    /// True when the record holds a non-blank key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl TryFrom<user_settings::Model> for SettingRecord {
    type Error = APIError;

    fn try_from(model: user_settings::Model) -> Result<Self, Self::Error> {
        let additional_config = serde_json::from_str(&model.additional_config).map_err(|e| {
            APIError::StorageUnavailable(format!(
                "malformed additional_config for service '{}': {e}",
                model.service_name
            ))
        })?;
        Ok(SettingRecord {
            id: model.id,
            user_id: model.user_id,
            service_name: model.service_name,
            api_key: model.api_key,
            additional_config,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Fields a caller supplies when saving a setting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingInput {
    pub service_name: String,
    pub api_key: Option<String>,
    pub additional_config: Option<AdditionalConfig>,
}

impl SettingInput {
    pub fn new(service_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            api_key: Some(api_key.into()),
            additional_config: None,
        }
    }

    pub fn with_config(mut self, additional_config: AdditionalConfig) -> Self {
        self.additional_config = Some(additional_config);
        self
    }

    /// Checks the input before any storage access.
    pub fn validate(&self) -> Result<(), APIError> {
        if self.service_name.is_empty() {
            return Err(APIError::MissingServiceName);
        }
        Ok(())
    }
}

/// Persistence of [`SettingRecord`]s keyed by (user, service name).
///
/// Implementations must keep at most one record per key; a repeated
/// `upsert` overwrites the key, config and `updated_at` of the existing
/// record and leaves `id` and `created_at` alone.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn list(&self, user_id: &str) -> Result<Vec<SettingRecord>, APIError>;

    /// `Ok(None)` when no record exists for the key.
    async fn get(&self, user_id: &str, service_name: &str)
        -> Result<Option<SettingRecord>, APIError>;

    async fn upsert(&self, user_id: &str, input: SettingInput)
        -> Result<SettingRecord, APIError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, user_id: &str, service_name: &str) -> Result<(), APIError>;

    /// Cheap reachability check of the backing medium.
    async fn health_check(&self) -> Result<(), APIError> {
        Ok(())
    }

    /// Short name of the backing medium, for diagnostics.
    fn backend_name(&self) -> &'static str;

    /// Stored key for a service, `None` when missing or blank.
    async fn api_key(&self, user_id: &str, service_name: &str) -> Result<Option<String>, APIError> {
        Ok(self
            .get(user_id, service_name)
            .await?
            .filter(SettingRecord::is_configured)
            .map(|record| record.api_key))
    }

    async fn is_service_configured(
        &self,
        user_id: &str,
        service_name: &str,
    ) -> Result<bool, APIError> {
        Ok(self.api_key(user_id, service_name).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_keep_their_json_shape() {
        let config: AdditionalConfig =
            serde_json::from_str(r#"{"autoPost":true,"profile":"main"}"#).unwrap();
        assert_eq!(config["autoPost"], ConfigValue::Flag(true));
        assert_eq!(config["profile"], ConfigValue::Text("main".to_string()));
        assert_eq!(
            serde_json::to_string(&config).unwrap(),
            r#"{"autoPost":true,"profile":"main"}"#
        );
    }

    #[test]
    fn empty_service_name_is_rejected() {
        let input = SettingInput::new("", "sk-ant-abc123");
        assert!(matches!(input.validate(), Err(APIError::MissingServiceName)));
        assert!(SettingInput::new("Claude AI", "").validate().is_ok());
    }

    #[test]
    fn malformed_config_column_is_a_storage_error() {
        let model = user_settings::Model {
            id: 1,
            user_id: "default_user".to_string(),
            service_name: "Ayrshare".to_string(),
            api_key: String::new(),
            additional_config: "{not json".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            SettingRecord::try_from(model),
            Err(APIError::StorageUnavailable(_))
        ));
    }
}

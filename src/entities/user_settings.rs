//! `SeaORM` Entity for per-service credential storage.
// One row per (user_id, service_name); the pair is enforced by a unique index
// created in the migration rather than by the primary key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "user_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: String,
    pub service_name: String,
    #[sea_orm(column_type = "Text")]
    pub api_key: String,
    /// JSON object, kept as text so every backend stores it verbatim.
    #[sea_orm(column_type = "Text")]
    pub additional_config: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

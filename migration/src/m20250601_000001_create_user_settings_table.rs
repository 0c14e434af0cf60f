use sea_orm_migration::{prelude::*, schema::*};

const USER_SERVICE_INDEX: &str = "idx_user_settings_user_service";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserSettings::Table)
                    .if_not_exists()
                    .col(pk_auto(UserSettings::Id))
                    .col(string(UserSettings::UserId).default("default_user"))
                    .col(string(UserSettings::ServiceName))
                    .col(text(UserSettings::ApiKey).default(""))
                    .col(text(UserSettings::AdditionalConfig).default("{}"))
                    .col(
                        timestamp_with_time_zone(UserSettings::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(UserSettings::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // upserts rely on this index as their conflict target
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name(USER_SERVICE_INDEX)
                    .table(UserSettings::Table)
                    .col(UserSettings::UserId)
                    .col(UserSettings::ServiceName)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(USER_SERVICE_INDEX)
                    .table(UserSettings::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(UserSettings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserSettings {
    Table,
    Id,
    UserId,
    ServiceName,
    ApiKey,
    AdditionalConfig,
    CreatedAt,
    UpdatedAt,
}

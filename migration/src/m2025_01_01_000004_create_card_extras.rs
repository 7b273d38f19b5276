//! Creates the auxiliary card tables (introductions, products, videos,
//! versions, version logs) and the role permissions table.
//!
//! No request path writes to these yet; card deletion clears them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CardIntroductions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardIntroductions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CardIntroductions::CardId).integer().not_null())
                    .col(
                        ColumnDef::new(CardIntroductions::CompanyName)
                            .string_len(100)
                            .null(),
                    )
                    .col(ColumnDef::new(CardIntroductions::Description).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_introductions_card_id")
                            .from(CardIntroductions::Table, CardIntroductions::CardId)
                            .to(Cards::Table, Cards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CardProducts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardProducts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CardProducts::CardId).integer().not_null())
                    .col(ColumnDef::new(CardProducts::Name).string_len(100).not_null())
                    .col(ColumnDef::new(CardProducts::Description).text().null())
                    .col(ColumnDef::new(CardProducts::Link).string_len(255).null())
                    .col(ColumnDef::new(CardProducts::Image).string_len(255).null())
                    .col(
                        ColumnDef::new(CardProducts::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_products_card_id")
                            .from(CardProducts::Table, CardProducts::CardId)
                            .to(Cards::Table, Cards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CardVideos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardVideos::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CardVideos::CardId).integer().not_null())
                    .col(ColumnDef::new(CardVideos::YoutubeLink).string_len(255).not_null())
                    .col(
                        ColumnDef::new(CardVideos::Autoplay)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CardVideos::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_videos_card_id")
                            .from(CardVideos::Table, CardVideos::CardId)
                            .to(Cards::Table, Cards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CardVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardVersions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CardVersions::CardId).integer().not_null())
                    .col(ColumnDef::new(CardVersions::VersionNumber).integer().not_null())
                    .col(ColumnDef::new(CardVersions::Data).json_binary().not_null())
                    .col(ColumnDef::new(CardVersions::CreatedBy).integer().not_null())
                    .col(
                        ColumnDef::new(CardVersions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_versions_card_id")
                            .from(CardVersions::Table, CardVersions::CardId)
                            .to(Cards::Table, Cards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_versions_created_by")
                            .from(CardVersions::Table, CardVersions::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CardVersionLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardVersionLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CardVersionLogs::CardId).integer().not_null())
                    .col(
                        ColumnDef::new(CardVersionLogs::VersionNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardVersionLogs::Action)
                            .string_len(16)
                            .not_null()
                            .default("rollback"),
                    )
                    .col(
                        ColumnDef::new(CardVersionLogs::PerformedBy)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardVersionLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_version_logs_card_id")
                            .from(CardVersionLogs::Table, CardVersionLogs::CardId)
                            .to(Cards::Table, Cards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_version_logs_performed_by")
                            .from(CardVersionLogs::Table, CardVersionLogs::PerformedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Permissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Permissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Permissions::RoleId).integer().not_null())
                    .col(ColumnDef::new(Permissions::Permission).string_len(100).not_null())
                    .col(ColumnDef::new(Permissions::Resource).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Permissions::Allowed)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_permissions_role_id")
                            .from(Permissions::Table, Permissions::RoleId)
                            .to(Roles::Table, Roles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Permissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CardVersionLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CardVersions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CardVideos::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CardProducts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CardIntroductions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CardIntroductions {
    Table,
    Id,
    CardId,
    CompanyName,
    Description,
}

#[derive(DeriveIden)]
enum CardProducts {
    Table,
    Id,
    CardId,
    Name,
    Description,
    Link,
    Image,
    DisplayOrder,
}

#[derive(DeriveIden)]
enum CardVideos {
    Table,
    Id,
    CardId,
    YoutubeLink,
    Autoplay,
    DisplayOrder,
}

#[derive(DeriveIden)]
enum CardVersions {
    Table,
    Id,
    CardId,
    VersionNumber,
    Data,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CardVersionLogs {
    Table,
    Id,
    CardId,
    VersionNumber,
    Action,
    PerformedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Permissions {
    Table,
    Id,
    RoleId,
    Permission,
    Resource,
    Allowed,
}

#[derive(DeriveIden)]
enum Cards {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Roles {
    Table,
    Id,
}

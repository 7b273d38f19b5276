//! Creates the cards table and its contact and gallery child tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Cards::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Cards::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Cards::UserId).integer().not_null())
                    .col(ColumnDef::new(Cards::CompanyId).integer().null())
                    .col(ColumnDef::new(Cards::Name).string_len(50).not_null())
                    .col(ColumnDef::new(Cards::Title).string_len(100).null())
                    .col(ColumnDef::new(Cards::Nickname).string_len(50).null())
                    .col(ColumnDef::new(Cards::Department).string_len(100).null())
                    .col(ColumnDef::new(Cards::Avatar).string_len(255).null())
                    .col(ColumnDef::new(Cards::Background).string_len(255).null())
                    .col(ColumnDef::new(Cards::ColorScheme).json_binary().null())
                    .col(ColumnDef::new(Cards::Logo).string_len(255).null())
                    .col(ColumnDef::new(Cards::QrCode).string_len(255).null())
                    .col(ColumnDef::new(Cards::CustomFields).json_binary().null())
                    .col(
                        ColumnDef::new(Cards::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Cards::MaxVersion)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Cards::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Cards::ViewCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Cards::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Cards::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cards_user_id")
                            .from(Cards::Table, Cards::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cards_company_id")
                            .from(Cards::Table, Cards::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cards_user_id")
                    .table(Cards::Table)
                    .col(Cards::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cards_company_id")
                    .table(Cards::Table)
                    .col(Cards::CompanyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CardContacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardContacts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CardContacts::CardId).integer().not_null())
                    .col(ColumnDef::new(CardContacts::Type).string_len(16).not_null())
                    .col(ColumnDef::new(CardContacts::Value).string_len(255).not_null())
                    .col(
                        ColumnDef::new(CardContacts::IsPrimary)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_contacts_card_id")
                            .from(CardContacts::Table, CardContacts::CardId)
                            .to(Cards::Table, Cards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_card_contacts_card_id")
                    .table(CardContacts::Table)
                    .col(CardContacts::CardId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CardImages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardImages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CardImages::CardId).integer().not_null())
                    .col(ColumnDef::new(CardImages::ImageUrl).string_len(255).not_null())
                    .col(
                        ColumnDef::new(CardImages::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_images_card_id")
                            .from(CardImages::Table, CardImages::CardId)
                            .to(Cards::Table, Cards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_card_images_card_id")
                    .table(CardImages::Table)
                    .col(CardImages::CardId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CardImages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CardContacts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cards::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Cards {
    Table,
    Id,
    UserId,
    CompanyId,
    Name,
    Title,
    Nickname,
    Department,
    Avatar,
    Background,
    ColorScheme,
    Logo,
    QrCode,
    CustomFields,
    IsPrivate,
    MaxVersion,
    Status,
    ViewCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CardContacts {
    Table,
    Id,
    CardId,
    Type,
    Value,
    IsPrimary,
}

#[derive(DeriveIden)]
enum CardImages {
    Table,
    Id,
    CardId,
    ImageUrl,
    DisplayOrder,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
}

//! Card entity model.
//!
//! A card is a digital business-card profile owned by a user and optionally
//! attached to a company. Contacts and gallery images live in child tables and
//! are replaced wholesale when a card update supplies them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cards")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Owning user
    pub user_id: i32,

    pub company_id: Option<i32>,

    pub name: String,
    pub title: Option<String>,
    pub nickname: Option<String>,
    pub department: Option<String>,

    pub avatar: Option<String>,
    pub background: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub color_scheme: Option<JsonValue>,

    pub logo: Option<String>,
    pub qr_code: Option<String>,

    /// Free-form key/value pairs rendered on the card
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub custom_fields: Option<JsonValue>,

    pub is_private: bool,

    /// Highest version number recorded for this card
    pub max_version: i32,

    pub status: CardStatus,
    pub view_count: i32,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
    #[sea_orm(has_many = "super::card_contact::Entity")]
    Contacts,
    #[sea_orm(has_many = "super::card_image::Entity")]
    Images,
    #[sea_orm(has_many = "super::card_introduction::Entity")]
    Introductions,
    #[sea_orm(has_many = "super::card_product::Entity")]
    Products,
    #[sea_orm(has_many = "super::card_video::Entity")]
    Videos,
    #[sea_orm(has_many = "super::card_version::Entity")]
    Versions,
    #[sea_orm(has_many = "super::card_version_log::Entity")]
    VersionLogs,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::card_contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contacts.def()
    }
}

impl Related<super::card_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::card_introduction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Introductions.def()
    }
}

impl Related<super::card_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::card_video::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Videos.def()
    }
}

impl Related<super::card_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Versions.def()
    }
}

impl Related<super::card_version_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VersionLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

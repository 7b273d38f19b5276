//! Company entity model.
//!
//! A company groups users and cards. Names are unique across the table.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Display name, unique across companies
    #[sea_orm(unique)]
    pub name: String,

    /// Logo URL
    pub logo: Option<String>,

    pub description: Option<String>,

    /// Brand colours as `{ "primary": ..., "secondary": ... }`
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub color_scheme: Option<JsonValue>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    Users,
    #[sea_orm(has_many = "super::card::Entity")]
    Cards,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cards.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Database migrations for the NFC cards API.
//!
//! Applied at startup by the server and by the `migrate` subcommand.

pub use sea_orm_migration::prelude::*;

mod m2025_01_01_000001_create_companies;
mod m2025_01_01_000002_create_users_and_roles;
mod m2025_01_01_000003_create_cards;
mod m2025_01_01_000004_create_card_extras;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_01_000001_create_companies::Migration),
            Box::new(m2025_01_01_000002_create_users_and_roles::Migration),
            Box::new(m2025_01_01_000003_create_cards::Migration),
            Box::new(m2025_01_01_000004_create_card_extras::Migration),
        ]
    }
}

//! Role seeding functionality
//!
//! Ensures every [`RoleName`] has a row in the `roles` table.

use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Iterable, Set};

use crate::models::{RoleName, role};
use crate::repositories::RoleRepository;

/// Inserts the roles that are missing. Returns the names that were created.
pub async fn seed_roles(db: &DatabaseConnection) -> Result<Vec<RoleName>> {
    let repo = RoleRepository::new(db);
    let mut created = Vec::new();

    for name in RoleName::iter() {
        if repo.find_by_name(name).await?.is_some() {
            log::debug!("Role '{}' already exists, skipping", name);
            continue;
        }

        role::ActiveModel {
            name: Set(name),
            description: Set(Some(name.description().to_string())),
            ..Default::default()
        }
        .insert(db)
        .await
        .with_context(|| format!("Failed to seed role '{name}'"))?;

        log::info!("Created role: {}", name);
        created.push(name);
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    #[tokio::test]
    async fn test_seed_roles_is_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let first = seed_roles(&db).await.unwrap();
        assert_eq!(first.len(), 4);

        let second = seed_roles(&db).await.unwrap();
        assert!(second.is_empty());

        let admin = RoleRepository::new(&db)
            .find_by_name(RoleName::Admin)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.description.as_deref(), Some(RoleName::Admin.description()));
    }

    #[tokio::test]
    async fn test_permissions_hang_off_seeded_roles() {
        use crate::models::permission;
        use sea_orm::ModelTrait;

        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        seed_roles(&db).await.unwrap();

        let manager = RoleRepository::new(&db)
            .find_by_name(RoleName::Manager)
            .await
            .unwrap()
            .unwrap();
        permission::ActiveModel {
            role_id: Set(manager.id),
            permission: Set("read".to_string()),
            resource: Set("users".to_string()),
            allowed: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let granted = manager
            .find_related(permission::Entity)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].resource, "users");
    }
}

//! # Role Repository
//!
//! Role lookups and user/role assignments.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, LoaderTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, sea_query::JoinType,
};

use crate::error::RepositoryError;
use crate::models::{role, user, user_role, RoleName};

/// Repository for Role database operations
pub struct RoleRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> RoleRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_name(&self, name: RoleName) -> Result<Option<role::Model>, RepositoryError> {
        find_by_name(self.db, name).await
    }

    /// Role names held by a single user, in role id order.
    pub async fn role_names_for_user(&self, user_id: i32) -> Result<Vec<RoleName>, RepositoryError> {
        let roles = role::Entity::find()
            .join(JoinType::InnerJoin, role::Relation::UserRoles.def())
            .filter(user_role::Column::UserId.eq(user_id))
            .order_by_asc(role::Column::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(roles.into_iter().map(|role| role.name).collect())
    }

    /// Role names for each of `users`, index-aligned, in a single round trip.
    pub async fn role_names_for_users(
        &self,
        users: &[user::Model],
    ) -> Result<Vec<Vec<RoleName>>, RepositoryError> {
        let roles = users
            .load_many_to_many(role::Entity, user_role::Entity, self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(roles
            .into_iter()
            .map(|mut roles| {
                roles.sort_by_key(|role| role.id);
                roles.into_iter().map(|role| role.name).collect()
            })
            .collect())
    }
}

pub(crate) async fn find_by_name<C: ConnectionTrait>(
    db: &C,
    name: RoleName,
) -> Result<Option<role::Model>, RepositoryError> {
    role::Entity::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(RepositoryError::database_error)
}

/// Links `user_id` to each named role that exists. Returns the names assigned.
pub(crate) async fn assign_roles<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    names: &[RoleName],
) -> Result<Vec<RoleName>, RepositoryError> {
    let mut assigned = Vec::with_capacity(names.len());

    for name in names {
        let Some(role) = find_by_name(db, *name).await? else {
            tracing::warn!(role = %name, user_id, "Role not seeded; skipping assignment");
            continue;
        };

        user_role::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(role.id),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(RepositoryError::database_error)?;

        assigned.push(role.name);
    }

    Ok(assigned)
}

//! # User Repository
//!
//! Registration, credential checks and user management. Passwords are hashed
//! with Argon2id before they reach the database and are never returned.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, LoaderTrait,
    PaginatorTrait, QueryFilter, Select, Set, TransactionTrait,
};

use crate::error::{RepositoryError, is_unique_violation};
use crate::models::{RoleName, UserStatus, card, company, user, user_role};
use crate::password::{hash_password_async, verify_password_async};
use crate::query::{self, ListQuery, Page};
use crate::repositories::company::ensure_exists as ensure_company_exists;
use crate::repositories::role::{RoleRepository, assign_roles};
use crate::validation;

const DUPLICATE_EMAIL: &str = "Email already exists";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Columns that can never be filtered or sorted on.
const PRIVATE_COLUMNS: [&str; 3] = ["password", "otp_code", "otp_expiry"];

/// A user together with its company and role names.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user: user::Model,
    pub company: Option<company::Model>,
    pub roles: Vec<RoleName>,
}

/// Request data for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub company_id: Option<i32>,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password: Option<String>,
    pub status: Option<UserStatus>,
    pub company_id: Option<i32>,
}

/// Which users a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserScope {
    All,
    Company(i32),
    /// Users that belong to no company
    Unassigned,
}

fn not_found(id: i32) -> RepositoryError {
    RepositoryError::not_found(format!("User with ID {id} not found"))
}

fn map_insert_error(error: sea_orm::DbErr) -> RepositoryError {
    if is_unique_violation(&error) {
        RepositoryError::conflict(DUPLICATE_EMAIL)
    } else {
        RepositoryError::database_error(error)
    }
}

fn hash_error(error: crate::password::PasswordError) -> RepositoryError {
    RepositoryError::Internal(error.to_string())
}

/// Repository for User database operations
pub struct UserRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, RepositoryError> {
        user::Entity::find_by_id(id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, RepositoryError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Creates an active user holding `roles` (roles that are not seeded are skipped).
    pub async fn create(
        &self,
        request: NewUser,
        roles: &[RoleName],
    ) -> Result<UserProfile, RepositoryError> {
        let email = validation::email(&request.email)?;
        validation::password(&request.password)?;

        let company = match request.company_id {
            Some(company_id) => Some(ensure_company_exists(self.db, company_id).await?),
            None => None,
        };

        if self.find_by_email(&email).await?.is_some() {
            return Err(RepositoryError::conflict(DUPLICATE_EMAIL));
        }

        let password = hash_password_async(request.password)
            .await
            .map_err(hash_error)?;

        let now = Utc::now();
        let txn = self.db.begin().await.map_err(RepositoryError::database_error)?;

        let created = user::ActiveModel {
            company_id: Set(company.as_ref().map(|c| c.id)),
            email: Set(email),
            password: Set(password),
            status: Set(UserStatus::Active),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(map_insert_error)?;

        let roles = assign_roles(&txn, created.id, roles).await?;
        txn.commit().await.map_err(RepositoryError::database_error)?;

        tracing::info!(user_id = created.id, ?roles, "Created user");

        Ok(UserProfile {
            user: created,
            company,
            roles,
        })
    }

    /// Registration always grants the employee role.
    pub async fn register(&self, request: NewUser) -> Result<UserProfile, RepositoryError> {
        self.create(request, &[RoleName::Employee]).await
    }

    /// Checks credentials. The password is verified before the account status
    /// so an inactive account is only revealed to someone who knows it.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, RepositoryError> {
        let user = self
            .find_by_email(email.trim())
            .await?
            .ok_or_else(|| RepositoryError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let matches = verify_password_async(password.to_string(), user.password.clone())
            .await
            .map_err(hash_error)?;
        if !matches {
            return Err(RepositoryError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_active() {
            return Err(RepositoryError::Unauthorized("User is inactive".to_string()));
        }

        self.profile(user).await
    }

    /// Loads the company and roles for `user`.
    pub async fn profile(&self, user: user::Model) -> Result<UserProfile, RepositoryError> {
        let company = match user.company_id {
            Some(company_id) => company::Entity::find_by_id(company_id)
                .one(self.db)
                .await
                .map_err(RepositoryError::database_error)?,
            None => None,
        };
        let roles = RoleRepository::new(self.db)
            .role_names_for_user(user.id)
            .await?;

        Ok(UserProfile {
            user,
            company,
            roles,
        })
    }

    pub async fn get(&self, id: i32) -> Result<UserProfile, RepositoryError> {
        let user = self.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
        self.profile(user).await
    }

    fn scoped(&self, scope: UserScope, query: &ListQuery) -> Result<Select<user::Entity>, RepositoryError> {
        if !query.fields.is_empty() {
            return Err(RepositoryError::validation_error(
                "fields is not supported when listing users",
            ));
        }

        let private = query
            .filters
            .keys()
            .chain(query.sort.iter().map(|key| &key.column))
            .find(|name| PRIVATE_COLUMNS.contains(&name.as_str()));
        if let Some(name) = private {
            return Err(RepositoryError::validation_error(format!("Unknown field '{name}'")));
        }

        let select = match scope {
            UserScope::All => user::Entity::find(),
            UserScope::Company(company_id) => {
                user::Entity::find().filter(user::Column::CompanyId.eq(company_id))
            }
            UserScope::Unassigned => user::Entity::find().filter(user::Column::CompanyId.is_null()),
        };

        let select = query::apply_like_filters(select, &query.filters)?;
        query::apply_sort(select, &query.sort)
    }

    /// Lists users within `scope`, with companies and roles batch-loaded.
    pub async fn list(
        &self,
        scope: UserScope,
        query: &ListQuery,
    ) -> Result<Page<UserProfile>, RepositoryError> {
        let select = self.scoped(scope, query)?;
        let page = query::fetch_page(self.db, select, query)
            .await
            .map_err(RepositoryError::database_error)?;

        let companies = page
            .items
            .load_one(company::Entity, self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        let roles = RoleRepository::new(self.db)
            .role_names_for_users(&page.items)
            .await?;

        let items = page
            .items
            .into_iter()
            .zip(companies)
            .zip(roles)
            .map(|((user, company), roles)| UserProfile {
                user,
                company,
                roles,
            })
            .collect();

        Ok(Page {
            items,
            total: page.total,
        })
    }

    pub async fn update(&self, id: i32, request: UpdateUser) -> Result<UserProfile, RepositoryError> {
        let user = self.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
        let mut active = user.clone().into_active_model();

        if let Some(email) = request.email {
            let email = validation::email(&email)?;
            if email != user.email {
                if self.find_by_email(&email).await?.is_some() {
                    return Err(RepositoryError::conflict(DUPLICATE_EMAIL));
                }
                active.email = Set(email);
            }
        }
        if let Some(password) = request.password {
            validation::password(&password)?;
            active.password = Set(hash_password_async(password).await.map_err(hash_error)?);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        if let Some(company_id) = request.company_id {
            ensure_company_exists(self.db, company_id).await?;
            active.company_id = Set(Some(company_id));
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(self.db).await.map_err(map_insert_error)?;
        tracing::info!(user_id = id, "Updated user");
        self.profile(updated).await
    }

    /// Deletes a user and its role links. Users that still own cards are kept.
    pub async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        self.find_by_id(id).await?.ok_or_else(|| not_found(id))?;

        let owned_cards = card::Entity::find()
            .filter(card::Column::UserId.eq(id))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        if owned_cards > 0 {
            return Err(RepositoryError::conflict(format!(
                "User with ID {id} still owns {owned_cards} card(s)"
            )));
        }

        let txn = self.db.begin().await.map_err(RepositoryError::database_error)?;
        user_role::Entity::delete_many()
            .filter(user_role::Column::UserId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        user::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        txn.commit().await.map_err(RepositoryError::database_error)?;

        tracing::info!(user_id = id, "Deleted user");
        Ok(())
    }
}

//! # Company Repository
//!
//! CRUD for companies. Deleting a company detaches its users and cards
//! (their `company_id` becomes null) in the same transaction.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, Set, TransactionTrait, sea_query::Expr,
};
use serde_json::Value as JsonValue;

use crate::error::{RepositoryError, is_unique_violation};
use crate::models::{card, company, user};
use crate::query::{self, ListQuery, Page};
use crate::validation;

pub const MAX_NAME_LEN: usize = 100;
const DUPLICATE_NAME: &str = "Company already exists";

/// Request data for creating a company
#[derive(Debug, Clone, Default)]
pub struct CreateCompany {
    pub name: String,
    pub logo: Option<String>,
    pub description: Option<String>,
    pub color_scheme: Option<JsonValue>,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateCompany {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub description: Option<String>,
    pub color_scheme: Option<JsonValue>,
}

fn validate_optional(
    logo: Option<&str>,
    color_scheme: Option<&JsonValue>,
) -> Result<(), RepositoryError> {
    if let Some(logo) = logo {
        validation::url("logo", logo)?;
    }
    if let Some(scheme) = color_scheme {
        validation::color_scheme(scheme)?;
    }
    Ok(())
}

pub(crate) fn not_found(id: i32) -> RepositoryError {
    RepositoryError::not_found(format!("Company with ID {id} not found"))
}

/// Used by other resources that reference a company by id.
pub(crate) async fn ensure_exists<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<company::Model, RepositoryError> {
    company::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(RepositoryError::database_error)?
        .ok_or_else(|| RepositoryError::validation_error(format!("Company with id {id} not found")))
}

/// Clears `company_id` on users and cards that belong to any of `ids`.
async fn detach_members<C: ConnectionTrait>(db: &C, ids: &[i32]) -> Result<(), RepositoryError> {
    user::Entity::update_many()
        .col_expr(user::Column::CompanyId, Expr::value(Option::<i32>::None))
        .filter(user::Column::CompanyId.is_in(ids.iter().copied()))
        .exec(db)
        .await
        .map_err(RepositoryError::database_error)?;

    card::Entity::update_many()
        .col_expr(card::Column::CompanyId, Expr::value(Option::<i32>::None))
        .filter(card::Column::CompanyId.is_in(ids.iter().copied()))
        .exec(db)
        .await
        .map_err(RepositoryError::database_error)?;

    Ok(())
}

/// Repository for Company database operations
pub struct CompanyRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> CompanyRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    fn filtered(&self, query: &ListQuery) -> Result<sea_orm::Select<company::Entity>, RepositoryError> {
        let select = query::apply_like_filters(company::Entity::find(), &query.filters)?;
        query::apply_sort(select, &query.sort)
    }

    /// Lists companies matching the query.
    pub async fn list(&self, query: &ListQuery) -> Result<Page<company::Model>, RepositoryError> {
        let select = self.filtered(query)?;
        query::fetch_page(self.db, select, query)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Lists companies, returning only `query.fields` for each row.
    pub async fn list_projected(&self, query: &ListQuery) -> Result<Page<JsonValue>, RepositoryError> {
        let columns = query::projection::<company::Entity>(&query.fields)?;
        let select = self.filtered(query)?;
        query::fetch_projected_page(self.db, select, columns, query)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn get(&self, id: i32) -> Result<company::Model, RepositoryError> {
        company::Entity::find_by_id(id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| not_found(id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<company::Model>, RepositoryError> {
        company::Entity::find()
            .filter(company::Column::Name.eq(name))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create(&self, request: CreateCompany) -> Result<company::Model, RepositoryError> {
        let name = validation::required_text("name", &request.name, MAX_NAME_LEN)?;
        validate_optional(request.logo.as_deref(), request.color_scheme.as_ref())?;

        if self.find_by_name(&name).await?.is_some() {
            return Err(RepositoryError::validation_error(DUPLICATE_NAME));
        }

        let now = Utc::now();
        let company = company::ActiveModel {
            name: Set(name),
            logo: Set(request.logo),
            description: Set(request.description),
            color_scheme: Set(request.color_scheme),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let created = company.insert(self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::validation_error(DUPLICATE_NAME)
            } else {
                RepositoryError::database_error(e)
            }
        })?;

        tracing::info!(company_id = created.id, "Created company");
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i32,
        request: UpdateCompany,
    ) -> Result<company::Model, RepositoryError> {
        let company = self.get(id).await?;
        validate_optional(request.logo.as_deref(), request.color_scheme.as_ref())?;

        let mut active = company.clone().into_active_model();

        if let Some(name) = request.name {
            let name = validation::required_text("name", &name, MAX_NAME_LEN)?;
            if name != company.name {
                if let Some(existing) = self.find_by_name(&name).await?
                    && existing.id != id
                {
                    return Err(RepositoryError::validation_error(format!(
                        "Company with name \"{name}\" already exists"
                    )));
                }
                active.name = Set(name);
            }
        }
        if let Some(logo) = request.logo {
            active.logo = Set(Some(logo));
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(color_scheme) = request.color_scheme {
            active.color_scheme = Set(Some(color_scheme));
        }
        active.updated_at = Set(Utc::now().into());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        self.get(id).await?;

        let txn = self.db.begin().await.map_err(RepositoryError::database_error)?;
        detach_members(&txn, &[id]).await?;
        company::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        txn.commit().await.map_err(RepositoryError::database_error)?;

        tracing::info!(company_id = id, "Deleted company");
        Ok(())
    }

    /// Deletes every company. Returns the number of rows removed.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let txn = self.db.begin().await.map_err(RepositoryError::database_error)?;

        user::Entity::update_many()
            .col_expr(user::Column::CompanyId, Expr::value(Option::<i32>::None))
            .filter(user::Column::CompanyId.is_not_null())
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        card::Entity::update_many()
            .col_expr(card::Column::CompanyId, Expr::value(Option::<i32>::None))
            .filter(card::Column::CompanyId.is_not_null())
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        let result = company::Entity::delete_many()
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        txn.commit().await.map_err(RepositoryError::database_error)?;

        tracing::warn!(deleted = result.rows_affected, "Deleted all companies");
        Ok(result.rows_affected)
    }

    /// Deletes the listed companies. Ids that do not exist are ignored.
    pub async fn delete_by_ids(&self, ids: &[i32]) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Err(RepositoryError::validation_error("ids must not be empty"));
        }
        if ids.iter().any(|id| *id < 1) {
            return Err(RepositoryError::validation_error(
                "ids must be positive integers",
            ));
        }

        let txn = self.db.begin().await.map_err(RepositoryError::database_error)?;
        detach_members(&txn, ids).await?;
        let result = company::Entity::delete_many()
            .filter(company::Column::Id.is_in(ids.iter().copied()))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        txn.commit().await.map_err(RepositoryError::database_error)?;

        tracing::info!(?ids, deleted = result.rows_affected, "Deleted companies by id");
        Ok(result.rows_affected)
    }
}

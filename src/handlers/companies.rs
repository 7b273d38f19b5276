//! # Companies API Handlers
//!
//! Company CRUD plus the bulk delete endpoints, which are reserved for
//! superadmins.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::auth::{AuthUser, require_roles};
use crate::error::ApiError;
use crate::handlers::types::{ApiResponse, IdPath, ListParams, list_response};
use crate::models::{RoleName, company};
use crate::query::ListQuery;
use crate::repositories::{CompanyRepository, CreateCompany, UpdateCompany};
use crate::server::AppState;

/// Company as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompanyDto {
    pub id: i32,
    #[schema(example = "Acme Corp")]
    pub name: String,
    pub logo: Option<String>,
    pub description: Option<String>,
    /// `{ "primary": "#112233", "secondary": "#ffffff" }`
    pub color_scheme: Option<JsonValue>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<FixedOffset>,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<FixedOffset>,
}

impl From<company::Model> for CompanyDto {
    fn from(model: company::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            logo: model.logo,
            description: model.description,
            color_scheme: model.color_scheme,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Request payload for creating a company
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCompanyRequest {
    /// Required, at most 100 characters, unique
    #[schema(example = "Acme Corp")]
    pub name: String,
    /// Logo URL
    pub logo: Option<String>,
    pub description: Option<String>,
    pub color_scheme: Option<JsonValue>,
}

/// Request payload for a partial company update
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub description: Option<String>,
    pub color_scheme: Option<JsonValue>,
}

/// Request payload for `DELETE /companies/delete-by-ids`
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteCompaniesRequest {
    #[schema(example = json!([1, 2, 3]))]
    pub ids: Vec<i32>,
}

/// List companies
#[utoipa::path(
    get,
    path = "/companies",
    security(("bearer_auth" = [])),
    params(ListParams),
    responses(
        (status = 200, description = "Companies matching the filters", body = ApiResponse<Vec<CompanyDto>>),
        (status = 400, description = "Invalid pagination, sort or filter", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "companies"
)]
pub async fn list_companies(
    State(state): State<AppState>,
    _user: AuthUser,
    query: ListQuery,
) -> Result<ApiResponse<Vec<JsonValue>>, ApiError> {
    let repo = CompanyRepository::new(&state.db);

    let page = if query.fields.is_empty() {
        repo.list(&query).await?.map(|model| {
            serde_json::to_value(CompanyDto::from(model)).unwrap_or(JsonValue::Null)
        })
    } else {
        repo.list_projected(&query).await?
    };

    Ok(list_response(page.items, page.total, "No companies found"))
}

/// Get a company by id
#[utoipa::path(
    get,
    path = "/companies/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company", body = ApiResponse<CompanyDto>),
        (status = 404, description = "Company not found", body = ApiError)
    ),
    tag = "companies"
)]
pub async fn get_company(
    State(state): State<AppState>,
    _user: AuthUser,
    IdPath(id): IdPath,
) -> Result<ApiResponse<CompanyDto>, ApiError> {
    let company = CompanyRepository::new(&state.db).get(id).await?;
    Ok(ApiResponse::ok(company.into()))
}

/// Create a company
#[utoipa::path(
    post,
    path = "/companies",
    security(("bearer_auth" = [])),
    request_body = CreateCompanyRequest,
    responses(
        (status = 201, description = "Company created", body = ApiResponse<CompanyDto>),
        (status = 400, description = "Validation failed or name taken", body = ApiError)
    ),
    tag = "companies"
)]
pub async fn create_company(
    State(state): State<AppState>,
    _user: AuthUser,
    body: Result<Json<CreateCompanyRequest>, JsonRejection>,
) -> Result<ApiResponse<CompanyDto>, ApiError> {
    let Json(request) = body?;

    let company = CompanyRepository::new(&state.db)
        .create(CreateCompany {
            name: request.name,
            logo: request.logo,
            description: request.description,
            color_scheme: request.color_scheme,
        })
        .await?;

    Ok(ApiResponse::created(company.into()))
}

/// Partially update a company
#[utoipa::path(
    patch,
    path = "/companies/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Company id")),
    request_body = UpdateCompanyRequest,
    responses(
        (status = 200, description = "Company updated", body = ApiResponse<CompanyDto>),
        (status = 400, description = "Validation failed or name taken", body = ApiError),
        (status = 404, description = "Company not found", body = ApiError)
    ),
    tag = "companies"
)]
pub async fn update_company(
    State(state): State<AppState>,
    _user: AuthUser,
    IdPath(id): IdPath,
    body: Result<Json<UpdateCompanyRequest>, JsonRejection>,
) -> Result<ApiResponse<CompanyDto>, ApiError> {
    let Json(request) = body?;

    let company = CompanyRepository::new(&state.db)
        .update(
            id,
            UpdateCompany {
                name: request.name,
                logo: request.logo,
                description: request.description,
                color_scheme: request.color_scheme,
            },
        )
        .await?;

    Ok(ApiResponse::ok(company.into()))
}

/// Delete a company; its users and cards are detached, not deleted
#[utoipa::path(
    delete,
    path = "/companies/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company deleted", body = ApiResponse<String>),
        (status = 404, description = "Company not found", body = ApiError)
    ),
    tag = "companies"
)]
pub async fn delete_company(
    State(state): State<AppState>,
    _user: AuthUser,
    IdPath(id): IdPath,
) -> Result<ApiResponse<String>, ApiError> {
    CompanyRepository::new(&state.db).delete(id).await?;
    Ok(ApiResponse::ok(format!("Company with ID {id} has been deleted")))
}

/// Delete every company (superadmin)
#[utoipa::path(
    delete,
    path = "/companies",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All companies deleted", body = ApiResponse<String>),
        (status = 403, description = "Insufficient role", body = ApiError)
    ),
    tag = "companies"
)]
pub async fn delete_all_companies(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<String>, ApiError> {
    require_roles(&user, &[RoleName::Superadmin])?;

    let deleted = CompanyRepository::new(&state.db).delete_all().await?;
    Ok(ApiResponse::ok("All companies have been deleted".to_string()).with_total(deleted))
}

/// Delete the listed companies (superadmin)
#[utoipa::path(
    delete,
    path = "/companies/delete-by-ids",
    security(("bearer_auth" = [])),
    request_body = DeleteCompaniesRequest,
    responses(
        (status = 200, description = "Companies deleted", body = ApiResponse<String>),
        (status = 400, description = "Empty or invalid id list", body = ApiError),
        (status = 403, description = "Insufficient role", body = ApiError)
    ),
    tag = "companies"
)]
pub async fn delete_companies_by_ids(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<DeleteCompaniesRequest>, JsonRejection>,
) -> Result<ApiResponse<String>, ApiError> {
    require_roles(&user, &[RoleName::Superadmin])?;
    let Json(request) = body?;

    let deleted = CompanyRepository::new(&state.db)
        .delete_by_ids(&request.ids)
        .await?;

    let ids = request
        .ids
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Ok(ApiResponse::ok(format!("Companies with IDs {ids} have been deleted")).with_total(deleted))
}

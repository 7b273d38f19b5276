//! # Users API Handlers
//!
//! Role-gated user management. Everyone except superadmins is confined to
//! users of their own company.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AuthUser, CompanyClaim, require_roles};
use crate::error::{ApiError, forbidden};
use crate::handlers::types::{ApiResponse, IdPath, ListParams, list_response};
use crate::models::{RoleName, UserStatus};
use crate::query::ListQuery;
use crate::repositories::{UpdateUser, UserProfile, UserRepository, UserScope};
use crate::server::AppState;

/// User as returned by the API. The password hash is never exposed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: i32,
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub status: UserStatus,
    pub company: Option<CompanyClaim>,
    pub roles: Vec<RoleName>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<FixedOffset>,
}

impl From<UserProfile> for UserDto {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.user.id,
            email: profile.user.email,
            status: profile.user.status,
            company: profile.company.map(|company| CompanyClaim {
                id: company.id,
                name: company.name,
            }),
            roles: profile.roles,
            created_at: profile.user.created_at,
        }
    }
}

/// Request payload for a partial user update
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    /// New password, at least 6 characters
    pub password: Option<String>,
    pub status: Option<UserStatus>,
    pub company_id: Option<i32>,
}

/// Rejects callers that may not see `target` because it belongs to another company.
fn ensure_same_company(caller: &AuthUser, target: &UserProfile) -> Result<(), ApiError> {
    if caller.is_superadmin() || caller.company_id == target.user.company_id {
        Ok(())
    } else {
        Err(forbidden(Some("Cannot access users of another company")))
    }
}

fn highest_rank(roles: &[RoleName]) -> Option<u8> {
    roles.iter().map(RoleName::rank).max()
}

/// Rejects changes to a user holding a role above every role of the caller.
fn ensure_outranks(caller: &AuthUser, target: &UserProfile) -> Result<(), ApiError> {
    if caller.is_superadmin() || highest_rank(&target.roles) <= highest_rank(&caller.roles) {
        Ok(())
    } else {
        Err(forbidden(Some("Cannot modify a user with a higher role")))
    }
}

fn scope_for(caller: &AuthUser) -> UserScope {
    if caller.is_superadmin() {
        UserScope::All
    } else {
        match caller.company_id {
            Some(company_id) => UserScope::Company(company_id),
            None => UserScope::Unassigned,
        }
    }
}

/// List users visible to the caller (admin, superadmin)
#[utoipa::path(
    get,
    path = "/users",
    security(("bearer_auth" = [])),
    params(ListParams),
    responses(
        (status = 200, description = "Users", body = ApiResponse<Vec<UserDto>>),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Insufficient role", body = ApiError)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    query: ListQuery,
) -> Result<ApiResponse<Vec<UserDto>>, ApiError> {
    require_roles(&user, &[RoleName::Admin, RoleName::Superadmin])?;

    let page = UserRepository::new(&state.db)
        .list(scope_for(&user), &query)
        .await?
        .map(UserDto::from);

    Ok(list_response(page.items, page.total, "No users found"))
}

/// Get a user (admin, superadmin, manager)
#[utoipa::path(
    get,
    path = "/users/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = ApiResponse<UserDto>),
        (status = 403, description = "Insufficient role or another company", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> Result<ApiResponse<UserDto>, ApiError> {
    require_roles(
        &user,
        &[RoleName::Admin, RoleName::Superadmin, RoleName::Manager],
    )?;

    let profile = UserRepository::new(&state.db).get(id).await?;
    ensure_same_company(&user, &profile)?;

    Ok(ApiResponse::ok(profile.into()))
}

/// Update a user (admin, superadmin)
#[utoipa::path(
    put,
    path = "/users/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserDto>),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 403, description = "Insufficient role, another company or a higher-ranked user", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 409, description = "Email already exists", body = ApiError)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<ApiResponse<UserDto>, ApiError> {
    require_roles(&user, &[RoleName::Admin, RoleName::Superadmin])?;
    let Json(request) = body?;

    let repo = UserRepository::new(&state.db);
    let target = repo.get(id).await?;
    ensure_same_company(&user, &target)?;
    ensure_outranks(&user, &target)?;

    if !user.is_superadmin()
        && let Some(company_id) = request.company_id
        && Some(company_id) != user.company_id
    {
        return Err(forbidden(Some("Cannot move users to another company")));
    }

    let profile = repo
        .update(
            id,
            UpdateUser {
                email: request.email,
                password: request.password,
                status: request.status,
                company_id: request.company_id,
            },
        )
        .await?;

    Ok(ApiResponse::ok(profile.into()))
}

/// Delete a user (superadmin)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<String>),
        (status = 403, description = "Insufficient role", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 409, description = "User still owns cards", body = ApiError)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> Result<ApiResponse<String>, ApiError> {
    require_roles(&user, &[RoleName::Superadmin])?;

    UserRepository::new(&state.db).delete(id).await?;
    Ok(ApiResponse::ok(format!("User with ID {id} has been deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(company_id: Option<i32>, roles: Vec<RoleName>) -> AuthUser {
        AuthUser {
            id: 1,
            email: "caller@example.com".to_string(),
            company_id,
            roles,
        }
    }

    #[test]
    fn test_scope_for_roles() {
        assert_eq!(
            scope_for(&caller(Some(4), vec![RoleName::Superadmin])),
            UserScope::All
        );
        assert_eq!(
            scope_for(&caller(Some(4), vec![RoleName::Admin])),
            UserScope::Company(4)
        );
        assert_eq!(
            scope_for(&caller(None, vec![RoleName::Admin])),
            UserScope::Unassigned
        );
    }

    fn profile(company_id: Option<i32>, roles: Vec<RoleName>) -> UserProfile {
        let now = chrono::Utc::now().fixed_offset();
        UserProfile {
            user: crate::models::user::Model {
                id: 2,
                email: "target@example.com".to_string(),
                password: String::new(),
                company_id,
                status: UserStatus::Active,
                otp_code: None,
                otp_expiry: None,
                created_at: now,
                updated_at: now,
            },
            company: None,
            roles,
        }
    }

    #[test]
    fn test_ensure_outranks() {
        let admin = caller(Some(4), vec![RoleName::Admin]);
        let root = profile(Some(4), vec![RoleName::Superadmin, RoleName::Employee]);

        let error = ensure_outranks(&admin, &root).unwrap_err();
        assert_eq!(error.status, axum::http::StatusCode::FORBIDDEN);

        assert!(ensure_outranks(&admin, &profile(Some(4), vec![RoleName::Admin])).is_ok());
        assert!(ensure_outranks(&admin, &profile(Some(4), vec![RoleName::Employee])).is_ok());
        assert!(ensure_outranks(&admin, &profile(Some(4), vec![])).is_ok());
        assert!(ensure_outranks(&caller(None, vec![RoleName::Superadmin]), &root).is_ok());
    }
}

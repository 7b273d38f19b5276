//! # Auth API Handlers
//!
//! Registration, login and the current-user endpoint.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AuthUser, CompanyClaim};
use crate::error::ApiError;
use crate::handlers::types::ApiResponse;
use crate::handlers::users::UserDto;
use crate::models::RoleName;
use crate::repositories::{NewUser, UserProfile, UserRepository};
use crate::server::AppState;

/// Request payload for registration
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    /// At least 6 characters
    #[schema(example = "s3cret!")]
    pub password: String,
    /// Company to join (must exist)
    pub company_id: Option<i32>,
}

/// Request payload for login
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub password: String,
}

/// The user as described in an auth response
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthUserDto {
    pub id: i32,
    pub email: String,
    pub company: Option<CompanyClaim>,
    pub roles: Vec<RoleName>,
}

/// Access token plus the user it was issued for
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthPayload {
    pub access_token: String,
    pub user: AuthUserDto,
}

fn issue(state: &AppState, profile: UserProfile) -> Result<AuthPayload, ApiError> {
    let company = profile.company.map(|company| CompanyClaim {
        id: company.id,
        name: company.name,
    });

    let access_token = state
        .tokens
        .issue(
            profile.user.id,
            &profile.user.email,
            company.clone(),
            profile.roles.clone(),
        )
        .map_err(|e| ApiError::internal(format!("Failed to sign token: {e}")))?;

    Ok(AuthPayload {
        access_token,
        user: AuthUserDto {
            id: profile.user.id,
            email: profile.user.email,
            company,
            roles: profile.roles,
        },
    })
}

/// Register a new user with the employee role
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<AuthPayload>),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Email already exists", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<AuthPayload>, ApiError> {
    let Json(request) = body?;

    let profile = UserRepository::new(&state.db)
        .register(NewUser {
            email: request.email,
            password: request.password,
            company_id: request.company_id,
        })
        .await?;

    Ok(ApiResponse::created(issue(&state, profile)?))
}

/// Exchange credentials for an access token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<AuthPayload>),
        (status = 401, description = "Invalid credentials or inactive user", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<AuthPayload>, ApiError> {
    let Json(request) = body?;

    let profile = UserRepository::new(&state.db)
        .authenticate(&request.email, &request.password)
        .await?;

    tracing::info!(user_id = profile.user.id, "User logged in");
    Ok(ApiResponse::ok(issue(&state, profile)?))
}

/// The authenticated user
#[utoipa::path(
    get,
    path = "/auth/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserDto>),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<UserDto>, ApiError> {
    let profile = UserRepository::new(&state.db).get(user.id).await?;
    Ok(ApiResponse::ok(profile.into()))
}

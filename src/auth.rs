//! # Authentication and Authorization
//!
//! Bearer JWT authentication for protected endpoints and role guards.
//!
//! Tokens are HS256-signed and carry the user's id, email, company and role
//! names. The middleware does not trust the role list in the token: it reloads
//! the user on every request so deactivated accounts and revoked roles take
//! effect immediately.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::{AppConfig, ConfigError};
use crate::error::{ApiError, forbidden, unauthorized};
use crate::models::RoleName;
use crate::repositories::{RoleRepository, UserRepository};
use crate::server::AppState;

const INVALID_TOKEN: &str = "Invalid or expired token";

/// Company summary embedded in tokens and auth responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CompanyClaim {
    pub id: i32,
    pub name: String,
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id, as a string per RFC 7519
    pub sub: String,
    pub email: String,
    pub company: Option<CompanyClaim>,
    pub roles: Vec<RoleName>,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiration_seconds: i64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], expiration_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiration_seconds: i64::try_from(expiration_seconds).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        match config.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                Ok(Self::new(secret.as_bytes(), config.jwt_expiration_seconds))
            }
            _ => Err(ConfigError::MissingJwtSecret),
        }
    }

    /// Issues a token for the given user.
    pub fn issue(
        &self,
        user_id: i32,
        email: &str,
        company: Option<CompanyClaim>,
        roles: Vec<RoleName>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            company,
            roles,
            iat,
            exp: iat.saturating_add(self.expiration_seconds),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Verifies the signature and expiry and returns the claims.
    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

/// The authenticated caller, as reloaded from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub company_id: Option<i32>,
    pub roles: Vec<RoleName>,
}

impl AuthUser {
    pub fn has_role(&self, role: RoleName) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_superadmin(&self) -> bool {
        self.has_role(RoleName::Superadmin)
    }
}

/// Rejects the caller with 403 unless they hold at least one of `allowed`.
pub fn require_roles(user: &AuthUser, allowed: &[RoleName]) -> Result<(), ApiError> {
    if allowed.iter().any(|role| user.has_role(*role)) {
        Ok(())
    } else {
        tracing::info!(user_id = user.id, ?allowed, "Rejected request for missing role");
        let required: Vec<&str> = allowed.iter().map(RoleName::as_str).collect();
        Err(forbidden(Some("Insufficient role"))
            .with_details(serde_json::json!({ "required_roles": required })))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
}

/// Authentication middleware: validates the bearer token, reloads the user and
/// its roles, and stores an [`AuthUser`] in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = extract_bearer_token(request.headers())?;
        state.tokens.decode(token).map_err(|error| {
            tracing::debug!(%error, "Rejected bearer token");
            unauthorized(Some(INVALID_TOKEN))
        })?
    };

    let user_id: i32 = claims
        .sub
        .parse()
        .map_err(|_| unauthorized(Some(INVALID_TOKEN)))?;

    let user = UserRepository::new(&state.db)
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| unauthorized(Some(INVALID_TOKEN)))?;

    if !user.is_active() {
        return Err(unauthorized(Some("User is inactive")));
    }

    let roles = RoleRepository::new(&state.db)
        .role_names_for_user(user.id)
        .await?;

    tracing::debug!(user_id = user.id, ?roles, "Authenticated request");

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
        company_id: user.company_id,
        roles,
    });

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| unauthorized(Some("Authentication required")))
    }
}

//! # Server Configuration
//!
//! Router assembly, shared state and the OpenAPI document for the NFC cards
//! API.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{TokenIssuer, auth_middleware};
use crate::config::{AppConfig, ConfigError};
use crate::handlers::{self, auth, cards, companies, users};
use crate::media::MediaService;
use crate::telemetry::trace_context_middleware;

/// Avatar, background, logo and 15 gallery files.
const MAX_FILES_PER_REQUEST: usize = 18;
/// Room for the text parts of a card form.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub tokens: Arc<TokenIssuer>,
    pub media: MediaService,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Result<Self, ConfigError> {
        let tokens = TokenIssuer::from_config(&config)?;
        let media = MediaService::from_config(&config, reqwest::Client::new());
        Ok(Self {
            config: Arc::new(config),
            db,
            tokens: Arc::new(tokens),
            media,
        })
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();
    layer.allow_origin(AllowOrigin::list(origins))
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/companies",
            get(companies::list_companies)
                .post(companies::create_company)
                .delete(companies::delete_all_companies),
        )
        .route(
            "/companies/delete-by-ids",
            delete(companies::delete_companies_by_ids),
        )
        .route(
            "/companies/{id}",
            get(companies::get_company)
                .patch(companies::update_company)
                .delete(companies::delete_company),
        )
        .route("/users", get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/cards", get(cards::list_cards).post(cards::create_card))
        .route(
            "/cards/{id}",
            get(cards::get_card)
                .patch(cards::update_card)
                .delete(cards::delete_card),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public.merge(protected)
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();
    let body_limit = config
        .media_max_file_bytes
        .saturating_mul(MAX_FILES_PER_REQUEST)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let api = api_routes(&state);
    let prefix = config.api_prefix.trim_end_matches('/');

    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz));
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(prefix, api)
    };

    router
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", api_doc(prefix)))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;
    let profile = config.profile.clone();

    let state = AppState::new(config, db).context("building application state")?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
        })
        .await
        .context("serving HTTP")?;

    Ok(())
}

/// Registers the bearer JWT scheme referenced by protected operations.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Routes served outside the API prefix.
const ROOT_PATHS: [&str; 3] = ["/", "/healthz", "/readyz"];

/// OpenAPI document with the API routes mounted under `prefix`, matching the router.
pub fn api_doc(prefix: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let paths = std::mem::take(&mut doc.paths.paths);
    doc.paths.paths = paths
        .into_iter()
        .map(|(path, item)| {
            if ROOT_PATHS.contains(&path.as_str()) {
                (path, item)
            } else {
                (format!("{prefix}{path}"), item)
            }
        })
        .collect();
    doc
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::readyz,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::companies::list_companies,
        crate::handlers::companies::get_company,
        crate::handlers::companies::create_company,
        crate::handlers::companies::update_company,
        crate::handlers::companies::delete_company,
        crate::handlers::companies::delete_all_companies,
        crate::handlers::companies::delete_companies_by_ids,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::cards::list_cards,
        crate::handlers::cards::get_card,
        crate::handlers::cards::create_card,
        crate::handlers::cards::update_card,
        crate::handlers::cards::delete_card,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::error::ApiError,
            crate::auth::CompanyClaim,
            crate::models::RoleName,
            crate::models::UserStatus,
            crate::models::CardStatus,
            crate::models::ContactType,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::AuthPayload,
            crate::handlers::companies::CompanyDto,
            crate::handlers::companies::CreateCompanyRequest,
            crate::handlers::companies::UpdateCompanyRequest,
            crate::handlers::companies::DeleteCompaniesRequest,
            crate::handlers::users::UserDto,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::cards::CardDto,
            crate::handlers::cards::CardForm,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "companies", description = "Company management"),
        (name = "users", description = "User management"),
        (name = "cards", description = "NFC business cards"),
    ),
    info(
        title = "NFC Cards API",
        description = "Digital business cards, their companies and users",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_card_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/cards/{id}"));
        assert!(doc.paths.paths.contains_key("/companies/delete-by-ids"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_api_doc_mounts_routes_under_prefix() {
        let doc = api_doc("/api/v1");
        assert!(doc.paths.paths.contains_key("/api/v1/cards/{id}"));
        assert!(doc.paths.paths.contains_key("/api/v1/auth/login"));
        assert!(!doc.paths.paths.contains_key("/cards"));
        assert!(doc.paths.paths.contains_key("/healthz"));
        assert!(doc.paths.paths.contains_key("/"));

        assert!(api_doc("").paths.paths.contains_key("/cards"));
    }
}

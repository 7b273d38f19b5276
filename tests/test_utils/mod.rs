//! Test utilities for database and router testing.
//!
//! Every test gets its own in-memory SQLite database with migrations applied
//! and roles seeded, and a router whose media uploads are answered by a fake
//! uploader.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use migration::{Migrator, MigratorTrait};
use nfc_cards::{
    auth::TokenIssuer,
    config::AppConfig,
    media::{MediaError, MediaService, MediaUploader, TransformationPreset, UploadFile, UploadedAsset},
    models::{RoleName, user_role},
    repositories::RoleRepository,
    seeds::seed_roles,
    server::{AppState, create_app},
};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-secret-for-integration-tests";
pub const TEST_PASSWORD: &str = "password123";
pub const API: &str = "/api/v1";

/// Sets up an in-memory SQLite database with all migrations applied and the
/// roles seeded.
///
/// The pool holds a single connection so every query sees the same memory
/// database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;
    seed_roles(&db).await?;

    Ok(db)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: Some(TEST_JWT_SECRET.to_string()),
        ..AppConfig::default()
    }
}

/// Answers every upload with `https://media.test/{folder}/{file_name}`.
#[derive(Default)]
pub struct FakeUploader {
    pub uploads: Mutex<Vec<(String, String)>>,
}

impl FakeUploader {
    pub fn folders(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(folder, _)| folder.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaUploader for FakeUploader {
    async fn upload(
        &self,
        file: UploadFile,
        folder: &str,
        _preset: &TransformationPreset,
    ) -> Result<UploadedAsset, MediaError> {
        self.uploads
            .lock()
            .unwrap()
            .push((folder.to_string(), file.file_name.clone()));
        Ok(UploadedAsset {
            secure_url: format!("https://media.test/{}/{}", folder, file.file_name),
            public_id: None,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub uploader: Arc<FakeUploader>,
}

/// Builds the full application router over a fresh database.
pub async fn spawn_app() -> Result<TestApp> {
    let db = setup_test_db().await?;
    let config = test_config();
    let uploader = Arc::new(FakeUploader::default());

    let state = AppState {
        tokens: Arc::new(TokenIssuer::from_config(&config)?),
        media: MediaService::new(uploader.clone(), config.media_root_folder.clone()),
        config: Arc::new(config),
        db: db.clone(),
    };

    Ok(TestApp {
        router: create_app(state),
        db,
        uploader,
    })
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    /// Sends the request and returns the status with the decoded JSON body.
    pub async fn call(&self, request: Request<Body>) -> Result<(u16, Value)> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        Ok((status, body_json(response).await?))
    }

    /// Registers a user and returns `(user_id, access_token)`.
    pub async fn register(&self, email: &str, company_id: Option<i32>) -> Result<(i32, String)> {
        let (status, body) = self
            .call(json_request(
                "POST",
                &format!("{API}/auth/register"),
                None,
                Some(json!({
                    "email": email,
                    "password": TEST_PASSWORD,
                    "company_id": company_id,
                })),
            ))
            .await?;
        if status != 201 {
            return Err(anyhow!("register failed with {status}: {body}"));
        }

        let user_id = body["data"]["user"]["id"]
            .as_i64()
            .context("user id in register response")?;
        let token = body["data"]["access_token"]
            .as_str()
            .context("access token in register response")?
            .to_string();
        Ok((i32::try_from(user_id)?, token))
    }

    /// Grants `role` directly in the database. Roles are reloaded on every
    /// request, so existing tokens pick the grant up.
    pub async fn grant_role(&self, user_id: i32, role: RoleName) -> Result<()> {
        let role = RoleRepository::new(&self.db)
            .find_by_name(role)
            .await?
            .context("role is seeded")?;
        user_role::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(role.id),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    /// Registers a user holding `role` and returns `(user_id, access_token)`.
    pub async fn user_with_role(
        &self,
        email: &str,
        company_id: Option<i32>,
        role: RoleName,
    ) -> Result<(i32, String)> {
        let (user_id, token) = self.register(email, company_id).await?;
        self.grant_role(user_id, role).await?;
        Ok((user_id, token))
    }

    /// Creates a company through the API and returns its id.
    pub async fn create_company(&self, token: &str, name: &str) -> Result<i32> {
        let (status, body) = self
            .call(json_request(
                "POST",
                &format!("{API}/companies"),
                Some(token),
                Some(json!({ "name": name })),
            ))
            .await?;
        if status != 201 {
            return Err(anyhow!("create company failed with {status}: {body}"));
        }
        let id = body["data"]["id"].as_i64().context("company id")?;
        Ok(i32::try_from(id)?)
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

/// One part of a multipart form.
pub enum FormPart {
    Text(&'static str, String),
    File(&'static str, String, Vec<u8>),
}

impl FormPart {
    pub fn text(name: &'static str, value: impl Into<String>) -> Self {
        FormPart::Text(name, value.into())
    }

    pub fn file(name: &'static str, file_name: impl Into<String>) -> Self {
        FormPart::File(name, file_name.into(), b"fake-image-bytes".to_vec())
    }
}

const BOUNDARY: &str = "nfc-cards-test-boundary";

pub fn multipart_request(
    method: &str,
    uri: &str,
    token: &str,
    parts: Vec<FormPart>,
) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            FormPart::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            FormPart::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

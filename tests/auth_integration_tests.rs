//! Integration tests for registration, login and bearer authentication

use nfc_cards::auth::TokenIssuer;
use nfc_cards::models::{RoleName, UserStatus, user};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use serde_json::json;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{API, TEST_JWT_SECRET, TEST_PASSWORD, json_request, spawn_app};

#[tokio::test]
async fn register_returns_token_and_employee_role() {
    let app = spawn_app().await.unwrap();

    let (status, body) = app
        .call(json_request(
            "POST",
            &format!("{API}/auth/register"),
            None,
            Some(json!({ "email": "jane@example.com", "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(status, 201);
    assert_eq!(body["success"], true);
    assert_eq!(body["statusCode"], 201);
    assert_eq!(body["data"]["user"]["email"], "jane@example.com");
    assert_eq!(body["data"]["user"]["roles"], json!(["employee"]));
    assert!(body["data"]["user"]["company"].is_null());
    assert!(body["data"]["user"].get("password").is_none());
    assert!(body["data"]["access_token"].as_str().is_some());
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = spawn_app().await.unwrap();
    app.register("dup@example.com", None).await.unwrap();

    let (status, body) = app
        .call(json_request(
            "POST",
            &format!("{API}/auth/register"),
            None,
            Some(json!({ "email": "dup@example.com", "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(status, 409);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Email already exists");
}

#[tokio::test]
async fn register_validates_input() {
    let app = spawn_app().await.unwrap();

    for payload in [
        json!({ "email": "not-an-email", "password": TEST_PASSWORD }),
        json!({ "email": "short@example.com", "password": "12345" }),
        json!({ "email": "ghost@example.com", "password": TEST_PASSWORD, "company_id": 999 }),
    ] {
        let (status, body) = app
            .call(json_request(
                "POST",
                &format!("{API}/auth/register"),
                None,
                Some(payload.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(status, 400, "payload {payload} -> {body}");
    }

    let (status, body) = app
        .call(json_request(
            "POST",
            &format!("{API}/auth/register"),
            None,
            Some(json!({ "email": "ghost@example.com", "password": TEST_PASSWORD, "company_id": 999 })),
        ))
        .await
        .unwrap();
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Company with id 999 not found");
}

#[tokio::test]
async fn login_issues_token_with_roles() {
    let app = spawn_app().await.unwrap();
    let (user_id, _) = app
        .user_with_role("boss@example.com", None, RoleName::Admin)
        .await
        .unwrap();

    let (status, body) = app
        .call(json_request(
            "POST",
            &format!("{API}/auth/login"),
            None,
            Some(json!({ "email": "boss@example.com", "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(status, 200);

    let token = body["data"]["access_token"].as_str().unwrap();
    let claims = TokenIssuer::new(TEST_JWT_SECRET.as_bytes(), 60)
        .decode(token)
        .unwrap();
    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.email, "boss@example.com");
    assert!(claims.roles.contains(&RoleName::Admin));
    assert!(claims.roles.contains(&RoleName::Employee));
}

#[tokio::test]
async fn login_rejects_wrong_password_and_unknown_email() {
    let app = spawn_app().await.unwrap();
    app.register("jane@example.com", None).await.unwrap();

    for (email, password) in [
        ("jane@example.com", "wrong-password"),
        ("nobody@example.com", TEST_PASSWORD),
    ] {
        let (status, body) = app
            .call(json_request(
                "POST",
                &format!("{API}/auth/login"),
                None,
                Some(json!({ "email": email, "password": password })),
            ))
            .await
            .unwrap();
        assert_eq!(status, 401);
        assert_eq!(body["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn inactive_user_cannot_login_or_use_token() {
    let app = spawn_app().await.unwrap();
    let (user_id, token) = app.register("gone@example.com", None).await.unwrap();

    let mut active = user::Entity::find_by_id(user_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap()
        .into_active_model();
    active.status = Set(UserStatus::Inactive);
    active.update(&app.db).await.unwrap();

    let (status, body) = app
        .call(json_request(
            "POST",
            &format!("{API}/auth/login"),
            None,
            Some(json!({ "email": "gone@example.com", "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(status, 401);
    assert_eq!(body["error"], "User is inactive");

    let (status, _) = app
        .call(json_request("GET", &format!("{API}/auth/me"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(status, 401);
}

#[tokio::test]
async fn me_requires_a_valid_bearer_token() {
    let app = spawn_app().await.unwrap();
    let (user_id, token) = app.register("me@example.com", None).await.unwrap();

    let (status, body) = app
        .call(json_request("GET", &format!("{API}/auth/me"), None, None))
        .await
        .unwrap();
    assert_eq!(status, 401);
    assert_eq!(body["statusCode"], 401);

    let (status, _) = app
        .call(json_request(
            "GET",
            &format!("{API}/auth/me"),
            Some("not-a-jwt"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(status, 401);

    let (status, body) = app
        .call(json_request("GET", &format!("{API}/auth/me"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"]["id"], user_id);
    assert_eq!(body["data"]["status"], "ACTIVE");
    assert_eq!(body["data"]["roles"], json!(["employee"]));
}

#[tokio::test]
async fn probes_and_request_id() {
    let app = spawn_app().await.unwrap();

    let (status, body) = app
        .call(json_request("GET", "/healthz", None, None))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");

    let (status, _) = app
        .call(json_request("GET", "/readyz", None, None))
        .await
        .unwrap();
    assert_eq!(status, 200);

    let (status, body) = app
        .call(json_request("GET", "/openapi.json", None, None))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert!(body["paths"].get(format!("{API}/cards/{{id}}")).is_some());
    assert!(body["paths"].get("/healthz").is_some());

    let mut request = json_request("GET", &format!("{API}/companies"), None, None);
    request
        .headers_mut()
        .insert("x-request-id", "trace-abc".parse().unwrap());
    let response = app.send(request).await.unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(response.headers()["x-request-id"], "trace-abc");
    let body = test_utils::body_json(response).await.unwrap();
    assert_eq!(body["trace_id"], "trace-abc");
}

//! # Common API Types
//!
//! The success envelope shared by every endpoint, and the listing query
//! extractor.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{FromRequestParts, Path, Query},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::query::{self, ListQuery};

/// Success envelope: `{ success, statusCode, total?, data, message? }`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    /// Always `true`
    pub success: bool,
    /// HTTP status, mirrored into the body
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Rows matching the filters, on list endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn with_status(status: StatusCode, data: T) -> Self {
        Self {
            status,
            success: true,
            status_code: status.as_u16(),
            total: None,
            data,
            message: None,
        }
    }

    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_message<M: Into<String>>(mut self, message: M) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Builds a list envelope, adding `empty_message` when there are no rows.
pub fn list_response<T: Serialize>(
    items: Vec<T>,
    total: u64,
    empty_message: &str,
) -> ApiResponse<Vec<T>> {
    let empty = items.is_empty();
    let response = ApiResponse::ok(items).with_total(total);
    if empty {
        response.with_message(empty_message)
    } else {
        response
    }
}

/// Documented listing parameters. Any other query key is treated as a
/// column filter.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[allow(dead_code)]
pub struct ListParams {
    /// Page number, starting at 1
    #[param(example = 1)]
    page: Option<u64>,
    /// Page size
    #[param(example = 10)]
    limit: Option<u64>,
    /// Comma separated columns, `-` prefix for descending (e.g. `-name,id`)
    sort: Option<String>,
    /// Comma separated columns to return
    fields: Option<String>,
}

impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(ApiError::from)?;
        query::ListQuery::from_params(params).map_err(ApiError::from)
    }
}

/// A numeric `{id}` path segment. Non-numeric values are rejected with the
/// standard error envelope.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub i32);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i32>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_FAILED",
                    format!("Invalid path parameter: {}", rejection.body_text()),
                )
            })?;
        Ok(Self(id))
    }
}

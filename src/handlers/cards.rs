//! # Cards API Handlers
//!
//! Card CRUD. Create and update take `multipart/form-data` so that images can
//! be sent along with the card fields; JSON-valued fields (`color_scheme`,
//! `custom_fields`, `contacts`) are sent as text parts holding JSON.

use axum::{
    extract::{
        Multipart, State,
        multipart::{Field, MultipartRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::error::{ApiError, RepositoryError};
use crate::handlers::types::{ApiResponse, IdPath, ListParams, list_response};
use crate::media::{CardMediaUrls, CardUploads, MediaKind, MediaService, UploadFile};
use crate::models::{CardStatus, ContactType, card_contact, card_image};
use crate::query::{ListQuery, Page};
use crate::repositories::{CardChanges, CardDetail, CardRepository, ContactInput};
use crate::server::AppState;

/// Owner summary embedded in a card
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardOwnerDto {
    pub id: i32,
    pub email: String,
}

/// Company summary embedded in a card
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardCompanyDto {
    pub id: i32,
    pub name: String,
    pub logo: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardImageDto {
    pub id: i32,
    pub image_url: String,
    pub display_order: i32,
}

impl From<card_image::Model> for CardImageDto {
    fn from(model: card_image::Model) -> Self {
        Self {
            id: model.id,
            image_url: model.image_url,
            display_order: model.display_order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardContactDto {
    pub id: i32,
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    pub value: String,
    pub is_primary: bool,
}

impl From<card_contact::Model> for CardContactDto {
    fn from(model: card_contact::Model) -> Self {
        Self {
            id: model.id,
            contact_type: model.contact_type,
            value: model.value,
            is_primary: model.is_primary,
        }
    }
}

/// Card with its owner, company, gallery and contacts
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardDto {
    pub id: i32,
    pub user_id: i32,
    pub company_id: Option<i32>,
    #[schema(example = "Jane Doe")]
    pub name: String,
    pub title: Option<String>,
    pub nickname: Option<String>,
    pub department: Option<String>,
    pub avatar: Option<String>,
    pub background: Option<String>,
    pub color_scheme: Option<JsonValue>,
    pub logo: Option<String>,
    pub qr_code: Option<String>,
    pub custom_fields: Option<JsonValue>,
    pub is_private: bool,
    pub max_version: i32,
    pub status: CardStatus,
    pub view_count: i32,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<FixedOffset>,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<FixedOffset>,
    pub user: Option<CardOwnerDto>,
    pub company: Option<CardCompanyDto>,
    pub images: Vec<CardImageDto>,
    pub contacts: Vec<CardContactDto>,
}

impl From<CardDetail> for CardDto {
    fn from(detail: CardDetail) -> Self {
        let CardDetail {
            card,
            user,
            company,
            images,
            contacts,
        } = detail;

        Self {
            id: card.id,
            user_id: card.user_id,
            company_id: card.company_id,
            name: card.name,
            title: card.title,
            nickname: card.nickname,
            department: card.department,
            avatar: card.avatar,
            background: card.background,
            color_scheme: card.color_scheme,
            logo: card.logo,
            qr_code: card.qr_code,
            custom_fields: card.custom_fields,
            is_private: card.is_private,
            max_version: card.max_version,
            status: card.status,
            view_count: card.view_count,
            created_at: card.created_at,
            updated_at: card.updated_at,
            user: user.map(|user| CardOwnerDto {
                id: user.id,
                email: user.email,
            }),
            company: company.map(|company| CardCompanyDto {
                id: company.id,
                name: company.name,
                logo: company.logo,
            }),
            images: images.into_iter().map(CardImageDto::from).collect(),
            contacts: contacts.into_iter().map(CardContactDto::from).collect(),
        }
    }
}

/// Multipart form accepted by `POST /cards` and `PATCH /cards/{id}`.
/// Documentation only; the body is parsed field by field.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CardForm {
    /// Required on create, at most 50 characters
    name: Option<String>,
    title: Option<String>,
    nickname: Option<String>,
    department: Option<String>,
    /// Image file or URL
    #[schema(value_type = Option<String>, format = Binary)]
    avatar: Option<String>,
    /// Image file or URL
    #[schema(value_type = Option<String>, format = Binary)]
    background: Option<String>,
    /// Image file or URL
    #[schema(value_type = Option<String>, format = Binary)]
    logo: Option<String>,
    qr_code: Option<String>,
    company_id: Option<i32>,
    is_private: Option<bool>,
    status: Option<CardStatus>,
    /// JSON `{ "primary": "...", "secondary": "..." }`
    color_scheme: Option<String>,
    /// JSON object
    custom_fields: Option<String>,
    /// JSON array of `{ "type", "value", "is_primary" }`
    contacts: Option<String>,
    /// Image files or URLs; at most 15 files are kept
    #[schema(value_type = Option<Vec<String>>, format = Binary)]
    gallery: Option<Vec<String>>,
}

/// A parsed card form: field changes plus the files to upload.
#[derive(Debug, Default)]
pub struct CardRequest {
    pub changes: CardChanges,
    pub uploads: CardUploads,
}

fn bad_request(message: String) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
}

fn parse_json<T: serde::de::DeserializeOwned>(field: &str, raw: &str) -> Result<T, ApiError> {
    serde_json::from_str(raw).map_err(|e| bad_request(format!("{field} must be valid JSON: {e}")))
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(bad_request(format!("{field} must be a boolean"))),
    }
}

fn parse_status(raw: &str) -> Result<CardStatus, ApiError> {
    match raw.trim() {
        "active" => Ok(CardStatus::Active),
        "inactive" => Ok(CardStatus::Inactive),
        other => Err(bad_request(format!(
            "status must be 'active' or 'inactive', got '{other}'"
        ))),
    }
}

impl CardRequest {
    /// Applies one text part of the form.
    fn apply_text(&mut self, name: &str, value: String) -> Result<(), ApiError> {
        let changes = &mut self.changes;
        match name {
            "name" => changes.name = Some(value),
            "title" => changes.title = Some(value),
            "nickname" => changes.nickname = Some(value),
            "department" => changes.department = Some(value),
            "avatar" => changes.avatar = Some(value),
            "background" => changes.background = Some(value),
            "logo" => changes.logo = Some(value),
            "qr_code" => changes.qr_code = Some(value),
            "company_id" => {
                let company_id = value
                    .trim()
                    .parse()
                    .map_err(|_| bad_request("company_id must be an integer".to_string()))?;
                changes.company_id = Some(company_id);
            }
            "is_private" => changes.is_private = Some(parse_bool(name, &value)?),
            "status" => changes.status = Some(parse_status(&value)?),
            "color_scheme" => changes.color_scheme = Some(parse_json(name, &value)?),
            "custom_fields" => changes.custom_fields = Some(parse_json(name, &value)?),
            "contacts" => {
                let contacts: Vec<ContactInput> = parse_json(name, &value)?;
                changes.contacts = Some(contacts);
            }
            "gallery" | "gallery[]" => {
                let trimmed = value.trim();
                let gallery = changes.gallery.get_or_insert_with(Vec::new);
                if !trimmed.is_empty() {
                    gallery.push(trimmed.to_string());
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown card form field"),
        }
        Ok(())
    }

    /// Keeps the first file of each single-image kind and every gallery file.
    fn apply_file(&mut self, kind: MediaKind, file: UploadFile) {
        let uploads = &mut self.uploads;
        let slot = match kind {
            MediaKind::Avatar => &mut uploads.avatar,
            MediaKind::Background => &mut uploads.background,
            MediaKind::Logo => &mut uploads.logo,
            MediaKind::Gallery => {
                uploads.gallery.push(file);
                return;
            }
        };
        if slot.is_none() {
            *slot = Some(file);
        }
    }

    /// Reads the whole multipart body, rejecting files over `max_file_bytes`.
    pub async fn from_multipart(
        mut multipart: Multipart,
        max_file_bytes: usize,
    ) -> Result<Self, ApiError> {
        let mut request = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            let file_name = field.file_name().map(str::to_string);
            match (file_name, MediaKind::from_field(&name)) {
                (Some(file_name), Some(kind)) => {
                    let Some(file) = read_file(field, file_name, max_file_bytes).await? else {
                        continue;
                    };
                    request.apply_file(kind, file);
                }
                (Some(_), None) => {
                    tracing::debug!(field = %name, "Ignoring file in non-media field");
                }
                (None, _) => {
                    let value = field.text().await?;
                    request.apply_text(&name, value)?;
                }
            }
        }

        Ok(request)
    }
}

/// Reads a file part. Empty parts (a form's unset file input) yield `None`.
async fn read_file(
    field: Field<'_>,
    file_name: String,
    max_file_bytes: usize,
) -> Result<Option<UploadFile>, ApiError> {
    let bytes = field.bytes().await?;
    if bytes.is_empty() {
        return Ok(None);
    }
    if bytes.len() > max_file_bytes {
        return Err(bad_request(format!(
            "File '{file_name}' exceeds the maximum size of {max_file_bytes} bytes"
        )));
    }
    Ok(Some(UploadFile { file_name, bytes }))
}

fn multipart_body(multipart: Result<Multipart, MultipartRejection>) -> Result<Multipart, ApiError> {
    multipart.map_err(|rejection| {
        bad_request(format!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        ))
    })
}

async fn upload(
    media: MediaService,
    card_id: i32,
    uploads: CardUploads,
) -> Result<CardMediaUrls, RepositoryError> {
    if uploads.is_empty() {
        return Ok(CardMediaUrls::default());
    }
    Ok(media.upload_card_media(card_id, uploads).await?)
}

/// List cards
#[utoipa::path(
    get,
    path = "/cards",
    security(("bearer_auth" = [])),
    params(ListParams),
    responses(
        (status = 200, description = "Cards matching the filters", body = ApiResponse<Vec<CardDto>>),
        (status = 400, description = "Invalid pagination, sort or filter", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "cards"
)]
pub async fn list_cards(
    State(state): State<AppState>,
    _user: AuthUser,
    query: ListQuery,
) -> Result<ApiResponse<Vec<JsonValue>>, ApiError> {
    let repo = CardRepository::new(&state.db);

    let page = if query.fields.is_empty() {
        let page = repo.list(&query).await?;
        let items = page
            .items
            .into_iter()
            .map(|detail| serde_json::to_value(CardDto::from(detail)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| ApiError::internal(format!("Failed to serialize card: {error}")))?;
        Page {
            items,
            total: page.total,
        }
    } else {
        repo.list_projected(&query).await?
    };

    Ok(list_response(page.items, page.total, "No cards found"))
}

/// Get a card with its relations
#[utoipa::path(
    get,
    path = "/cards/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Card id")),
    responses(
        (status = 200, description = "Card", body = ApiResponse<CardDto>),
        (status = 404, description = "Card not found", body = ApiError)
    ),
    tag = "cards"
)]
pub async fn get_card(
    State(state): State<AppState>,
    _user: AuthUser,
    IdPath(id): IdPath,
) -> Result<ApiResponse<CardDto>, ApiError> {
    let card = CardRepository::new(&state.db).get(id).await?;
    Ok(ApiResponse::ok(card.into()))
}

/// Create a card owned by the caller
#[utoipa::path(
    post,
    path = "/cards",
    security(("bearer_auth" = [])),
    request_body(content = CardForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Card created", body = ApiResponse<CardDto>),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 502, description = "Media upload failed", body = ApiError)
    ),
    tag = "cards"
)]
pub async fn create_card(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<CardDto>, ApiError> {
    let CardRequest { changes, uploads } =
        CardRequest::from_multipart(multipart_body(multipart)?, state.config.media_max_file_bytes)
            .await?;

    let media = state.media.clone();
    let card = CardRepository::new(&state.db)
        .create(user.id, changes, |card_id| upload(media, card_id, uploads))
        .await?;

    Ok(ApiResponse::created(card.into()))
}

/// Partially update a card
#[utoipa::path(
    patch,
    path = "/cards/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Card id")),
    request_body(content = CardForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Card updated", body = ApiResponse<CardDto>),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Card not found", body = ApiError),
        (status = 502, description = "Media upload failed", body = ApiError)
    ),
    tag = "cards"
)]
pub async fn update_card(
    State(state): State<AppState>,
    _user: AuthUser,
    IdPath(id): IdPath,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<CardDto>, ApiError> {
    let CardRequest { changes, uploads } =
        CardRequest::from_multipart(multipart_body(multipart)?, state.config.media_max_file_bytes)
            .await?;

    let media = state.media.clone();
    let card = CardRepository::new(&state.db)
        .update(id, changes, |card_id| upload(media, card_id, uploads))
        .await?;

    Ok(ApiResponse::ok(card.into()))
}

/// Delete a card and its child rows
#[utoipa::path(
    delete,
    path = "/cards/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Card id")),
    responses(
        (status = 200, description = "Card deleted", body = ApiResponse<String>),
        (status = 404, description = "Card not found", body = ApiError)
    ),
    tag = "cards"
)]
pub async fn delete_card(
    State(state): State<AppState>,
    _user: AuthUser,
    IdPath(id): IdPath,
) -> Result<ApiResponse<String>, ApiError> {
    CardRepository::new(&state.db).delete(id).await?;
    Ok(ApiResponse::ok(format!("Card with ID {id} has been deleted")))
}

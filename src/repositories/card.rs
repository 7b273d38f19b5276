//! # Card Repository
//!
//! Cards with their contacts and gallery images. Creation and updates write
//! the card row and its children in one transaction; media uploads are passed
//! in as a callback so they run once the card id is known.

use std::future::Future;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, LoaderTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::RepositoryError;
use crate::media::CardMediaUrls;
use crate::models::{
    CardStatus, ContactType, card, card_contact, card_image, card_introduction, card_product,
    card_version, card_version_log, card_video, company, user,
};
use crate::query::{self, ListQuery, Page};
use crate::repositories::company::ensure_exists as ensure_company_exists;
use crate::validation;

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_NICKNAME_LEN: usize = 50;
pub const MAX_DEPARTMENT_LEN: usize = 100;
pub const MAX_CONTACT_VALUE_LEN: usize = 255;

/// A contact entry as submitted by clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactInput {
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    pub value: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Card fields supplied by a create or update request. `None` leaves a
/// column unchanged; an empty string clears an optional text column.
#[derive(Debug, Clone, Default)]
pub struct CardChanges {
    pub name: Option<String>,
    pub title: Option<String>,
    pub nickname: Option<String>,
    pub department: Option<String>,
    pub avatar: Option<String>,
    pub background: Option<String>,
    pub logo: Option<String>,
    pub qr_code: Option<String>,
    pub company_id: Option<i32>,
    pub is_private: Option<bool>,
    pub status: Option<CardStatus>,
    pub color_scheme: Option<JsonValue>,
    pub custom_fields: Option<JsonValue>,
    pub contacts: Option<Vec<ContactInput>>,
    pub gallery: Option<Vec<String>>,
}

impl CardChanges {
    /// Uploaded URLs take precedence over the text fields of the request.
    pub fn apply_media(&mut self, urls: CardMediaUrls) {
        if let Some(avatar) = urls.avatar {
            self.avatar = Some(avatar);
        }
        if let Some(background) = urls.background {
            self.background = Some(background);
        }
        if let Some(logo) = urls.logo {
            self.logo = Some(logo);
        }
        if let Some(gallery) = urls.gallery {
            self.gallery = Some(gallery);
        }
    }

    fn validate(&self, creating: bool) -> Result<(), RepositoryError> {
        match &self.name {
            Some(name) => {
                validation::required_text("name", name, MAX_NAME_LEN)?;
            }
            None if creating => {
                return Err(RepositoryError::validation_error("name is required"));
            }
            None => {}
        }

        let limits = [
            ("title", &self.title, MAX_TITLE_LEN),
            ("nickname", &self.nickname, MAX_NICKNAME_LEN),
            ("department", &self.department, MAX_DEPARTMENT_LEN),
            ("qr_code", &self.qr_code, validation::MAX_URL_LEN),
        ];
        for (field, value, max) in limits {
            if let Some(value) = value {
                validation::max_length(field, value, max)?;
            }
        }

        for (field, value) in [
            ("avatar", &self.avatar),
            ("background", &self.background),
            ("logo", &self.logo),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                validation::url(field, value)?;
            }
        }

        if let Some(company_id) = self.company_id
            && company_id < 1
        {
            return Err(RepositoryError::validation_error(
                "company_id must be a positive integer",
            ));
        }

        if let Some(custom_fields) = &self.custom_fields
            && !custom_fields.is_object()
        {
            return Err(RepositoryError::validation_error(
                "custom_fields must be a JSON object",
            ));
        }

        for contact in self.contacts.iter().flatten() {
            validation::required_text("contact value", &contact.value, MAX_CONTACT_VALUE_LEN)?;
        }

        for image_url in self.gallery.iter().flatten() {
            validation::url("gallery", image_url)?;
        }

        Ok(())
    }
}

/// A card with everything the detail view shows.
#[derive(Debug, Clone, PartialEq)]
pub struct CardDetail {
    pub card: card::Model,
    pub user: Option<user::Model>,
    pub company: Option<company::Model>,
    pub images: Vec<card_image::Model>,
    pub contacts: Vec<card_contact::Model>,
}

fn not_found(id: i32) -> RepositoryError {
    RepositoryError::not_found(format!("Card with ID {id} not found"))
}

fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn assign(active: &mut card::ActiveModel, changes: &mut CardChanges) {
    if let Some(name) = changes.name.take() {
        active.name = Set(name.trim().to_string());
    }
    if let Some(title) = changes.title.take() {
        active.title = Set(optional_text(title));
    }
    if let Some(nickname) = changes.nickname.take() {
        active.nickname = Set(optional_text(nickname));
    }
    if let Some(department) = changes.department.take() {
        active.department = Set(optional_text(department));
    }
    if let Some(avatar) = changes.avatar.take() {
        active.avatar = Set(optional_text(avatar));
    }
    if let Some(background) = changes.background.take() {
        active.background = Set(optional_text(background));
    }
    if let Some(logo) = changes.logo.take() {
        active.logo = Set(optional_text(logo));
    }
    if let Some(qr_code) = changes.qr_code.take() {
        active.qr_code = Set(optional_text(qr_code));
    }
    if let Some(company_id) = changes.company_id {
        active.company_id = Set(Some(company_id));
    }
    if let Some(is_private) = changes.is_private {
        active.is_private = Set(is_private);
    }
    if let Some(status) = changes.status {
        active.status = Set(status);
    }
    if let Some(color_scheme) = changes.color_scheme.take() {
        active.color_scheme = Set(Some(color_scheme));
    }
    if let Some(custom_fields) = changes.custom_fields.take() {
        active.custom_fields = Set(Some(custom_fields));
    }
}

async fn insert_contacts<C: ConnectionTrait>(
    db: &C,
    card_id: i32,
    contacts: Vec<ContactInput>,
) -> Result<(), RepositoryError> {
    if contacts.is_empty() {
        return Ok(());
    }

    let rows = contacts.into_iter().map(|contact| card_contact::ActiveModel {
        card_id: Set(card_id),
        contact_type: Set(contact.contact_type),
        value: Set(contact.value.trim().to_string()),
        is_primary: Set(contact.is_primary),
        ..Default::default()
    });

    card_contact::Entity::insert_many(rows)
        .exec(db)
        .await
        .map_err(RepositoryError::database_error)?;
    Ok(())
}

async fn insert_images<C: ConnectionTrait>(
    db: &C,
    card_id: i32,
    gallery: Vec<String>,
) -> Result<(), RepositoryError> {
    if gallery.is_empty() {
        return Ok(());
    }

    let rows = gallery
        .into_iter()
        .enumerate()
        .map(|(index, image_url)| card_image::ActiveModel {
            card_id: Set(card_id),
            image_url: Set(image_url),
            display_order: Set(i32::try_from(index).unwrap_or(i32::MAX)),
            ..Default::default()
        });

    card_image::Entity::insert_many(rows)
        .exec(db)
        .await
        .map_err(RepositoryError::database_error)?;
    Ok(())
}

/// Batch-loads owners, companies, images and contacts for `cards`.
async fn load_details(
    db: &DatabaseConnection,
    cards: Vec<card::Model>,
) -> Result<Vec<CardDetail>, RepositoryError> {
    let users = cards
        .load_one(user::Entity, db)
        .await
        .map_err(RepositoryError::database_error)?;
    let companies = cards
        .load_one(company::Entity, db)
        .await
        .map_err(RepositoryError::database_error)?;
    let images = cards
        .load_many(
            card_image::Entity::find().order_by_asc(card_image::Column::DisplayOrder),
            db,
        )
        .await
        .map_err(RepositoryError::database_error)?;
    let contacts = cards
        .load_many(
            card_contact::Entity::find().order_by_asc(card_contact::Column::Id),
            db,
        )
        .await
        .map_err(RepositoryError::database_error)?;

    Ok(cards
        .into_iter()
        .zip(users)
        .zip(companies)
        .zip(images)
        .zip(contacts)
        .map(|((((card, user), company), mut images), mut contacts)| {
            images.sort_by_key(|image| (image.display_order, image.id));
            contacts.sort_by_key(|contact| contact.id);
            CardDetail {
                card,
                user,
                company,
                images,
                contacts,
            }
        })
        .collect())
}

/// Repository for Card database operations
pub struct CardRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> CardRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// `company_id` and `status` match exactly; every other filter is a LIKE.
    fn filtered(&self, query: &ListQuery) -> Result<Select<card::Entity>, RepositoryError> {
        let mut query = query.clone();
        let mut select = card::Entity::find();

        if let Some(raw) = query.take_filter("company_id") {
            let company_id: i32 = raw.trim().parse().map_err(|_| {
                RepositoryError::validation_error("company_id must be an integer")
            })?;
            select = select.filter(card::Column::CompanyId.eq(company_id));
        }

        if let Some(raw) = query.take_filter("status") {
            let status = match raw.trim() {
                "active" => CardStatus::Active,
                "inactive" => CardStatus::Inactive,
                other => {
                    return Err(RepositoryError::validation_error(format!(
                        "Invalid status '{other}'"
                    )));
                }
            };
            select = select.filter(card::Column::Status.eq(status));
        }

        let select = query::apply_like_filters(select, &query.filters)?;
        query::apply_sort(select, &query.sort)
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Page<CardDetail>, RepositoryError> {
        let select = self.filtered(query)?;
        let page = query::fetch_page(self.db, select, query)
            .await
            .map_err(RepositoryError::database_error)?;

        let items = load_details(self.db, page.items).await?;
        Ok(Page {
            items,
            total: page.total,
        })
    }

    /// Lists cards, returning only `query.fields` for each row.
    pub async fn list_projected(&self, query: &ListQuery) -> Result<Page<JsonValue>, RepositoryError> {
        let columns = query::projection::<card::Entity>(&query.fields)?;
        let select = self.filtered(query)?;
        query::fetch_projected_page(self.db, select, columns, query)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<card::Model, RepositoryError> {
        card::Entity::find_by_id(id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| not_found(id))
    }

    pub async fn get(&self, id: i32) -> Result<CardDetail, RepositoryError> {
        let card = self.find_by_id(id).await?;
        load_details(self.db, vec![card])
            .await?
            .pop()
            .ok_or_else(|| not_found(id))
    }

    /// Creates a card owned by `owner_id`. `upload` receives the new card id
    /// and runs inside the transaction, so a failed upload leaves no rows.
    pub async fn create<F, Fut>(
        &self,
        owner_id: i32,
        mut changes: CardChanges,
        upload: F,
    ) -> Result<CardDetail, RepositoryError>
    where
        F: FnOnce(i32) -> Fut,
        Fut: Future<Output = Result<CardMediaUrls, RepositoryError>>,
    {
        changes.validate(true)?;
        if let Some(company_id) = changes.company_id {
            ensure_company_exists(self.db, company_id).await?;
        }

        let txn = self.db.begin().await.map_err(RepositoryError::database_error)?;

        let now = Utc::now();
        let mut active = card::ActiveModel {
            user_id: Set(owner_id),
            company_id: Set(None),
            title: Set(None),
            nickname: Set(None),
            department: Set(None),
            avatar: Set(None),
            background: Set(None),
            color_scheme: Set(None),
            logo: Set(None),
            qr_code: Set(None),
            custom_fields: Set(None),
            is_private: Set(false),
            max_version: Set(1),
            status: Set(CardStatus::Active),
            view_count: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        assign(&mut active, &mut changes);

        let card = active
            .insert(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        let urls = upload(card.id).await?;
        if urls != CardMediaUrls::default() {
            changes.apply_media(urls);
            let mut active = card.clone().into_active_model();
            assign(&mut active, &mut changes);
            active
                .update(&txn)
                .await
                .map_err(RepositoryError::database_error)?;
        }

        insert_contacts(&txn, card.id, changes.contacts.take().unwrap_or_default()).await?;
        insert_images(&txn, card.id, changes.gallery.take().unwrap_or_default()).await?;

        txn.commit().await.map_err(RepositoryError::database_error)?;
        tracing::info!(card_id = card.id, owner_id, "Created card");

        self.get(card.id).await
    }

    /// Updates a card. A missing card is reported before `upload` runs.
    /// Contacts and gallery are replaced only when the request supplies them.
    pub async fn update<F, Fut>(
        &self,
        id: i32,
        mut changes: CardChanges,
        upload: F,
    ) -> Result<CardDetail, RepositoryError>
    where
        F: FnOnce(i32) -> Fut,
        Fut: Future<Output = Result<CardMediaUrls, RepositoryError>>,
    {
        let card = self.find_by_id(id).await?;
        changes.validate(false)?;
        if let Some(company_id) = changes.company_id {
            ensure_company_exists(self.db, company_id).await?;
        }

        let urls = upload(id).await?;
        changes.apply_media(urls);

        let txn = self.db.begin().await.map_err(RepositoryError::database_error)?;

        let mut active = card.into_active_model();
        assign(&mut active, &mut changes);
        active.updated_at = Set(Utc::now().into());
        active
            .update(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        if let Some(contacts) = changes.contacts.take() {
            card_contact::Entity::delete_many()
                .filter(card_contact::Column::CardId.eq(id))
                .exec(&txn)
                .await
                .map_err(RepositoryError::database_error)?;
            insert_contacts(&txn, id, contacts).await?;
        }

        if let Some(gallery) = changes.gallery.take() {
            card_image::Entity::delete_many()
                .filter(card_image::Column::CardId.eq(id))
                .exec(&txn)
                .await
                .map_err(RepositoryError::database_error)?;
            insert_images(&txn, id, gallery).await?;
        }

        txn.commit().await.map_err(RepositoryError::database_error)?;
        tracing::info!(card_id = id, "Updated card");

        self.get(id).await
    }

    /// Deletes a card and every row that references it.
    pub async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        self.find_by_id(id).await?;

        let txn = self.db.begin().await.map_err(RepositoryError::database_error)?;

        card_contact::Entity::delete_many()
            .filter(card_contact::Column::CardId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        card_image::Entity::delete_many()
            .filter(card_image::Column::CardId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        card_introduction::Entity::delete_many()
            .filter(card_introduction::Column::CardId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        card_product::Entity::delete_many()
            .filter(card_product::Column::CardId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        card_video::Entity::delete_many()
            .filter(card_video::Column::CardId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        card_version_log::Entity::delete_many()
            .filter(card_version_log::Column::CardId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        card_version::Entity::delete_many()
            .filter(card_version::Column::CardId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        card::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        txn.commit().await.map_err(RepositoryError::database_error)?;
        tracing::info!(card_id = id, "Deleted card");
        Ok(())
    }
}

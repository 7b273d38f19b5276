//! # Data Models
//!
//! SeaORM entities for every table managed by the `migration` crate.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod card;
pub mod card_contact;
pub mod card_image;
pub mod card_introduction;
pub mod card_product;
pub mod card_version;
pub mod card_version_log;
pub mod card_video;
pub mod company;
pub mod permission;
pub mod role;
pub mod user;
pub mod user_role;

pub use card::{CardStatus, Entity as Card};
pub use card_contact::{ContactType, Entity as CardContact};
pub use card_image::Entity as CardImage;
pub use company::Entity as Company;
pub use role::{Entity as Role, RoleName};
pub use user::{Entity as User, UserStatus};
pub use user_role::Entity as UserRole;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "nfc-cards".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

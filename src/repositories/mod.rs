//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations and the
//! business rules attached to them (uniqueness, company scoping, cascading
//! child rows).

pub mod card;
pub mod company;
pub mod role;
pub mod user;

pub use card::{CardChanges, CardDetail, CardRepository, ContactInput};
pub use company::{CompanyRepository, CreateCompany, UpdateCompany};
pub use role::RoleRepository;
pub use user::{NewUser, UpdateUser, UserProfile, UserRepository, UserScope};

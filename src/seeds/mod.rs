//! Database seeding functionality
//!
//! Idempotent inserts of the reference data the application needs at startup.

pub mod roles;

pub use roles::seed_roles;

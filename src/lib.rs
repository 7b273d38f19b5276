//! # NFC Cards API Library
//!
//! Core of the NFC business-card service: companies, users with role based
//! access, cards with their contacts and gallery, and delegated media
//! uploads.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod password;
pub mod query;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod telemetry;
pub mod validation;
pub use migration;

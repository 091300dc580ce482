//! Core data models for the deposit file service.
//!
//! Rows map to database tables via `sqlx::FromRow`; the deposit aggregate
//! and its ordered file collection are assembled from them by the services.

pub mod bucket;
pub mod deposit;
pub mod file_collection;
pub mod file_entry;
pub mod user;

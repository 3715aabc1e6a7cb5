//! Persistence model for service reviews in the time bank.
//!
//! A [`Review`] is one user's 1 to 5 rating of a service, with an optional
//! comment. Input is validated into a [`NewReview`] and stored through an
//! explicit [`Database`] handle, which owns the record identifiers and the
//! `created_at`/`updated_at` timestamps.
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use bson::oid::ObjectId;
pub use config::{load_config, StoreConfig};
pub use db::Database;
pub use error::{PersistenceError, ReviewError, ValidationError};
pub use models::review::{NewReview, Rating, Review, ReviewFields, ReviewUpdate, ReviewUpdateFields};

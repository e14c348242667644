//! Charm store search
//!
//! ACL-aware full-text search over charms and bundles with a
//! popularity-boosted ranking, exposed over HTTP.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod search;

pub use error::{AppError, Result};

//! School library server
//!
//! REST JSON API for a school library: rooms and students, shelves and
//! books, the borrow desk with per-shelf limits, revision papers and
//! the dashboards built on top of them.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

//! # Recipe Client
//!
//! Client library for the recipe-sharing backend (`/api/v1`): user
//! registration and login, recipe CRUD and search, favorites, ratings and
//! the admin moderation dashboard.
//!
//! ## Architecture
//! - `config`: environment-driven client settings
//! - `storage`: persistent key-value backends for the token pair
//! - `api`: HTTP transport, response envelope and error taxonomy
//! - `auth`: token decoding, the token store and the session manager
//! - `services`: recipe, category and admin wrappers on top of the session
//!
//! ## Usage
//! Build one `SessionManager` at the application root and hand an `Arc` of it
//! to every service:
//! ```no_run
//! use std::sync::Arc;
//! use recipe_client::{ClientConfig, SessionManager, storage::MemoryStorage};
//! use recipe_client::services::{RecipeQuery, RecipeService};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let session = Arc::new(SessionManager::from_config(&config, Arc::new(MemoryStorage::new()))?);
//! session.login("test@example.com", "password123").await?;
//!
//! let recipes = RecipeService::new(session.clone());
//! let page = recipes.list(&RecipeQuery { search: Some("pasta".into()), ..Default::default() }).await?;
//! println!("{} recipes", page.pagination.total);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod services;
pub mod storage;

pub use api::{ApiClient, ApiRequest, ClientError, HttpError};
pub use auth::{SessionManager, SessionState, TokenPair, TokenStore, User};
pub use config::ClientConfig;

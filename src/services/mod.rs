//! # Services Module
//!
//! Typed wrappers around the recipe backend. Every service borrows the one
//! `SessionManager` of the application, so authenticated calls share its
//! token store and refresh-and-retry handling.

pub mod admin;
pub mod categories;
pub mod models;
pub mod recipes;

pub use admin::AdminService;
pub use categories::CategoryService;
pub use models::*;
pub use recipes::RecipeService;

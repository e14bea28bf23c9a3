//! # API Module
//!
//! HTTP plumbing for the recipe backend: the shared reqwest client, the
//! `{ success, message, data? }` response envelope and the typed errors
//! every call can surface.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{ApiClient, ApiRequest};
pub use envelope::ApiResponse;
pub use error::{ClientError, HttpError};

//! # Authentication Module
//!
//! Client-side session lifecycle: token decoding, token persistence with a
//! cookie mirror, and the session manager that ties login, refresh and
//! "who am I" lookups together.

pub mod jwt;
pub mod models;
pub mod session;
pub mod token_store;

pub use jwt::{TokenClaims, decode_claims, is_token_valid};
pub use models::{AuthPayload, RegisterRequest, Role, TokenPair, User};
pub use session::{SessionManager, SessionState};
pub use token_store::{CookieMirror, TokenStore};

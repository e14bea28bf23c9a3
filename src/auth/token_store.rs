//! Token Store
//!
//! Owns the two persisted token slots and the `access_token` cookie mirror.
//! Nothing else in the crate touches the raw storage keys.
//!
//! Storage failures never escape: reads degrade to "no token" and writes are
//! logged. Every mutation bumps an epoch so that a refresh finishing late can
//! tell whether the session changed underneath it.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Url;
use reqwest::cookie::Jar;

use super::jwt;
use super::models::TokenPair;
use crate::storage::{KeyValueStorage, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Browsers cap cookie lifetimes at 400 days
const MAX_COOKIE_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Where the access token gets mirrored for server-side route guards
#[derive(Debug, Clone)]
pub struct CookieMirror {
    jar: Arc<Jar>,
    url: Url,
}

impl CookieMirror {
    pub fn new(jar: Arc<Jar>, url: Url) -> Self {
        Self { jar, url }
    }

    /// An expired or undecodable token is never mirrored; any previous
    /// cookie is removed instead.
    fn write(&self, access_token: &str) {
        let max_age = jwt::seconds_until_expiry(access_token, Utc::now().timestamp());
        let Some(max_age) = max_age.filter(|secs| *secs > 0) else {
            self.expire();
            return;
        };
        let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, access_token.to_string());
        cookie.set_path("/");
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(time::Duration::seconds(max_age.min(MAX_COOKIE_AGE_SECS)));
        self.jar.add_cookie_str(&cookie.to_string(), &self.url);
    }

    fn expire(&self) {
        let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, "");
        cookie.set_path("/");
        cookie.make_removal();
        self.jar.add_cookie_str(&cookie.to_string(), &self.url);
    }
}

pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    cookie: Option<CookieMirror>,
    // guards every slot mutation; the value is the mutation epoch
    epoch: Mutex<u64>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("cookie", &self.cookie)
            .field("epoch", &*self.epoch.lock())
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            cookie: None,
            epoch: Mutex::new(0),
        }
    }

    pub fn with_cookie_mirror(mut self, mirror: CookieMirror) -> Self {
        self.cookie = Some(mirror);
        self
    }

    pub fn access_token(&self) -> Option<String> {
        let _guard = self.epoch.lock();
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        let _guard = self.epoch.lock();
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Both slots, read together. `None` unless both are present.
    pub fn tokens(&self) -> Option<TokenPair> {
        let _guard = self.epoch.lock();
        Some(TokenPair {
            access_token: self.read(ACCESS_TOKEN_KEY)?,
            refresh_token: self.read(REFRESH_TOKEN_KEY)?,
        })
    }

    pub fn is_token_valid(token: &str) -> bool {
        jwt::is_token_valid(token)
    }

    /// Current mutation epoch
    pub fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    pub fn set_tokens(&self, pair: &TokenPair) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.write_pair(pair);
    }

    /// Store `pair` only if nothing mutated the store since `expected`.
    pub fn set_tokens_if(&self, pair: &TokenPair, expected: u64) -> bool {
        let mut epoch = self.epoch.lock();
        if *epoch != expected {
            return false;
        }
        *epoch += 1;
        self.write_pair(pair);
        true
    }

    /// Idempotent; clearing an empty store is a no-op.
    pub fn clear_tokens(&self) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.remove_pair();
    }

    /// Clear only if nothing mutated the store since `expected`.
    pub fn clear_tokens_if(&self, expected: u64) -> bool {
        let mut epoch = self.epoch.lock();
        if *epoch != expected {
            return false;
        }
        *epoch += 1;
        self.remove_pair();
        true
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(StorageError::Unavailable) => None,
            Err(e) => {
                tracing::warn!("[TokenStore] failed to read {}: {}", key, e);
                None
            }
        }
    }

    fn write_pair(&self, pair: &TokenPair) {
        let written = self
            .storage
            .set(ACCESS_TOKEN_KEY, &pair.access_token)
            .and_then(|_| self.storage.set(REFRESH_TOKEN_KEY, &pair.refresh_token));
        if let Err(e) = written {
            tracing::warn!("[TokenStore] failed to persist token pair: {}", e);
            // never leave half a pair behind
            self.remove_pair();
            return;
        }
        if let Some(cookie) = &self.cookie {
            cookie.write(&pair.access_token);
        }
    }

    fn remove_pair(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            match self.storage.remove(key) {
                Ok(()) | Err(StorageError::Unavailable) => {}
                Err(e) => tracing::warn!("[TokenStore] failed to remove {}: {}", key, e),
            }
        }
        if let Some(cookie) = &self.cookie {
            cookie.expire();
        }
    }
}

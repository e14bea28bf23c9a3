//! Auth Session Manager
//!
//! Orchestrates login, registration, logout, silent refresh and "who am I"
//! lookups, and publishes the resulting `SessionState` to subscribers.
//!
//! ## Refresh coalescing
//! At most one `/auth/refresh` call is in flight per manager. The first
//! caller spawns the refresh as its own task and parks a shared handle in
//! `in_flight`; every caller that arrives before it settles awaits the same
//! handle and sees the same result. The task clears the slot itself when it
//! ends, even by panicking, so the next refresh after it settles starts
//! fresh. Because the refresh is a
//! spawned task it runs to completion even if every awaiting caller is
//! dropped.
//!
//! ## Ordering against logout
//! The refresh task remembers the token store epoch it started from and only
//! commits (store the new pair, or clear on failure) if nothing else mutated
//! the store in between. A logout or a fresh login racing a refresh always
//! wins.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use super::jwt;
use super::models::{
    AuthPayload, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, RefreshRequest,
    RegisterRequest, ResetPasswordRequest, TokenPair, User,
};
use super::token_store::{CookieMirror, TokenStore};
use crate::api::{ApiClient, ApiRequest, ClientError};
use crate::config::ClientConfig;
use crate::storage::KeyValueStorage;

/// Session as observed by the UI layer
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated(User),
    Refreshing,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

type RefreshHandle = Shared<BoxFuture<'static, Option<TokenPair>>>;

pub struct SessionManager {
    api: ApiClient,
    store: Arc<TokenStore>,
    state: Arc<watch::Sender<SessionState>>,
    in_flight: Arc<Mutex<Option<RefreshHandle>>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // refresh_token takes in_flight before the state lock; never hold
        // both here
        let state = self.state();
        let refresh_in_flight = self.in_flight.lock().is_some();
        f.debug_struct("SessionManager")
            .field("api", &self.api.base_url().as_str())
            .field("store", &self.store)
            .field("state", &state)
            .field("refresh_in_flight", &refresh_in_flight)
            .finish()
    }
}

impl SessionManager {
    pub fn new(api: ApiClient, store: TokenStore) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            api,
            store: Arc::new(store),
            state: Arc::new(state),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Wire an API client and token store from configuration, mirroring the
    /// access token into the client's cookie jar when enabled.
    pub fn from_config(
        config: &ClientConfig,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self, ClientError> {
        let api = ApiClient::new(config)?;
        let mut store = TokenStore::new(storage);
        if config.mirror_cookie {
            store = store.with_cookie_mirror(CookieMirror::new(
                api.cookie_jar(),
                api.base_url().clone(),
            ));
        }
        Ok(Self::new(api, store))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn publish(&self, next: SessionState) {
        publish(&self.state, next);
    }

    /// Storage-only check: an access token is present and unexpired.
    pub fn is_authenticated(&self) -> bool {
        self.store
            .access_token()
            .is_some_and(|token| jwt::is_token_valid(&token))
    }

    /// Resolve the session once at start-up.
    pub async fn bootstrap(&self) -> SessionState {
        self.get_current_user().await;
        self.state()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let request = ApiRequest::post("/auth/login").json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.authenticate(request, "login").await
    }

    pub async fn register(&self, fields: &RegisterRequest) -> Result<User, ClientError> {
        let request = ApiRequest::post("/auth/register").json(fields)?;
        self.authenticate(request, "register").await
    }

    async fn authenticate(&self, request: ApiRequest, action: &str) -> Result<User, ClientError> {
        self.publish(SessionState::Authenticating);
        match self.api.execute::<AuthPayload>(&request, None).await {
            Ok(payload) => {
                self.store.set_tokens(&payload.tokens);
                tracing::info!("[SessionManager] {} succeeded for {}", action, payload.user.email);
                self.publish(SessionState::Authenticated(payload.user.clone()));
                Ok(payload.user)
            }
            Err(e) => {
                tracing::warn!("[SessionManager] {} failed: {}", action, e);
                self.publish(SessionState::Unauthenticated);
                Err(e)
            }
        }
    }

    /// Local only; there is no server-side session to invalidate.
    pub fn logout(&self) {
        self.store.clear_tokens();
        self.publish(SessionState::Unauthenticated);
        tracing::info!("[SessionManager] logged out");
    }

    /// The signed-in user, or `None`. Never fails: errors on this path end
    /// in a logout (auth failures) or are logged (everything else).
    pub async fn get_current_user(&self) -> Option<User> {
        let Some(access_token) = self.store.access_token() else {
            self.publish(SessionState::Unauthenticated);
            return None;
        };

        if let SessionState::Authenticated(user) = self.state() {
            if jwt::is_token_valid(&access_token) {
                return Some(user);
            }
        }

        let epoch = self.store.epoch();
        match self.fetch_me(&access_token).await {
            Ok(user) => {
                self.publish(SessionState::Authenticated(user.clone()));
                Some(user)
            }
            Err(e) if e.is_authentication_error() => {
                tracing::debug!("[SessionManager] /auth/me rejected the access token, refreshing");
                let Some(tokens) = self.refresh_token().await else {
                    // a failed refresh clears the store itself; this covers a
                    // missing refresh token without touching a newer session
                    if self.store.clear_tokens_if(epoch) {
                        self.publish(SessionState::Unauthenticated);
                    }
                    return None;
                };
                match self.fetch_me(&tokens.access_token).await {
                    Ok(user) => {
                        self.publish(SessionState::Authenticated(user.clone()));
                        Some(user)
                    }
                    Err(e) => {
                        tracing::warn!("[SessionManager] /auth/me failed after refresh: {}", e);
                        self.logout();
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("[SessionManager] could not load current user: {}", e);
                None
            }
        }
    }

    async fn fetch_me(&self, access_token: &str) -> Result<User, ClientError> {
        self.api
            .execute(&ApiRequest::post("/auth/me"), Some(access_token))
            .await
    }

    /// Exchange the refresh token for a new pair. Concurrent callers share
    /// one backend call and receive the same result.
    pub async fn refresh_token(&self) -> Option<TokenPair> {
        self.store.refresh_token()?;

        let handle = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(handle) => handle.clone(),
                None => {
                    // epoch first: a login landing between the two reads
                    // then shows up as an epoch mismatch
                    let epoch = self.store.epoch();
                    let refresh_token = self.store.refresh_token()?;
                    self.publish(SessionState::Refreshing);
                    let task = tokio::spawn(run_refresh(
                        self.api.clone(),
                        self.store.clone(),
                        self.state.clone(),
                        self.in_flight.clone(),
                        refresh_token,
                        epoch,
                    ));
                    let handle = async move {
                        task.await.unwrap_or_else(|e| {
                            tracing::error!("[SessionManager] refresh task failed: {}", e);
                            None
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(handle.clone());
                    handle
                }
            }
        };

        handle.await
    }

    /// Send `request` with the bearer token; on 401 refresh once and retry
    /// once. Without a session, or when the refresh fails (which clears the
    /// tokens), `SessionExpired` is returned.
    pub async fn authorized<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, ClientError> {
        let Some(access_token) = self.store.access_token() else {
            return Err(ClientError::SessionExpired);
        };
        match self.api.execute(request, Some(&access_token)).await {
            Err(e) if e.is_authentication_error() => {
                let tokens = self.refresh_or_expire().await?;
                self.api.execute(request, Some(&tokens.access_token)).await
            }
            other => other,
        }
    }

    /// Like `authorized`, for endpoints that answer with a message only.
    pub async fn authorized_message(&self, request: &ApiRequest) -> Result<String, ClientError> {
        let Some(access_token) = self.store.access_token() else {
            return Err(ClientError::SessionExpired);
        };
        match self.api.execute_message(request, Some(&access_token)).await {
            Err(e) if e.is_authentication_error() => {
                let tokens = self.refresh_or_expire().await?;
                self.api
                    .execute_message(request, Some(&tokens.access_token))
                    .await
            }
            other => other,
        }
    }

    /// Attach the bearer token when a valid one is stored; never refresh.
    pub async fn optional_auth<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, ClientError> {
        let access_token = self
            .store
            .access_token()
            .filter(|token| jwt::is_token_valid(token));
        self.api.execute(request, access_token.as_deref()).await
    }

    async fn refresh_or_expire(&self) -> Result<TokenPair, ClientError> {
        self.refresh_token().await.ok_or(ClientError::SessionExpired)
    }

    /// Not retried; the backend's message is returned verbatim.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<String, ClientError> {
        let access_token = self
            .store
            .access_token()
            .ok_or(ClientError::SessionExpired)?;
        let request = ApiRequest::patch("/auth/change-password").json(&ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        })?;
        self.api.execute_message(&request, Some(&access_token)).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String, ClientError> {
        let request = ApiRequest::post("/auth/forgot-password").json(&ForgotPasswordRequest {
            email: email.to_string(),
        })?;
        self.api.execute_message(&request, None).await
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<String, ClientError> {
        let request = ApiRequest::post("/auth/reset-password").json(&ResetPasswordRequest {
            token: token.to_string(),
            password: password.to_string(),
        })?;
        self.api.execute_message(&request, None).await
    }
}

fn publish(state: &watch::Sender<SessionState>, next: SessionState) {
    state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

/// Clears the in-flight slot when the refresh task ends, however it ends.
/// A task that unwinds before settling also ends the session, unless a
/// logout or login already replaced the `Refreshing` state.
struct InFlightGuard {
    in_flight: Arc<Mutex<Option<RefreshHandle>>>,
    store: Arc<TokenStore>,
    state: Arc<watch::Sender<SessionState>>,
    settled: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().take();
        if self.settled {
            return;
        }
        tracing::error!("[SessionManager] refresh task ended without settling");
        let store = &self.store;
        self.state.send_if_modified(|current| {
            if *current != SessionState::Refreshing {
                return false;
            }
            store.clear_tokens();
            *current = SessionState::Unauthenticated;
            true
        });
    }
}

async fn run_refresh(
    api: ApiClient,
    store: Arc<TokenStore>,
    state: Arc<watch::Sender<SessionState>>,
    in_flight: Arc<Mutex<Option<RefreshHandle>>>,
    refresh_token: String,
    epoch: u64,
) -> Option<TokenPair> {
    let mut guard = InFlightGuard {
        in_flight,
        store: store.clone(),
        state: state.clone(),
        settled: false,
    };

    let outcome = match ApiRequest::post("/auth/refresh").json(&RefreshRequest { refresh_token }) {
        Ok(request) => api.execute::<AuthPayload>(&request, None).await,
        Err(e) => Err(e),
    };

    let result = match outcome {
        Ok(payload) => {
            if store.set_tokens_if(&payload.tokens, epoch) {
                tracing::info!("[SessionManager] token refreshed for {}", payload.user.email);
                publish(&state, SessionState::Authenticated(payload.user));
                Some(payload.tokens)
            } else {
                tracing::info!("[SessionManager] session changed during refresh, discarding new tokens");
                None
            }
        }
        Err(e) => {
            tracing::warn!("[SessionManager] token refresh failed: {}", e);
            if store.clear_tokens_if(epoch) {
                publish(&state, SessionState::Unauthenticated);
            }
            None
        }
    };

    guard.settled = true;
    result
}

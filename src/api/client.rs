//! API Client
//!
//! Thin reqwest wrapper that knows the backend's base URL, attaches bearer
//! tokens, unwraps the response envelope and turns non-2xx answers into
//! classified `HttpError`s.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::envelope::ApiResponse;
use super::error::{ClientError, HttpError};
use crate::config::ClientConfig;

/// A request relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Adds the pair only when a value is present.
    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }
}

/// Cloning is cheap; clones share the connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    cookies: Arc<Jar>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let cookies = Arc::new(Jar::default());
        let http = Client::builder()
            .timeout(config.request_timeout)
            .cookie_provider(cookies.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            cookies,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Jar shared with the underlying HTTP client.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.cookies.clone()
    }

    /// Builds the absolute URL for `path`, keeping the base URL's own path
    /// prefix (e.g. `/api/v1`).
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Sends `request` and returns the envelope's `data`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<T, ClientError> {
        let envelope = self.dispatch::<T>(request, bearer).await?;
        envelope.data.ok_or(ClientError::MissingData)
    }

    /// Sends `request` and returns the envelope's `message`, for endpoints
    /// that answer without data.
    pub async fn execute_message(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<String, ClientError> {
        let envelope = self.dispatch::<Value>(request, bearer).await?;
        Ok(envelope.message)
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse<T>, ClientError> {
        let url = self.endpoint(&request.path)?;
        tracing::debug!("[ApiClient] {} {}", request.method, url);

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let error = serde_json::from_slice::<ApiResponse<Value>>(&bytes)
                .ok()
                .filter(|envelope| !envelope.message.is_empty())
                .map(|envelope| HttpError::new(status.as_u16(), envelope.message))
                .unwrap_or_else(|| HttpError::from_status(status));
            tracing::debug!(
                "[ApiClient] {} {} failed with {}: {}",
                request.method,
                request.path,
                error.status,
                error.message
            );
            return Err(error.into());
        }

        let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)?;
        if !envelope.success {
            return Err(ClientError::Api(envelope.message));
        }
        Ok(envelope)
    }
}

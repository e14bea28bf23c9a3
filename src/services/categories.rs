//! Category listing.

use std::sync::Arc;

use crate::api::{ApiRequest, ClientError};
use crate::auth::SessionManager;

use super::models::Category;

#[derive(Debug, Clone)]
pub struct CategoryService {
    session: Arc<SessionManager>,
}

impl CategoryService {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn list(&self) -> Result<Vec<Category>, ClientError> {
        self.session
            .optional_auth(&ApiRequest::get("/categories"))
            .await
    }
}

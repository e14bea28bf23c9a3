//! Admin Moderation Service
//!
//! Dashboard statistics, user management and recipe moderation. The backend
//! decides who is an admin; a non-admin caller gets a 403 `HttpError`.

use std::sync::Arc;

use crate::api::{ApiRequest, ClientError};
use crate::auth::SessionManager;
use crate::auth::models::{Role, User};

use super::models::{DashboardStats, RoleChange, UserList};

#[derive(Debug, Clone)]
pub struct AdminService {
    session: Arc<SessionManager>,
}

impl AdminService {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn stats(&self) -> Result<DashboardStats, ClientError> {
        self.session.authorized(&ApiRequest::get("/admin/stats")).await
    }

    pub async fn users(&self, page: Option<u32>, limit: Option<u32>) -> Result<UserList, ClientError> {
        let request = ApiRequest::get("/admin/users")
            .query_opt("page", page)
            .query_opt("limit", limit);
        self.session.authorized(&request).await
    }

    pub async fn set_role(&self, user_id: &str, role: Role) -> Result<User, ClientError> {
        let request = ApiRequest::patch(format!("/admin/users/{user_id}/role")).json(&RoleChange { role })?;
        tracing::info!("[AdminService] setting role of {} to {}", user_id, role);
        self.session.authorized(&request).await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<String, ClientError> {
        tracing::info!("[AdminService] deleting user {}", user_id);
        self.session
            .authorized_message(&ApiRequest::delete(format!("/admin/users/{user_id}")))
            .await
    }

    pub async fn delete_recipe(&self, recipe_id: &str) -> Result<String, ClientError> {
        tracing::info!("[AdminService] removing recipe {}", recipe_id);
        self.session
            .authorized_message(&ApiRequest::delete(format!("/admin/recipes/{recipe_id}")))
            .await
    }
}

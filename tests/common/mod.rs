//! In-process mock of the recipe backend.
//!
//! Mints real HS256 tokens, enforces expiry with zero leeway, rotates
//! refresh tokens, and counts every call so tests can assert how many
//! network round trips the client made.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use uuid::Uuid;

use recipe_client::api::ApiResponse;
use recipe_client::storage::{KeyValueStorage, MemoryStorage};
use recipe_client::{ClientConfig, SessionManager, TokenPair};

pub const EMAIL: &str = "test@example.com";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "password123";
const SECRET: &[u8] = b"mock-backend-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MockClaims {
    sub: String,
    role: String,
    exp: i64,
    iat: i64,
    jti: String,
}

type Reply = (StatusCode, Json<ApiResponse<Value>>);

fn ok(message: &str, data: Value) -> Reply {
    (StatusCode::OK, Json(ApiResponse::ok(message, data)))
}

fn created(message: &str, data: Value) -> Reply {
    (StatusCode::CREATED, Json(ApiResponse::ok(message, data)))
}

fn ok_message(message: &str) -> Reply {
    let body = ApiResponse {
        success: true,
        message: message.to_string(),
        data: None,
    };
    (StatusCode::OK, Json(body))
}

fn fail(status: StatusCode, message: &str) -> Reply {
    (status, Json(ApiResponse::failure(message)))
}

fn unauthorized() -> Reply {
    fail(StatusCode::UNAUTHORIZED, "Invalid or expired token")
}

#[derive(Default)]
pub struct Calls {
    pub login: AtomicUsize,
    pub register: AtomicUsize,
    pub me: AtomicUsize,
    pub refresh: AtomicUsize,
    pub recipes: AtomicUsize,
    pub admin: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        [&self.login, &self.register, &self.me, &self.refresh, &self.recipes, &self.admin]
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }
}

pub struct MockState {
    pub calls: Calls,
    pub refresh_delay: Mutex<Duration>,
    pub revoke_refresh: AtomicBool,
    /// Lifetime of newly minted access tokens, in seconds
    pub access_ttl: Mutex<i64>,
    /// Served as the access token of every refresh instead of a minted one
    pub refresh_access_override: Mutex<Option<String>>,
    /// Forced status for every `/auth/me` call
    pub me_status: Mutex<Option<StatusCode>>,
    /// Live refresh tokens and the role they were issued for
    pub refresh_tokens: Mutex<HashMap<String, String>>,
    pub last_query: Mutex<HashMap<String, String>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            calls: Calls::default(),
            refresh_delay: Mutex::new(Duration::ZERO),
            revoke_refresh: AtomicBool::new(false),
            access_ttl: Mutex::new(900),
            refresh_access_override: Mutex::new(None),
            me_status: Mutex::new(None),
            refresh_tokens: Mutex::new(HashMap::new()),
            last_query: Mutex::new(HashMap::new()),
        }
    }

    pub fn mint_access(&self, role: &str, ttl_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = MockClaims {
            sub: "u1".into(),
            role: role.into(),
            exp: now + ttl_secs,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn remember_refresh(&self, role: &str) -> String {
        let refresh_token = format!("refresh-{}", Uuid::new_v4());
        self.refresh_tokens
            .lock()
            .insert(refresh_token.clone(), role.to_string());
        refresh_token
    }

    pub fn issue_pair(&self, role: &str) -> TokenPair {
        let ttl = *self.access_ttl.lock();
        TokenPair {
            access_token: self.mint_access(role, ttl),
            refresh_token: self.remember_refresh(role),
        }
    }

    /// A pair whose access token already expired but whose refresh token
    /// the backend still honors.
    pub fn expired_pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.mint_access("user", -120),
            refresh_token: self.remember_refresh("user"),
        }
    }

    fn authorize(&self, headers: &HeaderMap, jar: &CookieJar) -> Option<MockClaims> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
            .or_else(|| jar.get("access_token").map(|c| c.value().to_string()))?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<MockClaims>(&token, &DecodingKey::from_secret(SECRET), &validation)
            .ok()
            .map(|data| data.claims)
    }
}

pub fn user_json(email: &str, first_name: &str, role: &str) -> Value {
    json!({
        "id": "u1",
        "firstName": first_name,
        "lastName": "User",
        "email": email,
        "role": role,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

fn recipe_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "Weeknight dinner",
        "ingredients": [{ "name": "spaghetti", "amount": "200", "unit": "g" }],
        "instructions": ["Boil water", "Cook pasta"],
        "prepTime": 5,
        "cookTime": 10,
        "servings": 2,
        "difficulty": "easy",
        "category": "c1",
        "tags": ["quick"],
        "authorId": "u1",
        "averageRating": 4.5,
        "ratingCount": 2,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

fn rating_json(recipe_id: &str, rating: u64, comment: Option<&str>) -> Value {
    json!({
        "id": "rt1",
        "recipeId": recipe_id,
        "userId": "u1",
        "rating": rating,
        "comment": comment,
        "createdAt": "2024-01-02T00:00:00Z"
    })
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    state.calls.login.fetch_add(1, Ordering::SeqCst);
    let role = match body["email"].as_str() {
        Some(EMAIL) => "user",
        Some(ADMIN_EMAIL) => "admin",
        _ => return fail(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    };
    if body["password"] != PASSWORD {
        return fail(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }
    let email = body["email"].as_str().unwrap_or_default();
    let tokens = state.issue_pair(role);
    ok("Login successful", json!({ "user": user_json(email, "Test", role), "tokens": tokens }))
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    state.calls.register.fetch_add(1, Ordering::SeqCst);
    let Some(email) = body["email"].as_str() else {
        return fail(StatusCode::BAD_REQUEST, "Email is required");
    };
    if email == EMAIL || email == ADMIN_EMAIL {
        return fail(StatusCode::CONFLICT, "Email already registered");
    }
    let first_name = body["firstName"].as_str().unwrap_or("New");
    let tokens = state.issue_pair("user");
    created(
        "Registration successful",
        json!({ "user": user_json(email, first_name, "user"), "tokens": tokens }),
    )
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap, jar: CookieJar) -> Reply {
    state.calls.me.fetch_add(1, Ordering::SeqCst);
    let forced = *state.me_status.lock();
    match forced {
        Some(StatusCode::UNAUTHORIZED) => return unauthorized(),
        Some(status) => return fail(status, "Service unavailable"),
        None => {}
    }
    match state.authorize(&headers, &jar) {
        Some(claims) => {
            let email = if claims.role == "admin" { ADMIN_EMAIL } else { EMAIL };
            ok("User retrieved", user_json(email, "Test", &claims.role))
        }
        None => unauthorized(),
    }
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    state.calls.refresh.fetch_add(1, Ordering::SeqCst);
    let delay = *state.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    let role = state.refresh_tokens.lock().remove(&presented);
    let role = match role {
        Some(role) if !state.revoke_refresh.load(Ordering::SeqCst) => role,
        _ => return fail(StatusCode::UNAUTHORIZED, "Invalid refresh token"),
    };
    let mut tokens = state.issue_pair(&role);
    if let Some(access_token) = state.refresh_access_override.lock().clone() {
        tokens.access_token = access_token;
    }
    ok(
        "Token refreshed",
        json!({ "tokens": tokens, "user": user_json(EMAIL, "Refreshed", &role) }),
    )
}

async fn change_password(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<Value>,
) -> Reply {
    if state.authorize(&headers, &jar).is_none() {
        return unauthorized();
    }
    if body["currentPassword"] != PASSWORD {
        return fail(StatusCode::BAD_REQUEST, "Current password is incorrect");
    }
    ok_message("Password updated successfully")
}

async fn forgot_password(Json(_body): Json<Value>) -> Reply {
    ok_message("If that email exists, a reset link has been sent")
}

async fn reset_password(Json(body): Json<Value>) -> Reply {
    if body["token"] != "reset-token" {
        return fail(StatusCode::BAD_REQUEST, "Invalid or expired reset token");
    }
    ok_message("Password has been reset")
}

async fn list_recipes(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    let title = query.get("search").cloned().unwrap_or_else(|| "Pasta".into());
    *state.last_query.lock() = query;
    ok(
        "Recipes retrieved",
        json!({
            "recipes": [recipe_json("r1", &title)],
            "pagination": { "page": 1, "limit": 10, "total": 1, "pages": 1 }
        }),
    )
}

async fn get_recipe(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    if id != "r1" {
        return fail(StatusCode::NOT_FOUND, "Recipe not found");
    }
    ok("Recipe retrieved", recipe_json("r1", "Pasta"))
}

async fn create_recipe(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<Value>,
) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    if state.authorize(&headers, &jar).is_none() {
        return unauthorized();
    }
    let title = body["title"].as_str().unwrap_or("Untitled");
    created("Recipe created", recipe_json("r2", title))
}

async fn update_recipe(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    if state.authorize(&headers, &jar).is_none() {
        return unauthorized();
    }
    let title = body["title"].as_str().unwrap_or("Pasta");
    ok("Recipe updated", recipe_json(&id, title))
}

async fn delete_recipe(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(_id): Path<String>,
) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    if state.authorize(&headers, &jar).is_none() {
        return unauthorized();
    }
    ok_message("Recipe deleted")
}

async fn favorites(State(state): State<Arc<MockState>>, headers: HeaderMap, jar: CookieJar) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    if state.authorize(&headers, &jar).is_none() {
        return unauthorized();
    }
    let mut favorite = recipe_json("r1", "Pasta");
    favorite["isFavorite"] = json!(true);
    ok("Favorites retrieved", json!([favorite]))
}

async fn favorite(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(_id): Path<String>,
) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    if state.authorize(&headers, &jar).is_none() {
        return unauthorized();
    }
    ok_message("Recipe added to favorites")
}

async fn unfavorite(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(_id): Path<String>,
) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    if state.authorize(&headers, &jar).is_none() {
        return unauthorized();
    }
    ok_message("Recipe removed from favorites")
}

async fn list_ratings(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    ok("Ratings retrieved", json!([rating_json(&id, 4, Some("Lovely"))]))
}

async fn rate(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    state.calls.recipes.fetch_add(1, Ordering::SeqCst);
    if state.authorize(&headers, &jar).is_none() {
        return unauthorized();
    }
    let rating = body["rating"].as_u64().unwrap_or_default();
    created("Rating saved", rating_json(&id, rating, body["comment"].as_str()))
}

async fn categories() -> Reply {
    ok(
        "Categories retrieved",
        json!([{ "id": "c1", "name": "Dinner", "recipeCount": 12 }]),
    )
}

/// Counts the call and checks for a live admin token
fn admin_gate(state: &MockState, headers: &HeaderMap, jar: &CookieJar) -> Result<(), Reply> {
    state.calls.admin.fetch_add(1, Ordering::SeqCst);
    match state.authorize(headers, jar) {
        None => Err(unauthorized()),
        Some(claims) if claims.role != "admin" => {
            Err(fail(StatusCode::FORBIDDEN, "Admin access required"))
        }
        Some(_) => Ok(()),
    }
}

async fn admin_stats(State(state): State<Arc<MockState>>, headers: HeaderMap, jar: CookieJar) -> Reply {
    if let Err(reply) = admin_gate(&state, &headers, &jar) {
        return reply;
    }
    ok(
        "Stats retrieved",
        json!({ "totalUsers": 3, "totalRecipes": 12, "totalRatings": 40, "newUsersThisWeek": 1 }),
    )
}

async fn admin_users(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if let Err(reply) = admin_gate(&state, &headers, &jar) {
        return reply;
    }
    let page: u32 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    *state.last_query.lock() = query;
    ok(
        "Users retrieved",
        json!({
            "users": [user_json(EMAIL, "Test", "user"), user_json(ADMIN_EMAIL, "Test", "admin")],
            "pagination": { "page": page, "limit": 20, "total": 2, "pages": 1 }
        }),
    )
}

async fn admin_set_role(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(reply) = admin_gate(&state, &headers, &jar) {
        return reply;
    }
    let role = body["role"].as_str().unwrap_or("user");
    ok("Role updated", user_json(EMAIL, "Test", role))
}

async fn admin_delete_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(_id): Path<String>,
) -> Reply {
    if let Err(reply) = admin_gate(&state, &headers, &jar) {
        return reply;
    }
    ok_message("User deleted")
}

async fn admin_delete_recipe(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(_id): Path<String>,
) -> Reply {
    if let Err(reply) = admin_gate(&state, &headers, &jar) {
        return reply;
    }
    ok_message("Recipe removed")
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let app = Router::new()
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/register", post(register))
            .route("/api/v1/auth/me", post(me))
            .route("/api/v1/auth/refresh", post(refresh))
            .route("/api/v1/auth/change-password", patch(change_password))
            .route("/api/v1/auth/forgot-password", post(forgot_password))
            .route("/api/v1/auth/reset-password", post(reset_password))
            .route("/api/v1/recipes", get(list_recipes).post(create_recipe))
            .route(
                "/api/v1/recipes/{id}",
                get(get_recipe).put(update_recipe).delete(delete_recipe),
            )
            .route("/api/v1/recipes/{id}/favorite", post(favorite).delete(unfavorite))
            .route("/api/v1/recipes/{id}/ratings", get(list_ratings).post(rate))
            .route("/api/v1/users/me/favorites", get(favorites))
            .route("/api/v1/categories", get(categories))
            .route("/api/v1/admin/stats", get(admin_stats))
            .route("/api/v1/admin/users", get(admin_users))
            .route("/api/v1/admin/users/{id}", delete(admin_delete_user))
            .route("/api/v1/admin/users/{id}/role", patch(admin_set_role))
            .route("/api/v1/admin/recipes/{id}", delete(admin_delete_recipe))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api/v1"),
            state,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.base_url.parse().unwrap(),
            request_timeout: Duration::from_secs(5),
            token_file: "unused.json".into(),
            mirror_cookie: true,
        }
    }

    pub fn session(&self) -> SessionManager {
        self.session_with(Arc::new(MemoryStorage::new()))
    }

    pub fn session_with(&self, storage: Arc<dyn KeyValueStorage>) -> SessionManager {
        SessionManager::from_config(&self.config(), storage).unwrap()
    }

    pub fn calls(&self) -> &Calls {
        &self.state.calls
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock() = delay;
    }

    pub fn force_me_status(&self, status: StatusCode) {
        *self.state.me_status.lock() = Some(status);
    }
}

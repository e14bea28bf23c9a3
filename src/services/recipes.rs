//! Recipe Service
//!
//! Recipe CRUD, search, favorites and ratings. Reads go out with the bearer
//! token when one is valid (so `isFavorite` is filled in) and are never
//! retried; writes require a session and get one refresh-and-retry on 401.

use std::sync::Arc;

use crate::api::{ApiRequest, ClientError};
use crate::auth::SessionManager;

use super::models::{NewRating, NewRecipe, Rating, Recipe, RecipePage, RecipeQuery, RecipeUpdate};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone)]
pub struct RecipeService {
    session: Arc<SessionManager>,
}

impl RecipeService {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn list(&self, query: &RecipeQuery) -> Result<RecipePage, ClientError> {
        self.session.optional_auth(&list_request(query)).await
    }

    pub async fn get(&self, id: &str) -> Result<Recipe, ClientError> {
        self.session
            .optional_auth(&ApiRequest::get(format!("/recipes/{id}")))
            .await
    }

    pub async fn create(&self, recipe: &NewRecipe) -> Result<Recipe, ClientError> {
        validate_new_recipe(recipe)?;
        let request = ApiRequest::post("/recipes").json(recipe)?;
        self.session.authorized(&request).await
    }

    pub async fn update(&self, id: &str, changes: &RecipeUpdate) -> Result<Recipe, ClientError> {
        let request = ApiRequest::put(format!("/recipes/{id}")).json(changes)?;
        self.session.authorized(&request).await
    }

    pub async fn delete(&self, id: &str) -> Result<String, ClientError> {
        self.session
            .authorized_message(&ApiRequest::delete(format!("/recipes/{id}")))
            .await
    }

    pub async fn favorites(&self) -> Result<Vec<Recipe>, ClientError> {
        self.session
            .authorized(&ApiRequest::get("/users/me/favorites"))
            .await
    }

    pub async fn add_favorite(&self, id: &str) -> Result<String, ClientError> {
        self.session
            .authorized_message(&ApiRequest::post(format!("/recipes/{id}/favorite")))
            .await
    }

    pub async fn remove_favorite(&self, id: &str) -> Result<String, ClientError> {
        self.session
            .authorized_message(&ApiRequest::delete(format!("/recipes/{id}/favorite")))
            .await
    }

    pub async fn rate(&self, id: &str, rating: &NewRating) -> Result<Rating, ClientError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating.rating) {
            return Err(ClientError::Validation(format!(
                "Rating must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        let request = ApiRequest::post(format!("/recipes/{id}/ratings")).json(rating)?;
        self.session.authorized(&request).await
    }

    pub async fn ratings(&self, id: &str) -> Result<Vec<Rating>, ClientError> {
        self.session
            .optional_auth(&ApiRequest::get(format!("/recipes/{id}/ratings")))
            .await
    }
}

fn list_request(query: &RecipeQuery) -> ApiRequest {
    let tags = (!query.tags.is_empty()).then(|| query.tags.join(","));
    ApiRequest::get("/recipes")
        .query_opt("search", query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .query_opt("category", query.category.as_deref())
        .query_opt("difficulty", query.difficulty)
        .query_opt("tags", tags)
        .query_opt("page", query.page)
        .query_opt("limit", query.limit)
        .query_opt("sort", query.sort.as_deref())
}

fn validate_new_recipe(recipe: &NewRecipe) -> Result<(), ClientError> {
    if recipe.title.trim().is_empty() {
        return Err(ClientError::Validation("Title is required".into()));
    }
    if recipe.ingredients.is_empty() {
        return Err(ClientError::Validation("At least one ingredient is required".into()));
    }
    if recipe.instructions.is_empty() {
        return Err(ClientError::Validation("At least one instruction is required".into()));
    }
    if recipe.servings == 0 {
        return Err(ClientError::Validation("Servings must be at least 1".into()));
    }
    Ok(())
}

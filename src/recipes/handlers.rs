use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiJson, ApiPath, ApiQuery, ApiResult},
    recipes::{
        dto::{CreateRecipeRequest, Pagination, RecipeList, RecipePage, SearchQuery},
        repo_types::Recipe,
        services,
    },
    state::AppState,
};

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/search", get(search_recipes))
        .route("/recipes/:id", get(get_recipe).delete(delete_recipe))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> ApiResult<Json<RecipePage>> {
    Ok(Json(services::list(state.recipes.as_ref(), p).await?))
}

#[instrument(skip(state))]
pub async fn search_recipes(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<SearchQuery>,
) -> ApiResult<Json<RecipeList>> {
    let recipes = services::search(state.recipes.as_ref(), q.ingredient.as_deref()).await?;
    Ok(Json(RecipeList { recipes }))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Recipe>> {
    Ok(Json(services::get(state.recipes.as_ref(), id).await?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, username = %user.username))]
pub async fn create_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateRecipeRequest>,
) -> ApiResult<(StatusCode, HeaderMap, Json<Recipe>)> {
    let recipe = services::create(state.recipes.as_ref(), body, user.id).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/recipes/{}", recipe.id).parse() {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(recipe)))
}

#[instrument(skip(state, user), fields(user_id = %user.id, username = %user.username))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    services::delete(state.recipes.as_ref(), id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

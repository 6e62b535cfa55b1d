use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    recipes::{
        dto::{CreateRecipeRequest, Pagination, RecipePage},
        repo::RecipeRepo,
        repo_types::{NewRecipe, Recipe},
    },
};

pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_SEARCH_RESULTS: i64 = 100;

const MIN_NAME_LEN: usize = 3;
const MIN_INGREDIENTS_LEN: usize = 3;
const MIN_INSTRUCTIONS_LEN: usize = 10;

pub(crate) fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}

/// Splits `a, b,,c` into trimmed non-empty terms.
pub(crate) fn parse_terms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn required(field: &str, value: &str, min: usize) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    if value.chars().count() < min {
        return Err(ApiError::BadRequest(format!(
            "{} must be at least {} characters",
            field, min
        )));
    }
    Ok(value.to_string())
}

fn at_least(field: &str, value: Option<i32>, min: i32) -> ApiResult<Option<i32>> {
    match value {
        Some(v) if v < min => Err(ApiError::BadRequest(format!(
            "{} must be at least {}",
            field, min
        ))),
        other => Ok(other),
    }
}

pub(crate) fn validate(req: CreateRecipeRequest) -> ApiResult<NewRecipe> {
    let thumbnail_url = match req.thumbnail_url.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            Some(url.to_string())
        }
        Some(_) => {
            return Err(ApiError::BadRequest(
                "thumbnail_url must be an http(s) URL".into(),
            ))
        }
    };
    Ok(NewRecipe {
        name: required("name", &req.name, MIN_NAME_LEN)?,
        ingredients: required("ingredients", &req.ingredients, MIN_INGREDIENTS_LEN)?,
        instructions: required("instructions", &req.instructions, MIN_INSTRUCTIONS_LEN)?,
        prep_time: at_least("prep_time", req.prep_time, 0)?,
        cook_time: at_least("cook_time", req.cook_time, 0)?,
        servings: at_least("servings", req.servings, 1)?,
        thumbnail_url,
    })
}

pub async fn list(repo: &dyn RecipeRepo, p: Pagination) -> ApiResult<RecipePage> {
    if p.page < 1 {
        return Err(ApiError::BadRequest("page must be at least 1".into()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&p.limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    let offset = (p.page - 1).saturating_mul(p.limit);
    let (recipes, total) = repo.list(p.limit, offset).await?;
    Ok(RecipePage {
        recipes,
        page: p.page,
        limit: p.limit,
        total,
        total_pages: total_pages(total, p.limit),
    })
}

pub async fn search(repo: &dyn RecipeRepo, ingredient: Option<&str>) -> ApiResult<Vec<Recipe>> {
    let terms = parse_terms(ingredient.unwrap_or_default());
    if terms.is_empty() {
        return Err(ApiError::BadRequest("ingredient query parameter is required".into()));
    }
    Ok(repo.search(&terms, MAX_SEARCH_RESULTS).await?)
}

pub async fn get(repo: &dyn RecipeRepo, id: Uuid) -> ApiResult<Recipe> {
    repo.get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Recipe not found".into()))
}

pub async fn create(
    repo: &dyn RecipeRepo,
    req: CreateRecipeRequest,
    owner: Uuid,
) -> ApiResult<Recipe> {
    let new = validate(req)?;
    let recipe = repo.create(new, owner).await?;
    info!(recipe_id = %recipe.id, user_id = %owner, "recipe created");
    Ok(recipe)
}

pub async fn delete(repo: &dyn RecipeRepo, id: Uuid, requester: Uuid) -> ApiResult<()> {
    let recipe = get(repo, id).await?;
    if recipe.user_id != Some(requester) {
        warn!(recipe_id = %id, user_id = %requester, "delete by non-owner");
        return Err(ApiError::Forbidden(
            "You can only delete your own recipes".into(),
        ));
    }
    if !repo.delete_owned(id, requester).await? {
        return Err(ApiError::NotFound("Recipe not found".into()));
    }
    info!(recipe_id = %id, user_id = %requester, "recipe deleted");
    Ok(())
}

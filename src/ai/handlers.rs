use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    ai::{
        client::ChatMessage,
        dto::{AskRequest, CompletionResponse, SuggestRequest},
        prompts,
    },
    error::{ApiError, ApiJson, ApiResult},
    state::AppState,
};

pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/ask-ai", post(ask_ai))
        .route("/ai/search-recipes", post(suggest_recipes))
}

/// Takes one token from the shared AI bucket or rejects the request.
pub(crate) fn admit(state: &AppState) -> ApiResult<()> {
    if state.ai_limiter.try_acquire() {
        Ok(())
    } else {
        warn!("ai rate limit exhausted");
        Err(ApiError::TooManyRequests)
    }
}

#[instrument(skip(state, body))]
pub async fn ask_ai(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AskRequest>,
) -> ApiResult<Json<CompletionResponse>> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt is required".into()));
    }
    if prompt.chars().count() > prompts::MAX_PROMPT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "prompt must be at most {} characters",
            prompts::MAX_PROMPT_CHARS
        )));
    }
    admit(&state)?;

    let response = state
        .ai
        .complete(vec![
            ChatMessage::system(prompts::COOKING_ASSISTANT),
            ChatMessage::user(prompt),
        ])
        .await?;
    info!(provider = state.ai.provider_name(), "ask-ai answered");
    Ok(Json(CompletionResponse { response }))
}

#[instrument(skip(state, body))]
pub async fn suggest_recipes(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SuggestRequest>,
) -> ApiResult<Json<CompletionResponse>> {
    let ingredients = body
        .ingredients
        .map(|i| i.into_terms())
        .unwrap_or_default();
    if ingredients.is_empty() {
        return Err(ApiError::BadRequest("ingredients are required".into()));
    }
    admit(&state)?;

    let response = state
        .ai
        .complete(vec![
            ChatMessage::system(prompts::COOKING_ASSISTANT),
            ChatMessage::user(prompts::recipe_suggestions(&ingredients)),
        ])
        .await?;
    info!(count = ingredients.len(), "recipe suggestions answered");
    Ok(Json(CompletionResponse { response }))
}

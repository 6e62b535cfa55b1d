use axum::{
    extract::{DefaultBodyLimit, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    ai::{client::ChatMessage, dto::CompletionResponse, handlers::admit, prompts},
    error::{ApiError, ApiJson, ApiResult},
    state::AppState,
    vision::{
        dto::{AnalyzeImageRequest, PredictRequest, PredictResponse},
        model::VisionError,
        preprocess::{decode_base64_image, preprocess, to_data_url},
    },
};

const MAX_IMAGE_BODY: usize = 10 * 1024 * 1024;

pub fn vision_routes() -> Router<AppState> {
    Router::new()
        .route("/predict/predict", post(predict))
        .route("/openrouter/analyze-image", post(analyze_image))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BODY))
}

#[instrument(skip(state, body))]
pub async fn predict(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PredictRequest>,
) -> ApiResult<Json<PredictResponse>> {
    let bytes = decode_base64_image(&body.image).map_err(VisionError::from)?;
    let tensor = tokio::task::spawn_blocking(move || preprocess(&bytes))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(VisionError::from)?;

    let ingredients = state.classifier.ingredients(&tensor).await?;
    info!(count = ingredients.len(), "image classified");
    Ok(Json(PredictResponse { ingredients }))
}

#[instrument(skip(state, body))]
pub async fn analyze_image(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AnalyzeImageRequest>,
) -> ApiResult<Json<CompletionResponse>> {
    let bytes = decode_base64_image(&body.image).map_err(VisionError::from)?;
    let data_url = to_data_url(&bytes).map_err(VisionError::from)?;
    let prompt = body
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(prompts::INGREDIENT_SPOTTER);
    if prompt.chars().count() > prompts::MAX_PROMPT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "prompt must be at most {} characters",
            prompts::MAX_PROMPT_CHARS
        )));
    }
    admit(&state)?;

    let response = state
        .vision_ai
        .complete(vec![ChatMessage::user_with_image(prompt, data_url)])
        .await?;
    info!(provider = state.vision_ai.provider_name(), "image analyzed");
    Ok(Json(CompletionResponse { response }))
}

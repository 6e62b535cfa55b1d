pub mod client;
pub(crate) mod dto;
pub mod handlers;
pub mod prompts;
pub mod rate_limit;

pub use client::{ChatCompletion, OpenAiCompatClient};
pub use rate_limit::TokenBucket;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::ai_routes()
}

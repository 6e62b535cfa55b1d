mod dto;
pub mod handlers;
pub mod model;
pub mod preprocess;
pub mod remote;
pub mod vocabulary;

pub use model::ClassifierService;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::vision_routes()
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub ingredients: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeImageRequest {
    #[serde(default)]
    pub image: String,
    pub prompt: Option<String>,
}

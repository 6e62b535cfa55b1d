use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    error::ApiError,
    vision::{
        preprocess::{ImageInputError, ImageTensor},
        vocabulary::map_to_ingredients,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    pub score: f32,
}

/// A loaded, pre-trained image classifier.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Scores for every class the model knows.
    async fn classify(&self, input: &ImageTensor) -> anyhow::Result<Vec<Prediction>>;
}

#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<Arc<dyn ImageModel>>;
}

#[derive(Debug, Error)]
pub enum VisionError {
    #[error(transparent)]
    InvalidImage(#[from] ImageInputError),
    #[error("image model unavailable: {0}")]
    ModelUnavailable(anyhow::Error),
    #[error("inference failed: {0}")]
    Inference(anyhow::Error),
}

impl From<VisionError> for ApiError {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::InvalidImage(e) => ApiError::BadRequest(e.to_string()),
            VisionError::ModelUnavailable(e) => {
                warn!(error = %e, "image model unavailable");
                ApiError::ServiceUnavailable("The image classifier is unavailable".into())
            }
            VisionError::Inference(e) => {
                warn!(error = %e, "image inference failed");
                ApiError::BadGateway("The image classifier failed".into())
            }
        }
    }
}

/// Owns the model lifecycle: loads on first use, caches, shares read-only.
/// A failed load leaves the cache empty so the next request retries.
pub struct ClassifierService {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn ImageModel>>,
    top_k: usize,
    min_score: f32,
}

impl ClassifierService {
    pub fn new(loader: Arc<dyn ModelLoader>, top_k: usize, min_score: f32) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
            top_k,
            min_score,
        }
    }

    pub async fn model(&self) -> Result<Arc<dyn ImageModel>, VisionError> {
        self.model
            .get_or_try_init(|| async {
                info!("loading image model");
                let model = self.loader.load().await?;
                info!("image model loaded");
                Ok::<_, anyhow::Error>(model)
            })
            .await
            .cloned()
            .map_err(VisionError::ModelUnavailable)
    }

    pub async fn ingredients(&self, input: &ImageTensor) -> Result<Vec<String>, VisionError> {
        let model = self.model().await?;
        let scores = model.classify(input).await.map_err(VisionError::Inference)?;
        let top = top_k(scores, self.top_k, self.min_score);
        debug!(?top, "top predictions");
        Ok(map_to_ingredients(top.iter().map(|p| p.class_name.as_str())))
    }
}

/// Highest-scoring `k` predictions at or above `min_score`, best first.
pub fn top_k(mut predictions: Vec<Prediction>, k: usize, min_score: f32) -> Vec<Prediction> {
    predictions.retain(|p| p.score.is_finite() && p.score >= min_score);
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
    predictions.truncate(k);
    predictions
}

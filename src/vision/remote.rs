//! Image model served behind a TensorFlow Serving style REST API.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::ClassifierConfig,
    vision::{
        model::{ImageModel, ModelLoader, Prediction},
        preprocess::ImageTensor,
    },
};

pub struct RemoteModelLoader {
    client: reqwest::Client,
    model_url: String,
    labels_path: String,
}

impl RemoteModelLoader {
    pub fn new(cfg: &ClassifierConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model_url: format!("{}/v1/models/{}", cfg.url.trim_end_matches('/'), cfg.model),
            labels_path: cfg.labels_path.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ModelStatus {
    #[serde(default)]
    model_version_status: Vec<VersionStatus>,
}

#[derive(Debug, Deserialize)]
struct VersionStatus {
    state: String,
}

/// One class name per line; blank lines are skipped.
pub(crate) fn parse_labels(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ModelLoader for RemoteModelLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn ImageModel>> {
        let raw = tokio::fs::read_to_string(&self.labels_path)
            .await
            .with_context(|| format!("read labels {}", self.labels_path))?;
        let labels = parse_labels(&raw);
        anyhow::ensure!(!labels.is_empty(), "labels file {} is empty", self.labels_path);

        let status: ModelStatus = self
            .client
            .get(&self.model_url)
            .send()
            .await
            .context("query model status")?
            .error_for_status()
            .context("model status")?
            .json()
            .await
            .context("decode model status")?;
        anyhow::ensure!(
            status
                .model_version_status
                .iter()
                .any(|v| v.state.eq_ignore_ascii_case("AVAILABLE")),
            "no available version of {}",
            self.model_url
        );

        debug!(labels = labels.len(), url = %self.model_url, "remote model ready");
        Ok(Arc::new(RemoteModel {
            client: self.client.clone(),
            predict_url: format!("{}:predict", self.model_url),
            labels,
        }))
    }
}

pub struct RemoteModel {
    client: reqwest::Client,
    predict_url: String,
    labels: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<Vec<Vec<[f32; 3]>>>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

/// Pairs scores with labels. Models trained with a leading background
/// class emit one score more than there are labels; that score is dropped.
pub(crate) fn label_scores(labels: &[String], scores: &[f32]) -> anyhow::Result<Vec<Prediction>> {
    let scores = match scores.len().checked_sub(labels.len()) {
        Some(0) => scores,
        Some(1) => &scores[1..],
        _ => anyhow::bail!(
            "model returned {} scores for {} labels",
            scores.len(),
            labels.len()
        ),
    };
    Ok(labels
        .iter()
        .zip(scores)
        .map(|(label, &score)| Prediction {
            class_name: label.clone(),
            score,
        })
        .collect())
}

#[async_trait]
impl ImageModel for RemoteModel {
    async fn classify(&self, input: &ImageTensor) -> anyhow::Result<Vec<Prediction>> {
        let body = PredictRequest {
            instances: vec![input.to_nested()],
        };
        let res: PredictResponse = self
            .client
            .post(&self.predict_url)
            .json(&body)
            .send()
            .await
            .context("predict request")?
            .error_for_status()
            .context("predict status")?
            .json()
            .await
            .context("decode predictions")?;
        let scores = res
            .predictions
            .into_iter()
            .next()
            .context("empty predictions")?;
        label_scores(&self.labels, &scores)
    }
}

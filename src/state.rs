use std::{sync::Arc, time::Duration};

use crate::{
    ai::{ChatCompletion, OpenAiCompatClient, TokenBucket},
    auth::{
        jwt::JwtKeys,
        repo::{PgUserRepo, UserRepo},
    },
    config::AppConfig,
    db,
    recipes::repo::{PgRecipeRepo, RecipeRepo},
    vision::{remote::RemoteModelLoader, ClassifierService},
};

#[derive(Clone)]
pub struct AppState {
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserRepo>,
    pub recipes: Arc<dyn RecipeRepo>,
    pub ai: Arc<dyn ChatCompletion>,
    pub vision_ai: Arc<dyn ChatCompletion>,
    pub ai_limiter: Arc<TokenBucket>,
    pub classifier: Arc<ClassifierService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<(Self, sqlx::PgPool)> {
        let config = AppConfig::from_env()?;
        let pool = db::connect(&config).await?;

        let timeout = Duration::from_secs(config.ai.timeout_secs);
        let ai = Arc::new(OpenAiCompatClient::new(
            "openai",
            &config.ai.openai,
            config.ai.max_tokens,
            timeout,
        )?) as Arc<dyn ChatCompletion>;
        let vision_ai = Arc::new(OpenAiCompatClient::new(
            "openrouter",
            &config.ai.openrouter,
            config.ai.max_tokens,
            timeout,
        )?) as Arc<dyn ChatCompletion>;

        let classifier = Arc::new(ClassifierService::new(
            Arc::new(RemoteModelLoader::new(&config.classifier)?),
            config.classifier.top_k,
            config.classifier.min_score,
        ));

        let state = Self {
            jwt: JwtKeys::new(&config.jwt),
            users: Arc::new(PgUserRepo::new(pool.clone())),
            recipes: Arc::new(PgRecipeRepo::new(pool.clone())),
            ai,
            vision_ai,
            ai_limiter: Arc::new(TokenBucket::new(
                config.ai.rate_limit_capacity,
                config.ai.rate_limit_refill_per_minute,
            )),
            classifier,
        };
        Ok((state, pool))
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory repositories, scripted upstreams, no network.
    pub fn fake() -> Self {
        use crate::testing::{
            FakeChat, FakeModel, FakeModelLoader, MemoryRecipeRepo, MemoryUserRepo,
        };

        let config = AppConfig::for_tests();
        let model = FakeModel::new(vec![
            crate::vision::model::Prediction {
                class_name: "Granny Smith".into(),
                score: 0.8,
            },
            crate::vision::model::Prediction {
                class_name: "tabby cat".into(),
                score: 0.1,
            },
        ]);
        Self {
            jwt: JwtKeys::new(&config.jwt),
            users: Arc::new(MemoryUserRepo::default()),
            recipes: Arc::new(MemoryRecipeRepo::default()),
            ai: Arc::new(FakeChat::replying("openai", "Make an omelette.")),
            vision_ai: Arc::new(FakeChat::replying("openrouter", "eggs, tomato")),
            ai_limiter: Arc::new(TokenBucket::new(
                config.ai.rate_limit_capacity,
                config.ai.rate_limit_refill_per_minute,
            )),
            classifier: Arc::new(ClassifierService::new(
                Arc::new(FakeModelLoader::new(model)),
                config.classifier.top_k,
                config.classifier.min_score,
            )),
        }
    }
}

//! In-memory stand-ins for the database and upstream services.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    ai::client::{ChatCompletion, ChatMessage, UpstreamError},
    auth::{repo::UserRepo, repo_types::User},
    db::RepoError,
    recipes::{
        repo::RecipeRepo,
        repo_types::{NewRecipe, Recipe},
    },
    vision::{
        model::{ImageModel, ModelLoader, Prediction},
        preprocess::ImageTensor,
    },
};

#[derive(Default)]
pub struct MemoryUserRepo {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, RepoError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.username == username) {
            return Err(RepoError::Duplicate);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(user.clone());
        Ok(user)
    }
}

/// Rows kept in insertion order; newest-first is the reverse.
#[derive(Default)]
pub struct MemoryRecipeRepo {
    rows: Mutex<Vec<Recipe>>,
}

#[async_trait]
impl RecipeRepo for MemoryRecipeRepo {
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<(Vec<Recipe>, i64)> {
        let rows = self.rows.lock().unwrap();
        let page = rows
            .iter()
            .rev()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, rows.len() as i64))
    }

    async fn search(&self, terms: &[String], limit: i64) -> anyhow::Result<Vec<Recipe>> {
        let terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter(|r| {
                let hay = r.ingredients.to_lowercase();
                terms.iter().any(|t| hay.contains(t.as_str()))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|r| r.id == id).cloned())
    }

    async fn create(&self, recipe: NewRecipe, owner: Uuid) -> anyhow::Result<Recipe> {
        let row = Recipe {
            id: Uuid::new_v4(),
            user_id: Some(owner),
            name: recipe.name,
            ingredients: recipe.ingredients,
            instructions: recipe.instructions,
            prep_time: recipe.prep_time,
            cook_time: recipe.cook_time,
            servings: recipe.servings,
            thumbnail_url: recipe.thumbnail_url,
            created_at: OffsetDateTime::now_utc(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.id == id && r.user_id == Some(owner)));
        Ok(rows.len() < before)
    }
}

/// Chat upstream that answers from a script and records what it was sent.
pub struct FakeChat {
    name: &'static str,
    reply: Mutex<Result<String, fn() -> UpstreamError>>,
    pub sent: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeChat {
    pub fn replying(name: &'static str, text: &str) -> Self {
        Self {
            name,
            reply: Mutex::new(Ok(text.to_string())),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &'static str, err: fn() -> UpstreamError) -> Self {
        Self {
            name,
            reply: Mutex::new(Err(err)),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatCompletion for FakeChat {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, UpstreamError> {
        self.sent.lock().unwrap().push(messages);
        match &*self.reply.lock().unwrap() {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

#[derive(Clone)]
pub struct FakeModel {
    scores: Vec<Prediction>,
}

impl FakeModel {
    pub fn new(scores: Vec<Prediction>) -> Self {
        Self { scores }
    }
}

#[async_trait]
impl ImageModel for FakeModel {
    async fn classify(&self, _input: &ImageTensor) -> anyhow::Result<Vec<Prediction>> {
        Ok(self.scores.clone())
    }
}

pub struct FakeModelLoader {
    model: FakeModel,
    failures_left: AtomicUsize,
    loads: AtomicUsize,
}

impl FakeModelLoader {
    pub fn new(model: FakeModel) -> Self {
        Self::failing_first(0, model)
    }

    pub fn failing_first(failures: usize, model: FakeModel) -> Self {
        Self {
            model,
            failures_left: AtomicUsize::new(failures),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for FakeModelLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn ImageModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        anyhow::ensure!(!failing, "model artifact not reachable");
        Ok(Arc::new(self.model.clone()))
    }
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub ingredients: String,
    pub instructions: String,
    pub prep_time: Option<i32>, // minutes
    pub cook_time: Option<i32>, // minutes
    pub servings: Option<i32>,
    pub thumbnail_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A validated recipe ready to insert.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub ingredients: String,
    pub instructions: String,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub thumbnail_url: Option<String>,
}

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::recipes::repo_types::{NewRecipe, Recipe};

const RECIPE_COLUMNS: &str = "id, user_id, name, ingredients, instructions, prep_time, \
                              cook_time, servings, thumbnail_url, created_at";

#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// One page, newest first, plus the total row count.
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<(Vec<Recipe>, i64)>;
    /// Rows whose ingredients contain any of `terms`, case-insensitively.
    async fn search(&self, terms: &[String], limit: i64) -> anyhow::Result<Vec<Recipe>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    async fn create(&self, recipe: NewRecipe, owner: Uuid) -> anyhow::Result<Recipe>;
    /// Returns false when no row with that id and owner exists.
    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgRecipeRepo {
    db: PgPool,
}

impl PgRecipeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Escapes LIKE metacharacters so a term only ever matches literally.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait]
impl RecipeRepo for PgRecipeRepo {
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<(Vec<Recipe>, i64)> {
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS}
            FROM recipes
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes")
            .fetch_one(&self.db)
            .await?;

        Ok((rows, total))
    }

    async fn search(&self, terms: &[String], limit: i64) -> anyhow::Result<Vec<Recipe>> {
        anyhow::ensure!(!terms.is_empty(), "search needs at least one term");

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE ("));
        let mut any = qb.separated(" OR ");
        for term in terms {
            any.push("ingredients ILIKE ");
            any.push_bind_unseparated(like_pattern(term));
        }
        qb.push(") ORDER BY created_at DESC, id LIMIT ");
        qb.push_bind(limit);

        let rows = qb.build_query_as::<Recipe>().fetch_all(&self.db).await?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, recipe: NewRecipe, owner: Uuid) -> anyhow::Result<Recipe> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes (user_id, name, ingredients, instructions,
                                 prep_time, cook_time, servings, thumbnail_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(owner)
        .bind(recipe.name)
        .bind(recipe.ingredients)
        .bind(recipe.instructions)
        .bind(recipe.prep_time)
        .bind(recipe.cook_time)
        .bind(recipe.servings)
        .bind(recipe.thumbnail_url)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

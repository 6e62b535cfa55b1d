use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub prompt: String,
}

/// Either `["eggs", "milk"]` or `"eggs, milk"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngredientList {
    Many(Vec<String>),
    Joined(String),
}

impl IngredientList {
    pub fn into_terms(self) -> Vec<String> {
        let raw = match self {
            IngredientList::Many(items) => items,
            IngredientList::Joined(s) => s.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub ingredients: Option<IngredientList>,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub response: String,
}

pub const MAX_PROMPT_CHARS: usize = 4000;

pub const COOKING_ASSISTANT: &str = "You are a helpful cooking assistant. Answer questions \
about recipes, ingredients and cooking techniques concisely.";

pub const INGREDIENT_SPOTTER: &str = "List the food ingredients visible in this image as a \
comma-separated list. Reply with the list only.";

pub fn recipe_suggestions(ingredients: &[String]) -> String {
    format!(
        "I have the following ingredients: {}. Suggest up to 3 recipes I could make with \
         them. For each recipe give a name, the ingredients needed and short step-by-step \
         instructions.",
        ingredients.join(", ")
    )
}

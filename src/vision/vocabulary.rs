//! Maps classifier class names onto the ingredient labels the app knows.

/// Keyword → ingredient, matched as a case-insensitive substring of the
/// class name. Entries are checked in order and the first hit wins, so a
/// `None` entry shadows later keywords it contains (`"acorn"` is not corn).
const INGREDIENT_KEYWORDS: &[(&str, Option<&str>)] = &[
    ("granny smith", Some("apple")),
    ("custard apple", Some("custard apple")),
    ("banana", Some("banana")),
    ("orange", Some("orange")),
    ("lemon", Some("lemon")),
    ("pineapple", Some("pineapple")),
    ("ananas", Some("pineapple")),
    ("strawberr", Some("strawberry")),
    ("pomegranate", Some("pomegranate")),
    ("fig", Some("fig")),
    ("jackfruit", Some("jackfruit")),
    ("broccoli", Some("broccoli")),
    ("cauliflower", Some("cauliflower")),
    ("cabbage", Some("cabbage")),
    ("cucumber", Some("cucumber")),
    ("zucchini", Some("zucchini")),
    ("courgette", Some("zucchini")),
    ("squash", Some("squash")),
    ("bell pepper", Some("bell pepper")),
    ("hen of the woods", Some("mushroom")),
    ("hen-of-the-woods", Some("mushroom")),
    ("mushroom", Some("mushroom")),
    ("agaric", Some("mushroom")),
    ("artichoke", Some("artichoke")),
    ("cardoon", Some("cardoon")),
    ("acorn", None),
    ("corn", Some("corn")),
    ("french loaf", Some("bread")),
    ("bagel", Some("bagel")),
    ("pretzel", Some("pretzel")),
    ("dough", Some("dough")),
    ("meat loaf", Some("ground beef")),
    ("meatloaf", Some("ground beef")),
    ("guacamole", Some("avocado")),
    ("carbonara", Some("pasta")),
    ("lobster", Some("lobster")),
    ("crayfish", Some("crayfish")),
    ("crab", Some("crab")),
    ("chocolate sauce", Some("chocolate")),
    ("espresso", Some("coffee")),
    ("red wine", Some("red wine")),
];

pub fn ingredient_for(class_name: &str) -> Option<&'static str> {
    let name = class_name.to_lowercase();
    INGREDIENT_KEYWORDS
        .iter()
        .find(|(keyword, _)| name.contains(keyword))
        .and_then(|(_, ingredient)| *ingredient)
}

/// Known ingredients for `class_names`, deduplicated, in first-seen order.
pub fn map_to_ingredients<'a>(class_names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ingredient in class_names.into_iter().filter_map(ingredient_for) {
        if !out.iter().any(|seen| seen == ingredient) {
            out.push(ingredient.to_string());
        }
    }
    out
}

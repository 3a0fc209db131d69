//! Reference tag vocabulary used to describe menu items and customer tastes.

/// Tag names grouped by category.
pub const TAG_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Cuisine",
        &[
            "Chinese",
            "Japanese",
            "Korean",
            "Thai",
            "Indian",
            "Italian",
            "Mexican",
            "American",
            "Mediterranean",
            "French",
            "Vietnamese",
            "Greek",
            "Eastern Europe",
            "African",
            "Latin American",
        ],
    ),
    (
        "ProteinType",
        &[
            "Chicken",
            "Beef",
            "Pork",
            "Lamb",
            "Fish",
            "Shrimp",
            "Crab",
            "Egg",
            "Tofu",
            "Gluten",
            "Beans",
            "Dairy",
            "Nuts",
            "Mainly Vegetable",
        ],
    ),
    ("Spiciness", &["None", "Mild", "Medium", "Hot", "Extra Hot"]),
    ("MealType", &["Combo", "Drink", "Main Course", "Side Dish"]),
    ("Flavor", &["Sweet", "Sour", "Umami", "Savory", "Spicy"]),
    (
        "Allergen",
        // "Fish" repeats the protein tag and maps to the same row
        &[
            "Milk",
            "Eggs",
            "Fish",
            "Crustacean Shellfish",
            "Tree Nuts",
            "Peanuts",
            "Wheat",
            "Soybeans",
            "Sesame",
        ],
    ),
    (
        "Nutrition",
        &[
            "High Protein",
            "Low Carb",
            "Low Sugar",
            "Low Fat",
            "High Fiber",
            "Low Calorie",
        ],
    ),
];

/// Every tag name in category order, duplicates included.
pub fn all_tag_names() -> impl Iterator<Item = &'static str> {
    TAG_CATEGORIES
        .iter()
        .flat_map(|(_, names)| names.iter().copied())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn vocabulary_sizes() {
        let sizes: Vec<_> = TAG_CATEGORIES.iter().map(|(_, n)| n.len()).collect();
        assert_eq!(sizes, vec![15, 14, 5, 4, 5, 9, 6]);
        assert_eq!(all_tag_names().count(), 58);

        let distinct: BTreeSet<_> = all_tag_names().collect();
        assert_eq!(distinct.len(), 57);
    }
}

/// Fixed analysis instruction: describes the exact JSON shape the model must return.
pub const ANALYSIS_INSTRUCTION: &str = r#"Analyze the food in this image. Return ONLY a JSON object in exactly this format, with no other text:
{
    "hasFood": true,
    "foodType": "name of the food",
    "weight": 100,
    "nutrition": {
        "calories": 0,
        "protein": 0,
        "totalFat": 0,
        "saturatedFat": 0,
        "transFat": 0,
        "unsaturatedFat": 0,
        "carbohydrates": 0,
        "sugar": 0,
        "fiber": 0,
        "vitamins": {
            "vitaminA": 0,
            "vitaminC": 0,
            "vitaminD": 0,
            "vitaminE": 0,
            "vitaminK": 0,
            "vitaminB": {
                "b1": 0,
                "b2": 0,
                "b6": 0,
                "b12": 0
            }
        },
        "minerals": {
            "calcium": 0,
            "iron": 0,
            "sodium": 0,
            "potassium": 0,
            "zinc": 0,
            "magnesium": 0
        }
    }
}
Field units: hasFood is a boolean; weight is the estimated weight in grams; calories in kcal;
protein, fats, carbohydrates, sugar and fiber in grams; vitamins A, D, K and B12 in micrograms;
vitamins C, E, B1, B2, B6 and all minerals in milligrams.
If the image contains no food, return {"hasFood": false}."#;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instruction: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(ANALYSIS_INSTRUCTION)
    }
}

impl PromptBuilder {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
        }
    }

    /// Build the prompt. A non-blank description is prepended as guidance; the
    /// instruction always follows unmodified.
    pub fn build(&self, user_description: Option<&str>) -> String {
        match user_description.map(str::trim).filter(|d| !d.is_empty()) {
            Some(description) => format!(
                "When analyzing the food in this image:\n\
                 1. Pay particular attention to the ratio between calories and mass.\n\
                 2. First estimate the mass of the main ingredients and of the high-calorie ingredients, \
                 then derive the calories proportionally.\n\
                 3. User description: {}\n\
                 4. The image may contain several foods. Name each of them in foodType and evaluate \
                 the nutrition of the whole meal, taking their proportions into account.\n\n{}",
                description, self.instruction
            ),
            None => self.instruction.clone(),
        }
    }
}

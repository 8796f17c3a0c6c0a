use serde_json::{Map, Value};

use crate::error::{ClientError, ClientResult};
use crate::models::{AnalysisResult, NutritionProfile};

const FENCE: &str = "```";

/// Turns a model's raw answer into a validated `AnalysisResult`.
///
/// Two stages: `normalize` removes presentation wrappers, `parse` decodes
/// and validates the JSON. Both are usable on their own.
#[derive(Debug, Clone, Default)]
pub struct ResponseExtractor;

impl ResponseExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, raw: &str) -> ClientResult<AnalysisResult> {
        let normalized = normalize(raw);
        parse(normalized).map_err(|reason| {
            log::warn!("⚠️ Could not extract analysis: {}", reason);
            ClientError::MalformedAnalysis {
                reason,
                raw: raw.to_string(),
            }
        })
    }
}

/// Strip surrounding whitespace and an optional fenced block wrapper.
///
/// An opening fence may carry a format tag (```json). If a closing fence
/// exists the text is cut there, otherwise the remainder is kept.
pub fn normalize(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };

    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.')))
        .unwrap_or(rest.len());
    let body = &rest[tag_len..];

    let body = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim()
}

/// Decode already-normalized text and validate it against the nutrition schema.
pub fn parse(text: &str) -> Result<AnalysisResult, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
    let object = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let has_food = match object.get("hasFood") {
        Some(Value::Bool(flag)) => *flag,
        Some(other) => return Err(format!("hasFood must be a boolean, got {}", other)),
        None => return Err("missing hasFood".to_string()),
    };

    // Food fields are ignored when nothing was detected
    if !has_food {
        return Ok(AnalysisResult::no_food());
    }

    let food_type = match object.get("foodType") {
        Some(Value::String(name)) => name.trim().to_string(),
        Some(other) => return Err(format!("foodType must be a string, got {}", other)),
        None => return Err("hasFood is true but foodType is missing".to_string()),
    };

    let weight = weight_grams(object)?;

    let nutrition = match object.get("nutrition") {
        Some(value @ Value::Object(_)) => serde_json::from_value::<NutritionProfile>(value.clone())
            .map_err(|e| format!("invalid nutrition: {}", e))?,
        Some(other) => return Err(format!("nutrition must be an object, got {}", other)),
        None => return Err("hasFood is true but nutrition is missing".to_string()),
    };

    Ok(AnalysisResult::with_food(food_type, weight, nutrition))
}

fn weight_grams(object: &Map<String, Value>) -> Result<f64, String> {
    let value = object
        .get("weight")
        .or_else(|| object.get("weightGrams"))
        .ok_or_else(|| "hasFood is true but weight is missing".to_string())?;

    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("weight is not representable: {}", n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("weight must be a number, got \"{}\"", s)),
        other => Err(format!("weight must be a number, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RICE: &str = r#"{"hasFood":true,"foodType":"rice","weight":150,"nutrition":{"calories":200}}"#;

    fn extract(raw: &str) -> ClientResult<AnalysisResult> {
        ResponseExtractor::new().extract(raw)
    }

    #[test]
    fn test_normalize_plain_text_is_trimmed() {
        assert_eq!(normalize("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_normalize_fence_variants() {
        let wrapped = [
            format!("```json\n{}\n```", RICE),
            format!("```JSON\n{}\n```", RICE),
            format!("```\n{}\n```", RICE),
            format!("```json\n{}", RICE),
            format!("```{}```", RICE),
            format!("\n  ```json\n{}\n```\nHope this helps!", RICE),
        ];
        for text in &wrapped {
            assert_eq!(normalize(text), RICE, "failed for {:?}", text);
        }
    }

    #[test]
    fn test_normalize_leaves_inner_text_alone() {
        let text = "Here you go: ```json {} ```";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn test_fenced_rice_scenario() {
        let result = extract(&format!("```json\n{}\n```", RICE)).unwrap();
        assert!(result.has_food);
        assert_eq!(result.food_type.as_deref(), Some("rice"));
        assert_eq!(result.weight_grams, Some(150.0));

        let nutrition = result.nutrition.unwrap();
        assert_eq!(nutrition.calories, 200.0);
        assert_eq!(nutrition.protein, 0.0);
        assert_eq!(nutrition.fiber, 0.0);
        assert_eq!(nutrition.vitamins.vitamin_k, 0.0);
        assert_eq!(nutrition.minerals.zinc, 0.0);
    }

    #[test]
    fn test_fenced_equals_unwrapped() {
        let plain = extract(RICE).unwrap();
        for text in [
            format!("```json\n{}\n```", RICE),
            format!("```\n{}", RICE),
        ] {
            assert_eq!(extract(&text).unwrap(), plain);
        }
    }

    #[test]
    fn test_no_food() {
        let result = extract(r#"{"hasFood": false}"#).unwrap();
        assert!(!result.has_food);
        assert!(result.nutrition.is_none());
        assert!(result.food_type.is_none());
    }

    #[test]
    fn test_no_food_ignores_extraneous_fields() {
        let result = extract(
            r#"{"hasFood": false, "foodType": "plate", "weight": 300, "nutrition": {"calories": 999}}"#,
        )
        .unwrap();
        assert_eq!(result, AnalysisResult::no_food());
    }

    #[test]
    fn test_prose_is_malformed_with_raw_text() {
        let raw = "sorry, I cannot analyze this";
        match extract(raw).unwrap_err() {
            ClientError::MalformedAnalysis { raw: carried, .. } => assert_eq!(carried, raw),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_has_food_must_be_boolean() {
        assert!(matches!(
            extract(r#"{"hasFood": "yes"}"#),
            Err(ClientError::MalformedAnalysis { .. })
        ));
        assert!(matches!(
            extract(r#"{"foodType": "rice"}"#),
            Err(ClientError::MalformedAnalysis { .. })
        ));
    }

    #[test]
    fn test_has_food_without_nutrition_is_malformed() {
        let err = extract(r#"{"hasFood": true, "foodType": "rice", "weight": 150}"#).unwrap_err();
        match err {
            ClientError::MalformedAnalysis { reason, .. } => assert!(reason.contains("nutrition")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_has_food_requires_food_type_and_weight() {
        assert!(extract(r#"{"hasFood": true, "weight": 1, "nutrition": {}}"#).is_err());
        assert!(extract(r#"{"hasFood": true, "foodType": "x", "nutrition": {}}"#).is_err());
    }

    #[test]
    fn test_weight_grams_alias_and_numeric_string() {
        let result = extract(r#"{"hasFood": true, "foodType": "soup", "weightGrams": "250", "nutrition": {}}"#).unwrap();
        assert_eq!(result.weight_grams, Some(250.0));
        assert_eq!(result.nutrition, Some(NutritionProfile::default()));
    }

    #[test]
    fn test_non_numeric_nutrient_is_malformed() {
        let err = extract(
            r#"{"hasFood": true, "foodType": "x", "weight": 1, "nutrition": {"calories": true}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::MalformedAnalysis { .. }));
    }

    #[test]
    fn test_reparse_is_idempotent() {
        let raw = r#"```json
        {"hasFood": true, "foodType": "dumplings", "weight": 180,
         "nutrition": {"calories": 320, "protein": 12.5,
                       "vitamins": {"vitaminC": 3, "vitaminB": {"b12": 0.4}},
                       "minerals": {"sodium": 610}}}
        ```"#;
        let first = extract(raw).unwrap();
        let again = extract(&serde_json::to_string(&first).unwrap()).unwrap();
        assert_eq!(first, again);
    }
}

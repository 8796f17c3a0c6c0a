use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ClientError, ClientResult};

/// Upper bound on an image submitted for analysis (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

/// One photo to analyze, already validated against the accepted formats and size.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    image: Vec<u8>,
    format: ImageFormat,
    user_description: Option<String>,
}

impl AnalysisRequest {
    pub fn new(image: Vec<u8>, format: ImageFormat, user_description: Option<String>) -> ClientResult<Self> {
        let size = image.len() as u64;
        if size > MAX_IMAGE_BYTES {
            return Err(ClientError::TooLarge {
                size,
                limit: MAX_IMAGE_BYTES,
            });
        }

        // Blank descriptions count as absent
        let user_description = user_description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            image,
            format,
            user_description,
        })
    }

    pub fn from_mime(image: Vec<u8>, mime_type: &str, user_description: Option<String>) -> ClientResult<Self> {
        let format = ImageFormat::from_mime(mime_type).ok_or_else(|| ClientError::UnsupportedFormat {
            input: "in-memory image".to_string(),
            format: mime_type.to_string(),
        })?;
        Self::new(image, format, user_description)
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn user_description(&self) -> Option<&str> {
        self.user_description.as_deref()
    }
}

/// What the model saw in the photo. `nutrition` is present iff `has_food`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub has_food: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_type: Option<String>,
    #[serde(rename = "weight", skip_serializing_if = "Option::is_none")]
    pub weight_grams: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionProfile>,
}

impl AnalysisResult {
    pub fn no_food() -> Self {
        Self {
            has_food: false,
            food_type: None,
            weight_grams: None,
            nutrition: None,
        }
    }

    pub fn with_food(food_type: String, weight_grams: f64, nutrition: NutritionProfile) -> Self {
        Self {
            has_food: true,
            food_type: Some(food_type),
            weight_grams: Some(weight_grams),
            nutrition: Some(nutrition),
        }
    }
}

/// Full nutrition breakdown. Every number defaults to zero when the model omits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NutritionProfile {
    #[serde(deserialize_with = "lenient_number")]
    pub calories: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub protein: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub total_fat: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub saturated_fat: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub trans_fat: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub unsaturated_fat: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub carbohydrates: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub sugar: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub fiber: f64,
    #[serde(deserialize_with = "default_on_null")]
    pub vitamins: Vitamins,
    #[serde(deserialize_with = "default_on_null")]
    pub minerals: Minerals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Vitamins {
    #[serde(deserialize_with = "lenient_number")]
    pub vitamin_a: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub vitamin_c: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub vitamin_d: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub vitamin_e: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub vitamin_k: f64,
    #[serde(deserialize_with = "default_on_null")]
    pub vitamin_b: VitaminB,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitaminB {
    #[serde(deserialize_with = "lenient_number")]
    pub b1: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub b2: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub b6: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub b12: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Minerals {
    #[serde(deserialize_with = "lenient_number")]
    pub calcium: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub iron: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub sodium: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub potassium: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub zinc: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub magnesium: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Accepts a number, a numeric string ("12.5"), or null (zero).
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(NumberOrText::Number(n)) => Ok(n),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("expected a number, got \"{}\"", text))),
    }
}

fn default_on_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

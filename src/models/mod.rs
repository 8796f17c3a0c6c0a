pub mod nutrition;

pub use nutrition::{
    AnalysisRequest, AnalysisResult, ImageFormat, Minerals, NutritionProfile, VitaminB, Vitamins,
    MAX_IMAGE_BYTES,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// The backend serializes users with capitalized keys; accept both casings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID", alias = "id", default)]
    pub id: u64,
    #[serde(rename = "Name", alias = "name", default)]
    pub name: String,
    #[serde(rename = "Email", alias = "email", default)]
    pub email: String,
    #[serde(rename = "Role", alias = "role", default)]
    pub role: String,
    #[serde(rename = "Verified", alias = "verified", default)]
    pub verified: bool,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MealType {
    #[serde(rename = "早餐")]
    Breakfast,
    #[serde(rename = "午餐")]
    Lunch,
    #[serde(rename = "晚餐")]
    Dinner,
    #[serde(rename = "加餐")]
    Snack,
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MealType::Breakfast => "早餐",
            MealType::Lunch => "午餐",
            MealType::Dinner => "晚餐",
            MealType::Snack => "加餐",
        };
        write!(f, "{}", s)
    }
}

impl MealType {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "早餐" | "breakfast" => Some(MealType::Breakfast),
            "午餐" | "lunch" => Some(MealType::Lunch),
            "晚餐" | "dinner" => Some(MealType::Dinner),
            "加餐" | "snack" => Some(MealType::Snack),
            _ => None,
        }
    }
}

/// A persisted meal entry. Nutrition columns are a flattened subset of `NutritionProfile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodRecord {
    #[serde(rename = "ID", alias = "id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_time: Option<DateTime<Utc>>,
    pub food_name: String,
    pub weight: f64,

    pub calories: f64,
    pub protein: f64,
    pub total_fat: f64,
    pub saturated_fat: f64,
    pub trans_fat: f64,
    pub unsaturated_fat: f64,
    pub carbohydrates: f64,
    pub sugar: f64,
    pub fiber: f64,

    pub vitamin_a: f64,
    pub vitamin_c: f64,
    pub vitamin_d: f64,
    pub vitamin_b1: f64,
    pub vitamin_b2: f64,

    pub calcium: f64,
    pub iron: f64,
    pub sodium: f64,
    pub potassium: f64,

    pub meal_type: String,
    pub notes: String,
    pub image_path: String,
}

impl FoodRecord {
    pub fn from_analysis(analysis: &AnalysisResult, meal_type: &MealType, notes: &str) -> ClientResult<Self> {
        let nutrition = match (analysis.has_food, &analysis.nutrition) {
            (true, Some(nutrition)) => nutrition,
            _ => return Err(ClientError::NoFoodDetected),
        };

        Ok(Self {
            record_time: Some(Utc::now()),
            food_name: analysis.food_type.clone().unwrap_or_default(),
            weight: analysis.weight_grams.unwrap_or_default(),

            calories: nutrition.calories,
            protein: nutrition.protein,
            total_fat: nutrition.total_fat,
            saturated_fat: nutrition.saturated_fat,
            trans_fat: nutrition.trans_fat,
            unsaturated_fat: nutrition.unsaturated_fat,
            carbohydrates: nutrition.carbohydrates,
            sugar: nutrition.sugar,
            fiber: nutrition.fiber,

            vitamin_a: nutrition.vitamins.vitamin_a,
            vitamin_c: nutrition.vitamins.vitamin_c,
            vitamin_d: nutrition.vitamins.vitamin_d,
            vitamin_b1: nutrition.vitamins.vitamin_b.b1,
            vitamin_b2: nutrition.vitamins.vitamin_b.b2,

            calcium: nutrition.minerals.calcium,
            iron: nutrition.minerals.iron,
            sodium: nutrition.minerals.sodium,
            potassium: nutrition.minerals.potassium,

            meal_type: meal_type.to_string(),
            notes: notes.to_string(),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthState {
    #[serde(rename = "ID", alias = "id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_time: Option<DateTime<Utc>>,
    pub height: f64,                // cm
    pub weight: f64,                // kg
    pub bmi: f64,
    pub body_fat_percentage: f64,
    pub temperature: f64,           // °C
    pub heart_rate: i32,            // bpm
    pub respiratory_rate: i32,
    pub fasting_glucose: f64,       // mmol/L
    pub postprandial_glucose: f64,  // mmol/L
    pub total_cholesterol: f64,     // mmol/L
    pub notes: String,
}

impl HealthState {
    /// BMI from height (cm) and weight (kg); zero when height is unknown.
    pub fn computed_bmi(&self) -> f64 {
        if self.height <= 0.0 {
            return 0.0;
        }
        let meters = self.height / 100.0;
        self.weight / (meters * meters)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckIn {
    #[serde(rename = "ID", alias = "id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub user_id: u64,
    pub check_in_at: Option<DateTime<Utc>>,
    pub content: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub has_food_record: bool,
    #[serde(default)]
    pub already_checked_in: bool,
    pub check_in_data: Option<CheckIn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInStatus {
    pub has_checked_in: bool,
    pub has_food_record: bool,
    #[serde(default)]
    pub check_in_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInPage {
    pub total: u64,
    pub records: Vec<CheckIn>,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub page_size: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    #[serde(rename = "ID", alias = "id")]
    pub id: u64,
    pub name: String,
    pub description: String,
    pub source: String,
    pub icon_url: String,
    pub image_url: String,
}

/// Payload for creating or updating a catalog item.
#[derive(Debug, Clone, Serialize)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub source: String,
    pub icon_url: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemsPage {
    pub data: Vec<Item>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserItem {
    #[serde(rename = "ID", alias = "id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub user_id: u64,
    pub item_id: u64,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<DateTime<Utc>>,
    pub obtained_from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemCheck {
    pub has_item: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppUpdate {
    #[serde(rename = "ID", alias = "id")]
    pub id: u64,
    pub version: String,
    pub platform: String,
    pub update_url: String,
    pub force_update: bool,
    pub update_notes: String,
    pub release_date: Option<DateTime<Utc>>,
    pub file_size: i64,
    pub md5: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCheck {
    pub needs_update: bool,
    pub update_info: Option<AppUpdate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub url: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Comprehensive,
    Nutrition,
    Calories,
    Macros,
}

impl AnalysisType {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "comprehensive" => Some(AnalysisType::Comprehensive),
            "nutrition" => Some(AnalysisType::Nutrition),
            "calories" => Some(AnalysisType::Calories),
            "macros" => Some(AnalysisType::Macros),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthAnalysisRequest {
    pub start_date: String,
    pub end_date: String,
    pub analysis_type: AnalysisType,
    pub description: String,
}

impl HealthAnalysisRequest {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        analysis_type: AnalysisType,
        description: Option<&str>,
    ) -> Self {
        Self {
            start_date: start_date.format("%Y-%m-%d").to_string(),
            end_date: end_date.format("%Y-%m-%d").to_string(),
            analysis_type,
            description: description.unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStats {
    pub total_users: u64,
    pub verified_users: u64,
    pub unverified_users: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// What the backend stored and what it saw, from one analyze-and-save call.
#[derive(Debug, Clone)]
pub struct SavedAnalysis {
    pub record: FoodRecord,
    pub analysis: AnalysisResult,
}

// Response envelopes used by the backend

#[derive(Debug, Clone, Deserialize)]
pub struct RecordEnvelope<T> {
    pub record: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordsEnvelope<T> {
    pub records: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

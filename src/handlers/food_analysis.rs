use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveTime, Timelike};

use crate::error::ClientResult;
use crate::models::{AnalysisRequest, AnalysisResult, FoodRecord, MealType};
use crate::services::{BackendClient, ImageEncoder, PromptBuilder, ResponseExtractor, VisionService};

/// Photo → prompt + inline image → model answer → validated nutrition.
pub struct FoodAnalysisPipeline {
    prompts: PromptBuilder,
    encoder: ImageEncoder,
    vision: Arc<dyn VisionService>,
    extractor: ResponseExtractor,
    backend: Arc<BackendClient>,
}

impl FoodAnalysisPipeline {
    pub fn new(vision: Arc<dyn VisionService>, backend: Arc<BackendClient>) -> Self {
        Self {
            prompts: PromptBuilder::default(),
            encoder: ImageEncoder::new(),
            vision,
            extractor: ResponseExtractor::new(),
            backend,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Analyze an image file. File validation errors return before any network call.
    pub async fn analyze_file(&self, image_path: &Path, description: Option<&str>) -> ClientResult<AnalysisResult> {
        log::debug!("📸 Starting image analysis for: {}", image_path.display());
        let request = self
            .encoder
            .read_request(image_path, description.map(str::to_string))?;
        self.analyze_request(&request).await
    }

    pub async fn analyze_request(&self, request: &AnalysisRequest) -> ClientResult<AnalysisResult> {
        let prompt = self.prompts.build(request.user_description());
        let image = self.encoder.encode(request);

        let answer = self.vision.complete(&prompt, &image).await?;
        let result = self.extractor.extract(&answer)?;

        match &result.food_type {
            Some(food) if result.has_food => log::info!(
                "🍽️ Detected {} (~{:.0} g)",
                food,
                result.weight_grams.unwrap_or_default()
            ),
            _ => log::info!("🚫 No food detected in image"),
        }
        Ok(result)
    }

    /// Analyze, map to a food record and persist it. Nothing is written
    /// unless analysis succeeded and found food.
    pub async fn analyze_and_save(
        &self,
        image_path: &Path,
        description: Option<&str>,
        meal_type: Option<MealType>,
        notes: &str,
    ) -> ClientResult<FoodRecord> {
        let analysis = self.analyze_file(image_path, description).await?;

        let meal_type = meal_type.unwrap_or_else(|| meal_type_at(chrono::Local::now().time()));
        let mut record = FoodRecord::from_analysis(&analysis, &meal_type, notes)?;
        record.image_path = image_path.display().to_string();

        self.backend.create_food_record(&record).await
    }
}

/// Guess the meal from the time of day when the caller did not say.
pub fn meal_type_at(time: NaiveTime) -> MealType {
    match time.hour() {
        5..=9 => MealType::Breakfast,
        11..=13 => MealType::Lunch,
        17..=20 => MealType::Dinner,
        _ => MealType::Snack,
    }
}

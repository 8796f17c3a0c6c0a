use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use food_snap_client::config::{AnalysisConfig, BackendConfig};
use food_snap_client::handlers::FoodAnalysisPipeline;
use food_snap_client::models::MealType;
use food_snap_client::services::{
    AnalysisClient, BackendClient, EncodedImage, SessionManager, VisionService,
};
use food_snap_client::{ClientError, ClientResult};

const RICE_ANSWER: &str = "```json\n{\"hasFood\": true, \"foodType\": \"rice\", \"weight\": 150, \"nutrition\": {\"calories\": 200, \"protein\": 4.3}}\n```";

/// Vision service that returns a canned answer and records what it was sent.
struct CannedVision {
    answer: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl CannedVision {
    fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl VisionService for CannedVision {
    async fn complete(&self, prompt: &str, image: &EncodedImage) -> ClientResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        assert!(!image.data.is_empty());
        self.answer.clone().ok_or(ClientError::EmptyResponse)
    }
}

fn write_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, [0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10]).unwrap();
    path
}

async fn backend(server: &MockServer) -> Arc<BackendClient> {
    let config = BackendConfig::new(server.uri());
    let session = Arc::new(SessionManager::new(&config, None).unwrap());
    session.restore("token").await;
    Arc::new(BackendClient::new(&config, session).unwrap())
}

async fn mount_record_store(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/food-records"))
        .and(header("Authorization", "Bearer token"))
        .and(body_partial_json(json!({
            "food_name": "rice",
            "weight": 150.0,
            "calories": 200.0,
            "protein": 4.3,
            "meal_type": "午餐",
            "notes": "test meal"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "record": {
                "ID": 42,
                "user_id": 1,
                "food_name": "rice",
                "weight": 150.0,
                "calories": 200.0,
                "protein": 4.3,
                "meal_type": "午餐",
                "notes": "test meal"
            }
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_analyze_file_uses_description() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "lunch.jpg");

    let vision = CannedVision::answering(RICE_ANSWER);
    let pipeline = FoodAnalysisPipeline::new(vision.clone(), backend(&server).await);

    let result = pipeline.analyze_file(&image, Some("white rice, one bowl")).await.unwrap();
    assert!(result.has_food);
    assert_eq!(result.food_type.as_deref(), Some("rice"));
    assert_eq!(result.nutrition.unwrap().calories, 200.0);

    let prompts = vision.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("User description: white rice, one bowl"));
}

#[tokio::test]
async fn test_analyze_and_save_persists_record() {
    let server = MockServer::start().await;
    mount_record_store(&server, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "lunch.jpeg");

    let pipeline = FoodAnalysisPipeline::new(CannedVision::answering(RICE_ANSWER), backend(&server).await);
    let record = pipeline
        .analyze_and_save(&image, None, Some(MealType::Lunch), "test meal")
        .await
        .unwrap();

    assert_eq!(record.id, Some(42));
    assert_eq!(record.food_name, "rice");
    assert_eq!(record.calories, 200.0);
}

#[tokio::test]
async fn test_no_food_writes_nothing() {
    let server = MockServer::start().await;
    mount_record_store(&server, 0).await;
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "desk.png");

    let pipeline = FoodAnalysisPipeline::new(
        CannedVision::answering(r#"{"hasFood": false}"#),
        backend(&server).await,
    );
    let err = pipeline
        .analyze_and_save(&image, None, Some(MealType::Lunch), "test meal")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoFoodDetected));
}

#[tokio::test]
async fn test_malformed_answer_writes_nothing() {
    let server = MockServer::start().await;
    mount_record_store(&server, 0).await;
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "lunch.jpg");

    let pipeline = FoodAnalysisPipeline::new(
        CannedVision::answering("sorry, I cannot analyze this"),
        backend(&server).await,
    );
    match pipeline
        .analyze_and_save(&image, None, Some(MealType::Lunch), "test meal")
        .await
        .unwrap_err()
    {
        ClientError::MalformedAnalysis { raw, .. } => assert_eq!(raw, "sorry, I cannot analyze this"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_model_failure_writes_nothing() {
    let server = MockServer::start().await;
    mount_record_store(&server, 0).await;
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "lunch.jpg");

    let pipeline = FoodAnalysisPipeline::new(CannedVision::failing(), backend(&server).await);
    let err = pipeline
        .analyze_and_save(&image, None, Some(MealType::Dinner), "")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::EmptyResponse));
}

#[tokio::test]
async fn test_invalid_file_never_reaches_model() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let gif = dir.path().join("meal.gif");
    std::fs::write(&gif, b"GIF89a").unwrap();

    let vision = CannedVision::answering(RICE_ANSWER);
    let pipeline = FoodAnalysisPipeline::new(vision.clone(), backend(&server).await);

    let missing = pipeline.analyze_file(&dir.path().join("nope.jpg"), None).await.unwrap_err();
    assert!(matches!(missing, ClientError::NotFound { .. }));

    let unsupported = pipeline.analyze_file(&gif, None).await.unwrap_err();
    assert!(unsupported.is_input_error());

    assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
}

fn analysis_client(server: &MockServer) -> Arc<AnalysisClient> {
    let config = AnalysisConfig::new(format!("{}/v1/chat/completions", server.uri()), "test-key", "vision-model");
    Arc::new(AnalysisClient::new(config).unwrap())
}

#[tokio::test]
async fn test_pipeline_over_completion_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "vision-model", "max_tokens": 4000})))
        .and(body_string_contains("data:image/png;base64,"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": RICE_ANSWER}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 80, "total_tokens": 980}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "lunch.png");

    let pipeline = FoodAnalysisPipeline::new(analysis_client(&server), backend(&server).await);
    let result = pipeline.analyze_file(&image, None).await.unwrap();
    assert_eq!(result.weight_grams, Some(150.0));
}

#[tokio::test]
async fn test_completion_error_payload_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "rate limit exceeded", "type": "rate_limit"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "lunch.jpg");

    let pipeline = FoodAnalysisPipeline::new(analysis_client(&server), backend(&server).await);
    match pipeline.analyze_file(&image, None).await.unwrap_err() {
        ClientError::Remote { status, message } => {
            assert_eq!(status.as_u16(), 429);
            assert_eq!(message, "rate limit exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_completion_without_choices_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "lunch.jpg");

    let pipeline = FoodAnalysisPipeline::new(analysis_client(&server), backend(&server).await);
    assert!(matches!(
        pipeline.analyze_file(&image, None).await,
        Err(ClientError::EmptyResponse)
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let config = AnalysisConfig::new("http://127.0.0.1:9/v1/chat/completions", "test-key", "vision-model");
    let client = AnalysisClient::new(config).unwrap();
    let image = EncodedImage {
        data: "aGVsbG8=".to_string(),
        format: food_snap_client::models::ImageFormat::Jpeg,
    };
    assert!(matches!(
        client.complete("prompt", &image).await,
        Err(ClientError::Transport(_))
    ));
}

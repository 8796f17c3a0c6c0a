use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::{ClientError, ClientResult};
use crate::services::ai_service::VisionService;
use crate::services::image::EncodedImage;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// OpenAI-compatible chat completion client for image analysis.
pub struct AnalysisClient {
    config: AnalysisConfig,
    client: reqwest::Client,
}

impl AnalysisClient {
    pub fn new(config: AnalysisConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Transport)?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, prompt: &str, image: &EncodedImage) -> ChatRequest {
        let data_url = image.data_uri();
        log::debug!(
            "🖼️ Image data URL created: {}... (first 40 chars)",
            &data_url[..40.min(data_url.len())]
        );

        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text {
                    content_type: "text".to_string(),
                    text: prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    content_type: "image_url".to_string(),
                    image_url: ImageData { url: data_url },
                },
            ],
        }];

        ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl VisionService for AnalysisClient {
    async fn complete(&self, prompt: &str, image: &EncodedImage) -> ClientResult<String> {
        let request = self.build_request(prompt, image);

        log::info!("🤖 Sending analysis request with model: {}", self.config.model);

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let status = response.status();
        log::debug!("📥 Analysis response status: {}", status);

        let response_text = response.text().await.map_err(ClientError::Transport)?;
        log::debug!("📄 Raw analysis response size: {} bytes", response_text.len());

        extract_content(status, &response_text)
    }
}

/// Classify a completion response body and pull out the answer text.
fn extract_content(status: StatusCode, body: &str) -> ClientResult<String> {
    let parsed = serde_json::from_str::<ChatResponse>(body);

    if let Ok(ChatResponse {
        error: Some(error), ..
    }) = &parsed
    {
        log::error!("❌ Analysis API error ({}): {}", status, error.message);
        return Err(ClientError::Remote {
            status,
            message: error.message.clone(),
        });
    }

    if !status.is_success() {
        log::error!("❌ Analysis API error response ({}): {}", status, body);
        return Err(ClientError::Remote {
            status,
            message: body.to_string(),
        });
    }

    let chat_response = parsed.map_err(|e| {
        log::error!("❌ Unreadable analysis response: {}", e);
        ClientError::Remote {
            status,
            message: body.to_string(),
        }
    })?;

    if let Some(usage) = &chat_response.usage {
        log::debug!("📊 Token usage: {}", usage);
    }

    let content = chat_response
        .choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ClientError::EmptyResponse)?;

    log::info!("💬 Analysis response received ({} chars)", content.len());
    Ok(content)
}

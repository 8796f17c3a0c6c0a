use crate::error::ClientResult;
use crate::services::image::EncodedImage;

/// Trait for multimodal completion services (OpenAI, OpenRouter, etc.)
#[async_trait::async_trait]
pub trait VisionService: Send + Sync {
    /// Send one prompt with one inline image and return the raw answer text.
    async fn complete(&self, prompt: &str, image: &EncodedImage) -> ClientResult<String>;
}

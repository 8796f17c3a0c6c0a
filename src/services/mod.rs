pub mod ai_service;
pub mod analysis_client; // OpenAI-compatible vision endpoint
pub mod backend; // Health-tracking backend REST API
pub mod extractor;
pub mod image;
pub mod prompt;
pub mod session;

pub use ai_service::VisionService;
pub use analysis_client::AnalysisClient;
pub use backend::{BackendClient, UploadFile};
pub use extractor::ResponseExtractor;
pub use image::{EncodedImage, ImageEncoder};
pub use prompt::PromptBuilder;
pub use session::{IssuedVia, SessionManager, SessionStatus};

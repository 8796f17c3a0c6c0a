use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::models::Credentials;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
pub const DEFAULT_ANALYSIS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gpt-4o-mini";

/// Where the health-tracking backend lives.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Multimodal completion endpoint settings.
#[derive(Clone)]
pub struct AnalysisConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl AnalysisConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4000,
            timeout: Duration::from_secs(120),
        }
    }
}

// Only a short prefix of the key is ever printed
impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &masked(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn masked(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", prefix)
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub analysis: Option<AnalysisConfig>,
    pub credentials: Option<Credentials>,
    /// A previously issued bearer token to resume with instead of logging in.
    pub token: Option<String>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("backend", &self.backend)
            .field("analysis", &self.analysis)
            .field("credentials", &self.credentials)
            .field("token", &self.token.as_deref().map(masked))
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from the environment once. Call `dotenv().ok()` first.
    pub fn from_env() -> ClientResult<Self> {
        let mut backend = BackendConfig::new(
            env::var("BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
        );
        if let Some(secs) = parse_var::<u64>("BACKEND_TIMEOUT_SECS")? {
            backend.timeout = Duration::from_secs(secs);
        }

        let api_key = env::var("ANALYSIS_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        let analysis = match api_key {
            Some(api_key) => {
                let mut analysis = AnalysisConfig::new(
                    env::var("ANALYSIS_API_URL").unwrap_or_else(|_| DEFAULT_ANALYSIS_URL.to_string()),
                    api_key,
                    env::var("ANALYSIS_MODEL").unwrap_or_else(|_| {
                        log::warn!("⚠️ ANALYSIS_MODEL not set, using default model: {}", DEFAULT_ANALYSIS_MODEL);
                        DEFAULT_ANALYSIS_MODEL.to_string()
                    }),
                );
                if let Some(max_tokens) = parse_var::<u32>("ANALYSIS_MAX_TOKENS")? {
                    analysis.max_tokens = max_tokens;
                }
                if let Some(secs) = parse_var::<u64>("ANALYSIS_TIMEOUT_SECS")? {
                    analysis.timeout = Duration::from_secs(secs);
                }
                Some(analysis)
            }
            None => None,
        };

        let credentials = match (env::var("BACKEND_EMAIL"), env::var("BACKEND_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        Ok(Self {
            backend,
            analysis,
            credentials,
            token: env::var("BACKEND_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }

    pub fn require_analysis(&self) -> ClientResult<&AnalysisConfig> {
        self.analysis
            .as_ref()
            .ok_or_else(|| ClientError::Config("ANALYSIS_API_KEY must be set".to_string()))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> ClientResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClientError::Config(format!("{} must be a valid number, got '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

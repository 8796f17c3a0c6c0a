use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Every failure the client can report, classified by where it happened.
#[derive(Debug, Error)]
pub enum ClientError {
    // Local input validation, raised before any network call.
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("unsupported format '{format}' for {input}")]
    UnsupportedFormat { input: String, format: String },

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    // Analysis endpoint.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("remote error ({status}): {message}")]
    Remote { status: StatusCode, message: String },

    #[error("empty response: the model returned no answer")]
    EmptyResponse,

    #[error("malformed analysis ({reason}); raw answer: {raw}")]
    MalformedAnalysis { reason: String, raw: String },

    // Session.
    #[error("not authenticated: login first")]
    NotAuthenticated,

    #[error("no stored credentials for login")]
    MissingCredentials,

    #[error("authentication exhausted (refresh: {refresh}; re-login: {login})")]
    AuthExhausted { refresh: String, login: String },

    // Backend REST.
    #[error("unauthorized after session recovery: {body}")]
    Unauthorized { body: String },

    #[error("forbidden (insufficient role): {body}")]
    Forbidden { body: String },

    #[error("resource missing: {body}")]
    ResourceMissing { body: String },

    #[error("backend error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("could not decode response: {reason}; body: {body}")]
    Decode { reason: String, body: String },

    #[error("no food detected in the image")]
    NoFoodDetected,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Input validation errors are never retried and never touch the network.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ClientError::NotFound { .. }
                | ClientError::UnsupportedFormat { .. }
                | ClientError::TooLarge { .. }
        )
    }

    /// Short stable name of the error kind, used in CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::NotFound { .. } => "NotFound",
            ClientError::UnsupportedFormat { .. } => "UnsupportedFormat",
            ClientError::TooLarge { .. } => "TooLarge",
            ClientError::Transport(_) => "Transport",
            ClientError::Remote { .. } => "Remote",
            ClientError::EmptyResponse => "EmptyResponse",
            ClientError::MalformedAnalysis { .. } => "MalformedAnalysis",
            ClientError::NotAuthenticated => "NotAuthenticated",
            ClientError::MissingCredentials => "MissingCredentials",
            ClientError::AuthExhausted { .. } => "AuthExhausted",
            ClientError::Unauthorized { .. } => "Unauthorized",
            ClientError::Forbidden { .. } => "Forbidden",
            ClientError::ResourceMissing { .. } => "ResourceMissing",
            ClientError::Api { .. } => "Api",
            ClientError::Decode { .. } => "Decode",
            ClientError::NoFoodDetected => "NoFoodDetected",
            ClientError::Io(_) => "Io",
            ClientError::Config(_) => "Config",
        }
    }

    /// Map a non-success backend status to its classified error.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized { body },
            StatusCode::FORBIDDEN => ClientError::Forbidden { body },
            StatusCode::NOT_FOUND => ClientError::ResourceMissing { body },
            _ => ClientError::Api { status, body },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            ClientError::from_status(StatusCode::FORBIDDEN, "admin only".into()).kind(),
            "Forbidden"
        );
        assert_eq!(
            ClientError::from_status(StatusCode::NOT_FOUND, String::new()).kind(),
            "ResourceMissing"
        );
        assert_eq!(
            ClientError::from_status(StatusCode::UNAUTHORIZED, String::new()).kind(),
            "Unauthorized"
        );
        assert_eq!(
            ClientError::from_status(StatusCode::BAD_GATEWAY, String::new()).kind(),
            "Api"
        );
    }

    #[test]
    fn test_malformed_display_carries_raw_text() {
        let err = ClientError::MalformedAnalysis {
            reason: "expected value".into(),
            raw: "sorry, I cannot analyze this".into(),
        };
        assert!(err.to_string().contains("sorry, I cannot analyze this"));
        assert!(!err.is_input_error());
    }
}

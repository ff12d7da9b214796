use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds of a portal operation
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Token bootstrap found no app_token by any method
    #[error("Failed to get app_token")]
    TokenUnavailable,

    /// No captcha code was supplied and none could be obtained
    #[error("Captcha required")]
    CaptchaRequired,

    /// The portal explicitly rejected the submitted captcha code
    #[error("Invalid captcha")]
    InvalidCaptcha,

    /// Non-captcha error payload from the portal
    #[error("{0}")]
    ServerRejected(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Well-formed reply with nothing extractable in it
    #[error("{0}")]
    ParseEmpty(String),

    /// Rejected locally before any request was made
    #[error("{0}")]
    Validation(String),
}

/// Stable, machine-readable failure code carried by the result envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TokenUnavailable,
    CaptchaRequired,
    InvalidCaptcha,
    ServerRejected,
    TransportError,
    ParseEmpty,
    Validation,
}

impl ScrapeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TokenUnavailable => ErrorCode::TokenUnavailable,
            Self::CaptchaRequired => ErrorCode::CaptchaRequired,
            Self::InvalidCaptcha => ErrorCode::InvalidCaptcha,
            Self::ServerRejected(_) => ErrorCode::ServerRejected,
            Self::Transport(_) | Self::HttpStatus { .. } => ErrorCode::TransportError,
            Self::ParseEmpty(_) => ErrorCode::ParseEmpty,
            Self::Validation(_) => ErrorCode::Validation,
        }
    }
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ScrapeError::InvalidCaptcha.code(), ErrorCode::InvalidCaptcha);
        assert_eq!(
            ScrapeError::HttpStatus { status: 503, url: "x".into() }.code(),
            ErrorCode::TransportError
        );
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::InvalidCaptcha).unwrap();
        assert_eq!(json, "\"INVALID_CAPTCHA\"");
    }
}

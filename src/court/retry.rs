use crate::captcha::{classify, CaptchaVerdict};
use crate::error::ScrapeError;
use crate::portal::PortalResponse;

/// Total submissions allowed per operation: the first plus one rotated-token retry
pub const MAX_ATTEMPTS: u32 = 2;

/// How a data-bearing reply is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    InvalidCaptcha,
    ServerError {
        message: String,
        /// Token carried by the error payload, if it differs from the one just used
        rotated_token: Option<String>,
    },
}

impl Outcome {
    pub fn classify(payload: &PortalResponse, used_token: &str) -> Self {
        if classify(payload) == CaptchaVerdict::Rejected {
            return Self::InvalidCaptcha;
        }

        match payload.error_message() {
            Some(message) => Self::ServerError {
                message,
                rotated_token: payload
                    .app_token()
                    .filter(|token| *token != used_token)
                    .map(String::from),
            },
            None => Self::Success,
        }
    }
}

/// What to do after a reply
#[derive(Debug)]
pub enum Step {
    Proceed,
    RetryWith(String),
    Fail(ScrapeError),
}

/// Decide the next step from the outcome of attempt number `attempt` (1-based)
pub fn next_step(outcome: Outcome, attempt: u32) -> Step {
    match outcome {
        Outcome::Success => Step::Proceed,
        Outcome::InvalidCaptcha => Step::Fail(ScrapeError::InvalidCaptcha),
        Outcome::ServerError {
            rotated_token: Some(token),
            ..
        } if attempt < MAX_ATTEMPTS => Step::RetryWith(token),
        Outcome::ServerError { message, .. } => Step::Fail(ScrapeError::ServerRejected(message)),
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ScrapeError};

/// Uniform envelope returned by every portal operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
    /// Raw fragment the data was parsed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
            html: None,
            code: None,
        }
    }

    pub fn failed(error: &ScrapeError) -> Self {
        Self {
            success: false,
            data: None,
            message: error.to_string(),
            html: None,
            code: Some(error.code()),
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Attach partial data to a failed envelope
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// The portal rejected the captcha; a front-end should ask for a new one
    pub fn is_invalid_captcha(&self) -> bool {
        self.code == Some(ErrorCode::InvalidCaptcha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_envelope() {
        let result: OperationResult<u32> = OperationResult::failed(&ScrapeError::InvalidCaptcha);
        assert!(!result.success);
        assert!(result.is_invalid_captcha());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": false, "data": null, "message": "Invalid captcha", "code": "INVALID_CAPTCHA"})
        );
    }

    #[test]
    fn test_success_envelope_omits_empty_optionals() {
        let result = OperationResult::ok(vec![1, 2], "Found 2");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": true, "data": [1, 2], "message": "Found 2"})
        );

        let tagged = OperationResult::ok(0, "none").with_code(ErrorCode::ParseEmpty).with_html("<p/>");
        let value = serde_json::to_value(&tagged).unwrap();
        assert_eq!(value["code"], "PARSE_EMPTY");
        assert_eq!(value["html"], "<p/>");
    }
}

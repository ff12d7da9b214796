use serde_json::Value;
use url::Url;

use crate::parser::{squash_whitespace, strip_tags};

const PNG_MAGIC: &[u8] = b"\x89PNG";
const JPEG_JFIF_MAGIC: &[u8] = b"\xff\xd8\xff\xe0";
const JPEG_EXIF_MAGIC: &[u8] = b"\xff\xd8\xff\xe1";

/// Payload keys that may carry human-readable status text
const MESSAGE_KEYS: &[&str] = &["errormsg", "error", "message", "msg", "status", "case_data"];

/// Bytes and metadata of one HTTP exchange with the portal
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Final URL after redirects
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Image by content type or by PNG/JPEG magic bytes
    pub fn looks_like_image(&self) -> bool {
        if self.body.is_empty() {
            return false;
        }
        let by_header = self.content_type.as_deref().map_or(false, |ct| {
            let ct = ct.to_lowercase();
            ct.contains("image") || ct.contains("octet-stream")
        });
        by_header || has_image_magic(&self.body)
    }

    pub fn payload(&self) -> PortalResponse {
        PortalResponse::from_text(&self.text())
    }
}

pub fn has_image_magic(bytes: &[u8]) -> bool {
    [PNG_MAGIC, JPEG_JFIF_MAGIC, JPEG_EXIF_MAGIC]
        .iter()
        .any(|magic| bytes.starts_with(magic))
}

/// Portal replies are either a JSON object or a raw HTML fragment
#[derive(Debug, Clone, PartialEq)]
pub enum PortalResponse {
    Json(Value),
    Html(String),
}

impl PortalResponse {
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                return Self::Json(value);
            }
        }
        Self::Html(text.to_string())
    }

    /// Token carried in a JSON reply, if any
    pub fn app_token(&self) -> Option<&str> {
        match self {
            Self::Json(value) => value
                .get("app_token")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty()),
            Self::Html(_) => None,
        }
    }

    /// Text of a JSON `errormsg`, tags removed
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Json(value) => value
                .get("errormsg")
                .and_then(Value::as_str)
                .map(|msg| squash_whitespace(&strip_tags(msg)))
                .filter(|msg| !msg.is_empty()),
            Self::Html(_) => None,
        }
    }

    /// First non-empty string among the given JSON keys
    pub fn field(&self, keys: &[&str]) -> Option<String> {
        match self {
            Self::Json(value) => keys
                .iter()
                .filter_map(|key| value.get(*key).and_then(Value::as_str))
                .find(|s| !s.trim().is_empty())
                .map(String::from),
            Self::Html(_) => None,
        }
    }

    /// Option markup from the given JSON keys, or the raw body if it carries options
    pub fn option_fragment(&self, keys: &[&str]) -> Option<String> {
        match self {
            Self::Json(_) => self.field(keys),
            Self::Html(text) if text.contains("<option") => Some(text.clone()),
            Self::Html(_) => None,
        }
    }

    /// Text searched when deciding whether the reply rejects a captcha
    pub fn message_text(&self) -> String {
        match self {
            Self::Json(Value::Object(map)) => MESSAGE_KEYS
                .iter()
                .filter_map(|key| map.get(*key).and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" "),
            Self::Json(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
            Self::Json(other) => other.to_string(),
            Self::Html(text) => text.clone(),
        }
    }

    pub fn string_values(&self) -> Vec<&str> {
        match self {
            Self::Json(Value::Object(map)) => map.values().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(content_type: Option<&str>, body: &[u8]) -> RawResponse {
        RawResponse {
            status: 200,
            url: Url::parse("https://portal.example/").unwrap(),
            content_type: content_type.map(String::from),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_image_detection() {
        assert!(raw(Some("image/png"), b"anything").looks_like_image());
        assert!(raw(None, b"\x89PNG\r\n\x1a\n....").looks_like_image());
        assert!(raw(Some("text/html"), b"\xff\xd8\xff\xe0JFIF").looks_like_image());
        assert!(raw(Some("text/html"), b"\xff\xd8\xff\xe1Exif").looks_like_image());
        assert!(!raw(Some("text/html"), b"<html></html>").looks_like_image());
        assert!(!raw(Some("image/png"), b"").looks_like_image());
    }

    #[test]
    fn test_from_text_variants() {
        let json = PortalResponse::from_text(r#" {"app_token":"abc","errormsg":""}"#);
        assert!(matches!(json, PortalResponse::Json(_)));

        let html = PortalResponse::from_text("<option value='1'>A</option>");
        assert!(matches!(html, PortalResponse::Html(_)));

        let broken = PortalResponse::from_text("{not json");
        assert_eq!(broken, PortalResponse::Html("{not json".into()));
    }

    #[test]
    fn test_token_and_error_accessors() {
        let resp = PortalResponse::Json(json!({
            "app_token": "  ab12cd34ef56ab12cd34  ",
            "errormsg": "<p class='err'>Invalid  Request</p>"
        }));
        assert_eq!(resp.app_token(), Some("ab12cd34ef56ab12cd34"));
        assert_eq!(resp.error_message().as_deref(), Some("Invalid Request"));

        let empty = PortalResponse::Json(json!({"app_token": "", "errormsg": "  "}));
        assert_eq!(empty.app_token(), None);
        assert_eq!(empty.error_message(), None);
    }

    #[test]
    fn test_option_fragment() {
        let json = PortalResponse::Json(json!({"complex_list": "", "court_complex_list": "<option value='1'>A</option>"}));
        assert_eq!(
            json.option_fragment(&["complex_list", "court_complex_list"]).as_deref(),
            Some("<option value='1'>A</option>")
        );

        let html = PortalResponse::Html("<option value='2'>B</option>".into());
        assert!(html.option_fragment(&["dist_list"]).is_some());
        assert!(PortalResponse::Html("<p>none</p>".into()).option_fragment(&["dist_list"]).is_none());
    }

    #[test]
    fn test_message_text_only_reads_status_keys() {
        let resp = PortalResponse::Json(json!({
            "errormsg": "Invalid Captcha",
            "div_captcha": "<label>Enter Captcha</label>"
        }));
        assert_eq!(resp.message_text(), "Invalid Captcha");
    }
}

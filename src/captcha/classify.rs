use crate::portal::PortalResponse;

/// Phrasings the portal uses when it rejects a submitted code
const REJECTION_PHRASES: &[&str] = &[
    "invalid captcha",
    "wrong captcha",
    "captcha mismatch",
    "captcha code is incorrect",
    "captcha does not match",
    "please enter valid captcha",
    "please enter captcha",
    "invalid verification code",
    "verification code incorrect",
    "captcha not matched",
];

/// Verdict on a submitted captcha code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaVerdict {
    Accepted,
    Rejected,
}

/// True only when `text` mentions a captcha and carries a known rejection phrase.
///
/// A field label such as "Enter Captcha" on its own is not a rejection.
pub fn is_invalid_captcha(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("captcha") && REJECTION_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

pub fn classify(response: &PortalResponse) -> CaptchaVerdict {
    if is_invalid_captcha(&response.message_text()) {
        CaptchaVerdict::Rejected
    } else {
        CaptchaVerdict::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejection_phrases() {
        assert!(is_invalid_captcha("Invalid Captcha"));
        assert!(is_invalid_captcha("<span>Please enter valid captcha code</span>"));
        assert!(is_invalid_captcha("Captcha does not match, try again"));
        assert!(is_invalid_captcha("ERROR: CAPTCHA MISMATCH"));
    }

    #[test]
    fn test_label_alone_is_not_rejection() {
        assert!(!is_invalid_captcha("<label>Enter Captcha</label><input name='captcha'>"));
        assert!(!is_invalid_captcha("Record not found"));
        // rejection phrase without the word captcha
        assert!(!is_invalid_captcha("Invalid verification"));
    }

    #[test]
    fn test_classify_variants() {
        let rejected = PortalResponse::Json(json!({"errormsg": "Invalid Captcha", "app_token": "ab"}));
        assert_eq!(classify(&rejected), CaptchaVerdict::Rejected);

        let html = PortalResponse::Html("<div>Wrong captcha entered</div>".into());
        assert_eq!(classify(&html), CaptchaVerdict::Rejected);

        let labelled = PortalResponse::Json(json!({
            "case_data": "<table><tr><td>Case</td></tr></table>",
            "div_captcha": "Invalid captcha"
        }));
        assert_eq!(classify(&labelled), CaptchaVerdict::Accepted);
    }
}

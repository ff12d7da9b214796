use chrono::Utc;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use url::Url;

use super::ocr::CaptchaSolver;
use super::prompt::Prompter;
use crate::portal::endpoints::securimage_url;
use crate::portal::{Endpoint, PortalResponse, PortalSession};

const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";
const CAPTCHA_FILE: &str = "captcha.png";

/// Path of the fallback that produced the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    CaptchaEndpoint,
    EmbeddedImage,
    SecurimageWithToken,
    Securimage,
}

/// Image bytes plus the request context used to fetch them
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub image: Option<Vec<u8>>,
    pub source: Option<ImageSource>,
    pub referer: String,
    /// Cache-busting millisecond timestamp, also used as the legacy `sid`
    pub timestamp: i64,
    pub token: String,
}

fn embedded_image_pattern() -> &'static Regex {
    static IMG: OnceLock<Regex> = OnceLock::new();
    IMG.get_or_init(|| {
        Regex::new(r#"(?i)<img[^>]+src=["']([^"']*(?:securimage|captcha)[^"']*)["']"#).expect("captcha img pattern")
    })
}

/// Location of a captcha image referenced inside a non-image reply
pub fn embedded_image_url(base: &Url, payload: &PortalResponse) -> Option<Url> {
    let haystack = match payload {
        PortalResponse::Json(_) => payload.string_values().join(" "),
        PortalResponse::Html(text) => text.clone(),
    };

    if let Some(caps) = embedded_image_pattern().captures(&haystack) {
        return base.join(&caps[1]).ok();
    }

    payload
        .string_values()
        .into_iter()
        .find(|value| value.contains("securimage") || value.contains("captcha"))
        .and_then(|value| base.join(value.trim()).ok())
}

/// Fetches challenges and turns them into codes, by OCR, by a human, or both
pub struct CaptchaMediator {
    solver: Box<dyn CaptchaSolver>,
    prompter: Box<dyn Prompter>,
    image_dir: Option<PathBuf>,
}

impl CaptchaMediator {
    pub fn new(solver: Box<dyn CaptchaSolver>, prompter: Box<dyn Prompter>, image_dir: Option<PathBuf>) -> Self {
        Self {
            solver,
            prompter,
            image_dir,
        }
    }

    /// Walk the image fallbacks in order; a challenge without an image is still returned
    pub async fn fetch_challenge(&self, session: &mut PortalSession) -> CaptchaChallenge {
        let token = session.get_token(false).await;
        let timestamp = Utc::now().timestamp_millis();
        let referer = session.endpoint_url(Endpoint::CaseStatusIndex).to_string();

        let mut challenge = CaptchaChallenge {
            image: None,
            source: None,
            referer,
            timestamp,
            token,
        };

        let mut captcha_url = session.endpoint_url(Endpoint::GetCaptcha);
        captcha_url
            .query_pairs_mut()
            .append_pair("ajax_req", "true")
            .append_pair("app_token", &challenge.token)
            .append_pair("_", &timestamp.to_string());

        match session.get(captcha_url, Some(&challenge.referer), None).await {
            Ok(response) if response.looks_like_image() => {
                challenge.image = Some(response.body);
                challenge.source = Some(ImageSource::CaptchaEndpoint);
                return challenge;
            }
            Ok(response) => {
                if let Some(url) = embedded_image_url(session.base_url(), &response.payload()) {
                    debug!("Captcha endpoint referenced image {}", url);
                    if let Some(bytes) = self.fetch_image(session, url, &challenge.referer).await {
                        challenge.image = Some(bytes);
                        challenge.source = Some(ImageSource::EmbeddedImage);
                        return challenge;
                    }
                }
            }
            Err(e) => warn!("Captcha endpoint failed: {}", e),
        }

        let fallbacks = [
            (ImageSource::SecurimageWithToken, Some(challenge.token.clone())),
            (ImageSource::Securimage, None),
        ];
        for (source, token) in fallbacks {
            let url = securimage_url(session.base_url(), timestamp, token.as_deref());
            if let Some(bytes) = self.fetch_image(session, url, &challenge.referer).await {
                challenge.image = Some(bytes);
                challenge.source = Some(source);
                return challenge;
            }
        }

        warn!("Captcha image not fetched; falling back to manual entry without an image");
        challenge
    }

    async fn fetch_image(&self, session: &mut PortalSession, url: Url, referer: &str) -> Option<Vec<u8>> {
        match session.get(url, Some(referer), Some(IMAGE_ACCEPT)).await {
            Ok(response) if response.looks_like_image() => Some(response.body),
            Ok(_) => None,
            Err(e) => {
                debug!("Captcha image request failed: {}", e);
                None
            }
        }
    }

    /// Write the challenge image where a human can open it
    pub async fn save_image(&self, challenge: &CaptchaChallenge) -> Option<PathBuf> {
        let (dir, bytes) = (self.image_dir.as_ref()?, challenge.image.as_ref()?);
        let path = dir.join(CAPTCHA_FILE);

        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, bytes).await
        }
        .await;

        match written {
            Ok(()) => {
                info!("Captcha saved to: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Failed to save captcha image to {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get a code for a fresh challenge; empty means none could be obtained
    pub async fn obtain_code(&self, session: &mut PortalSession) -> String {
        let challenge = self.fetch_challenge(session).await;
        self.solve_challenge(&challenge).await
    }

    /// OCR first when an image is present, then always let the human confirm or override
    pub async fn solve_challenge(&self, challenge: &CaptchaChallenge) -> String {
        let Some(image) = challenge.image.as_deref() else {
            return self
                .prompter
                .ask("Captcha image unavailable. Enter the captcha code shown in your browser: ")
                .await;
        };

        let saved = self.save_image(challenge).await;

        if let Some(guess) = self.solver.solve(image).await {
            info!("OCR guess: {}", guess);
            let answer = self
                .prompter
                .ask(&format!("OCR read '{}'. Press Enter to accept, or type the correct code: ", guess))
                .await;
            return if answer.is_empty() { guess } else { answer };
        }

        let message = match saved {
            Some(path) => format!("Enter the captcha code (image saved to {}): ", path.display()),
            None => "Enter the captcha code: ".to_string(),
        };
        self.prompter.ask(&message).await
    }
}

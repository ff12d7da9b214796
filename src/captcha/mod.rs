//! Captcha challenge acquisition, OCR and rejection detection.

pub mod classify;
pub mod mediator;
pub mod ocr;
pub mod prompt;

pub use classify::{classify, is_invalid_captcha, CaptchaVerdict};
pub use mediator::{CaptchaChallenge, CaptchaMediator, ImageSource};
pub use ocr::{CaptchaSolver, NullSolver, TesseractSolver};
pub use prompt::{ConsolePrompter, Prompter};

use crate::cli::config::CaptchaSettings;

/// Mediator wired to the console, with OCR when enabled
pub fn console_mediator(settings: &CaptchaSettings, use_ocr: bool) -> CaptchaMediator {
    let solver: Box<dyn CaptchaSolver> = if use_ocr && settings.ocr_enabled {
        Box::new(TesseractSolver::new(settings))
    } else {
        Box::new(NullSolver)
    };
    CaptchaMediator::new(solver, Box::new(ConsolePrompter), settings.image_dir.clone())
}

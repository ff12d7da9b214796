//! Use-case operations against the portal, each returning an [`OperationResult`].

pub mod operations;
pub mod result;
pub mod retry;

pub use operations::{CaseNumberQuery, CauseListRequest, CourtScraper};
pub use result::OperationResult;

use crate::captcha;
use crate::cli::config::ScraperConfig;
use crate::error::ScrapeResult;
use crate::portal::PortalSession;

impl CourtScraper {
    /// Scraper over a fresh session, prompting on the console for captchas
    pub fn from_config(config: &ScraperConfig, use_ocr: bool) -> ScrapeResult<Self> {
        let session = PortalSession::new(&config.portal)?;
        let mediator = captcha::console_mediator(&config.captcha, use_ocr);
        Ok(Self::new(session, mediator, config.output.clone()))
    }
}

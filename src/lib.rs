//! Client for the eCourts court-records portal: hierarchy lookup, case status
//! and daily cause lists, negotiated through the portal's token and captcha
//! handshakes.

pub mod captcha;
pub mod cli;
pub mod court;
pub mod error;
pub mod model;
pub mod parser;
pub mod portal;
pub mod render;
pub mod utils;

pub use court::{CaseNumberQuery, CauseListRequest, CourtScraper, OperationResult};
pub use error::{ErrorCode, ScrapeError, ScrapeResult};

//! HTTP plumbing for the court-records portal: routes, session and token handling.

pub mod endpoints;
pub mod response;
pub mod session;
pub mod token;

pub use endpoints::Endpoint;
pub use response::{PortalResponse, RawResponse};
pub use session::PortalSession;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, REFERER};
use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::endpoints::{normalize_base, Endpoint};
use super::response::RawResponse;
use super::token::{self, preview};
use crate::cli::config::PortalSettings;
use crate::error::{ScrapeError, ScrapeResult};
use crate::utils::metrics::{RequestMetrics, RequestTimer};

/// One cookie-carrying client identity plus the current anti-automation token.
///
/// Every method takes `&mut self`: a session is used by one caller at a time.
pub struct PortalSession {
    client: Client,
    base_url: Url,
    token: Option<String>,
    metrics: RequestMetrics,
}

impl PortalSession {
    pub fn new(settings: &PortalSettings) -> ScrapeResult<Self> {
        let base_url = normalize_base(&settings.base_url).map_err(|e| {
            ScrapeError::Validation(format!("Invalid portal base_url '{}': {}", settings.base_url, e))
        })?;

        let mut builder = Client::builder()
            .cookie_store(true)
            .default_headers(Self::browser_headers(settings, &base_url)?)
            .timeout(Duration::from_secs(settings.timeout_secs));

        if let Some(proxy) = settings.proxy.as_deref().filter(|p| !p.is_empty()) {
            debug!("Routing portal traffic through proxy {}", proxy);
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            token: None,
            metrics: RequestMetrics::new(),
        })
    }

    /// Headers the portal's own front-end sends with its XHR calls
    fn browser_headers(settings: &PortalSettings, base_url: &Url) -> ScrapeResult<HeaderMap> {
        let origin = base_url.as_str().trim_end_matches('/');
        let pairs = [
            ("user-agent", settings.user_agent.as_str()),
            ("accept", "application/json, text/javascript, */*; q=0.01"),
            ("accept-language", settings.accept_language.as_str()),
            ("x-requested-with", "XMLHttpRequest"),
            ("origin", origin),
            ("referer", base_url.as_str()),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-origin"),
        ];

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let value = HeaderValue::from_str(value)
                .map_err(|_| ScrapeError::Validation(format!("Invalid value for header {}", name)))?;
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(headers)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> Url {
        endpoint.url(&self.base_url)
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    pub fn current_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Make `token` current; returns whether it differed from the previous one
    pub fn adopt_token(&mut self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() || self.token.as_deref() == Some(token) {
            return false;
        }
        debug!("Adopting rotated app_token {}...", preview(token));
        self.token = Some(token.to_string());
        true
    }

    /// Forget the current token so the next request bootstraps a fresh one
    pub fn invalidate_token(&mut self) {
        self.token = None;
    }

    /// Current token, bootstrapping one when absent or when `force_refresh` is set.
    ///
    /// Returns an empty string when no token could be located.
    pub async fn get_token(&mut self, force_refresh: bool) -> String {
        if !force_refresh {
            if let Some(token) = &self.token {
                return token.clone();
            }
        }

        match self.bootstrap_token().await {
            Some(token) => {
                self.token = Some(token.clone());
                token
            }
            None => {
                warn!("Could not extract app_token - requests will not be attempted");
                String::new()
            }
        }
    }

    /// Like [`get_token`](Self::get_token) but empty becomes [`ScrapeError::TokenUnavailable`]
    pub async fn require_token(&mut self, force_refresh: bool) -> ScrapeResult<String> {
        let token = self.get_token(force_refresh).await;
        if token.is_empty() {
            Err(ScrapeError::TokenUnavailable)
        } else {
            Ok(token)
        }
    }

    async fn bootstrap_token(&mut self) -> Option<String> {
        // Root page only establishes cookies
        if let Err(e) = self.get(Endpoint::Root.url(&self.base_url), None, None).await {
            warn!("Portal root request failed: {}", e);
        }

        for endpoint in [Endpoint::CauseListPage, Endpoint::GetCaptcha] {
            match self.get(self.endpoint_url(endpoint), None, None).await {
                Ok(response) => {
                    if let Some((token, source)) = token::extract_token(&response.url, &response.text()) {
                        info!("Got app_token from {} ({}): {}...", endpoint.label(), source, preview(&token));
                        return Some(token);
                    }
                    debug!("No app_token found in {}", endpoint.label());
                }
                Err(e) => warn!("Token bootstrap request to {} failed: {}", endpoint.label(), e),
            }
        }

        None
    }

    /// GET an absolute URL, optionally overriding referer and accept headers
    pub async fn get(&mut self, url: Url, referer: Option<&str>, accept: Option<&str>) -> ScrapeResult<RawResponse> {
        let label = self.label_for(&url);
        let mut request = self.client.get(url.clone());
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        debug!("GET {}", url);
        self.execute(&label, request).await
    }

    /// POST a form to a portal route; field order is preserved on the wire
    pub async fn post_form(&mut self, endpoint: Endpoint, form: &[(&str, String)]) -> ScrapeResult<RawResponse> {
        let url = self.endpoint_url(endpoint);
        debug!("POST {} ({} field(s))", endpoint.label(), form.len());
        let request = self.client.post(url).form(form);
        self.execute(endpoint.label(), request).await
    }

    async fn execute(&mut self, label: &str, request: reqwest::RequestBuilder) -> ScrapeResult<RawResponse> {
        let timer = RequestTimer::start();

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_request(label, false, timer.end(), None, 0);
                return Err(ScrapeError::Transport(e));
            }
        };

        let status = response.status().as_u16();
        let url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                self.metrics.record_request(label, false, timer.end(), Some(status), 0);
                return Err(ScrapeError::Transport(e));
            }
        };

        let raw = RawResponse {
            status,
            url,
            content_type,
            body,
        };
        self.metrics
            .record_request(label, raw.is_success(), timer.end(), Some(status), raw.body.len());

        if !raw.is_success() {
            return Err(ScrapeError::HttpStatus {
                status,
                url: raw.url.to_string(),
            });
        }
        Ok(raw)
    }

    /// Metrics label for an absolute URL: the `p` route if present
    fn label_for(&self, url: &Url) -> String {
        url.query_pairs()
            .find(|(key, _)| key == "p")
            .map(|(_, route)| route.into_owned())
            .unwrap_or_else(|| {
                let path = url.path().trim_start_matches(self.base_url.path());
                if path.is_empty() {
                    Endpoint::Root.label().to_string()
                } else {
                    path.to_string()
                }
            })
    }
}

use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use super::result::OperationResult;
use super::retry::{next_step, Outcome, Step};
use crate::captcha::{CaptchaChallenge, CaptchaMediator};
use crate::cli::config::OutputSettings;
use crate::error::{ErrorCode, ScrapeError, ScrapeResult};
use crate::model::{
    self, CaseKind, CaseRecord, CauseListResult, ComplexCauseLists, CourtCauseList, CourtCode,
    HierarchyLevel, HierarchyNode, HierarchyQuery, Location,
};
use crate::parser::{parse_case_details, parse_cause_list, parse_options, parse_state_select, strip_tags};
use crate::portal::token::preview;
use crate::portal::{Endpoint, PortalResponse, PortalSession};
use crate::utils::metrics::RequestMetrics;

const LAST_CAUSE_LIST_FILE: &str = "last_causelist.html";

/// Case-number search parameters
#[derive(Debug, Clone)]
pub struct CaseNumberQuery {
    pub location: Location,
    pub est_code: String,
    pub case_type: String,
    pub case_number: String,
    pub year: String,
}

/// One court's cause list for one day
#[derive(Debug, Clone)]
pub struct CauseListRequest {
    pub location: Location,
    /// `establishment^court`
    pub court_code: String,
    /// `DD-MM-YYYY`; today when absent
    pub date: Option<String>,
    pub kind: CaseKind,
    pub court_name: Option<String>,
}

/// A reply body together with its parsed shape
struct Reply {
    text: String,
    payload: PortalResponse,
}

impl Reply {
    /// Data-bearing HTML: the JSON `case_data` field or the raw body
    fn html(&self) -> String {
        self.payload
            .field(&["case_data"])
            .unwrap_or_else(|| self.text.clone())
    }
}

/// A data-bearing request, replayed as a whole on a rotated-token retry
enum Submission<'a> {
    Hierarchy(&'a HierarchyQuery),
    Cnr {
        cnr: &'a str,
        captcha: &'a str,
    },
    CaseNumber {
        query: &'a CaseNumberQuery,
        captcha: &'a str,
    },
    CauseList {
        location: &'a Location,
        court: &'a CourtCode,
        date: &'a str,
        kind: CaseKind,
        court_name: &'a str,
        captcha: &'a str,
    },
}

impl Submission<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Hierarchy(_) => "hierarchy lookup",
            Self::Cnr { .. } => "CNR search",
            Self::CaseNumber { .. } => "case search",
            Self::CauseList { .. } => "cause list",
        }
    }
}

/// The four portal operations over one session
pub struct CourtScraper {
    session: PortalSession,
    captcha: CaptchaMediator,
    output: OutputSettings,
}

impl CourtScraper {
    pub fn new(session: PortalSession, captcha: CaptchaMediator, output: OutputSettings) -> Self {
        Self {
            session,
            captcha,
            output,
        }
    }

    pub fn metrics(&self) -> &RequestMetrics {
        self.session.metrics()
    }

    /// List the children of a hierarchy level, given its parent codes outermost first
    pub async fn lookup_hierarchy(&mut self, level: HierarchyLevel, parents: &[String]) -> OperationResult<Vec<HierarchyNode>> {
        let result = match HierarchyQuery::from_parents(level, parents) {
            Ok(query) => self.run_hierarchy(&query).await,
            Err(e) => Err(e),
        };
        finish("hierarchy lookup", result)
    }

    pub async fn search_by_cnr(&mut self, cnr: &str, captcha: Option<&str>) -> OperationResult<CaseRecord> {
        let result = self.run_cnr(cnr, captcha).await;
        finish("CNR search", result)
    }

    pub async fn search_by_case_details(&mut self, query: &CaseNumberQuery, captcha: Option<&str>) -> OperationResult<CaseRecord> {
        let result = self.run_case_number(query, captcha).await;
        finish("case search", result)
    }

    pub async fn get_cause_list(&mut self, request: &CauseListRequest, captcha: Option<&str>) -> OperationResult<CauseListResult> {
        let result = self.run_cause_list(request, captcha).await;
        finish("cause list", result)
    }

    /// Cause lists of every court in a complex, solved with a single captcha
    pub async fn cause_lists_for_complex(
        &mut self,
        location: &Location,
        date: Option<&str>,
        kind: CaseKind,
        captcha: Option<&str>,
    ) -> OperationResult<ComplexCauseLists> {
        let result = self.run_complex_sweep(location, date, kind, captcha).await;
        finish("all-courts cause list", result)
    }

    /// Fetch a challenge and save its image, for a human to solve out of band.
    ///
    /// The token is always refreshed first so the challenge belongs to a live session.
    pub async fn fetch_captcha(&mut self) -> (CaptchaChallenge, Option<PathBuf>) {
        self.session.get_token(true).await;
        let challenge = self.captcha.fetch_challenge(&mut self.session).await;
        let saved = self.captcha.save_image(&challenge).await;
        (challenge, saved)
    }

    async fn run_hierarchy(&mut self, query: &HierarchyQuery) -> ScrapeResult<OperationResult<Vec<HierarchyNode>>> {
        let level = query.level();
        info!("Looking up {} list", level);

        let nodes = match query {
            HierarchyQuery::States => {
                let page = self.session.get(self.session.endpoint_url(Endpoint::CauseListPage), None, None).await?;
                parse_state_select(&page.text())
            }
            _ => {
                let reply = self.exchange(&Submission::Hierarchy(query)).await?;
                let keys: &[&str] = match level {
                    HierarchyLevel::District => &["dist_list"],
                    HierarchyLevel::CourtComplex => &["complex_list", "court_complex_list"],
                    _ => &["court_list", "est_list"],
                };
                reply
                    .payload
                    .option_fragment(keys)
                    .map(|fragment| parse_options(&fragment, level))
                    .unwrap_or_default()
            }
        };

        if nodes.is_empty() {
            return Ok(OperationResult::ok(nodes, format!("No {} entries found", level)).with_code(ErrorCode::ParseEmpty));
        }
        let message = format!("Found {} {} entries", nodes.len(), level);
        Ok(OperationResult::ok(nodes, message))
    }

    async fn run_cnr(&mut self, cnr: &str, captcha: Option<&str>) -> ScrapeResult<OperationResult<CaseRecord>> {
        let cnr = cnr.trim();
        if cnr.is_empty() {
            return Err(ScrapeError::Validation("CNR number is required".to_string()));
        }

        self.session.require_token(false).await?;
        let captcha = self.captcha_code(captcha).await?;
        info!("Searching CNR {}", cnr);

        let reply = self.exchange(&Submission::Cnr { cnr, captcha: &captcha }).await?;
        Ok(case_result(&reply))
    }

    async fn run_case_number(&mut self, query: &CaseNumberQuery, captcha: Option<&str>) -> ScrapeResult<OperationResult<CaseRecord>> {
        if query.case_number.trim().is_empty() || query.year.trim().is_empty() {
            return Err(ScrapeError::Validation("Case number and year are required".to_string()));
        }

        self.session.require_token(false).await?;
        let captcha = self.captcha_code(captcha).await?;
        info!(
            "Searching case {}/{}/{} in complex {}",
            query.case_type, query.case_number, query.year, query.location.complex_code
        );

        let reply = self
            .exchange(&Submission::CaseNumber {
                query,
                captcha: &captcha,
            })
            .await?;
        Ok(case_result(&reply))
    }

    async fn run_cause_list(&mut self, request: &CauseListRequest, captcha: Option<&str>) -> ScrapeResult<OperationResult<CauseListResult>> {
        let court = CourtCode::parse(&request.court_code)?;
        let date = request
            .date
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| model::format_portal_date(model::today()));

        self.session.require_token(false).await?;
        let captcha = self.captcha_code(captcha).await?;
        self.fetch_cause_list(&request.location, &court, &date, request.kind, request.court_name.as_deref(), &captcha)
            .await
    }

    async fn fetch_cause_list(
        &mut self,
        location: &Location,
        court: &CourtCode,
        date: &str,
        kind: CaseKind,
        court_name: Option<&str>,
        captcha: &str,
    ) -> ScrapeResult<OperationResult<CauseListResult>> {
        let court_name = court_name.map(|name| strip_tags(name).trim().to_string()).unwrap_or_default();
        info!(
            "Fetching cause list: est={}, cicri={}, court={}, date={}",
            court.establishment(),
            kind.as_str(),
            court.court(),
            date
        );

        let reply = self
            .exchange(&Submission::CauseList {
                location,
                court,
                date,
                kind,
                court_name: &court_name,
                captcha,
            })
            .await?;

        let html = reply.html();
        self.save_last_cause_list(&html).await;

        let cases = parse_cause_list(&html, date);
        let result = CauseListResult::new(date, cases);
        let message = format!("Found {} cases", result.total_cases);
        let empty = result.total_cases == 0;

        let envelope = OperationResult::ok(result, message).with_html(html);
        Ok(if empty { envelope.with_code(ErrorCode::ParseEmpty) } else { envelope })
    }

    async fn run_complex_sweep(
        &mut self,
        location: &Location,
        date: Option<&str>,
        kind: CaseKind,
        captcha: Option<&str>,
    ) -> ScrapeResult<OperationResult<ComplexCauseLists>> {
        let date = date
            .filter(|d| !d.trim().is_empty())
            .map(String::from)
            .unwrap_or_else(|| model::format_portal_date(model::today()));

        let query = HierarchyQuery::Courts {
            state: location.state_code.clone(),
            district: location.dist_code.clone(),
            complex: location.complex().complex_id,
        };
        let courts = self.run_hierarchy(&query).await?.data.unwrap_or_default();
        if courts.is_empty() {
            return Err(ScrapeError::ParseEmpty("No courts found in complex".to_string()));
        }
        info!("Fetching cause lists for {} courts in complex {}", courts.len(), location.complex_code);

        let captcha = self.captcha_code(captcha).await?;
        let mut results = Vec::with_capacity(courts.len());
        let mut rejected = false;
        for node in courts {
            let result = if rejected {
                OperationResult::failed(&ScrapeError::InvalidCaptcha)
            } else {
                info!("Fetching cause list for: {}", node.name);
                match CourtCode::parse(&node.code) {
                    Ok(court) => {
                        let fetched = self.fetch_cause_list(location, &court, &date, kind, Some(&node.name), &captcha).await;
                        finish("cause list", fetched)
                    }
                    Err(e) => OperationResult::failed(&e),
                }
            };
            if !rejected && result.is_invalid_captcha() {
                warn!("Captcha rejected at {}; remaining courts are not submitted", node.name);
                rejected = true;
            }
            results.push(CourtCauseList {
                court: node.name,
                court_code: node.code,
                result,
            });
        }

        let successful = results.iter().filter(|r| r.result.success).count();
        let total = results.len();
        let sweep = ComplexCauseLists {
            complex_code: location.complex_code.clone(),
            date,
            total_courts: total,
            successful,
            courts: results,
        };
        if rejected {
            return Ok(OperationResult::failed(&ScrapeError::InvalidCaptcha).with_data(sweep));
        }
        Ok(OperationResult::ok(sweep, format!("Downloaded {}/{} cause lists", successful, total)))
    }

    /// Supplied code, or one from the mediator; never empty on success
    async fn captcha_code(&mut self, supplied: Option<&str>) -> ScrapeResult<String> {
        if let Some(code) = supplied.map(str::trim).filter(|c| !c.is_empty()) {
            return Ok(code.to_string());
        }

        let code = self.captcha.obtain_code(&mut self.session).await;
        let code = code.trim();
        if code.is_empty() {
            Err(ScrapeError::CaptchaRequired)
        } else {
            Ok(code.to_string())
        }
    }

    /// Submit, classify, and replay once with a rotated token if the portal hands one back
    async fn exchange(&mut self, submission: &Submission<'_>) -> ScrapeResult<Reply> {
        let mut token = self.session.require_token(false).await?;
        let mut attempt = 1;

        loop {
            let (reply, used_token) = self.attempt(submission, &token).await?;
            match next_step(Outcome::classify(&reply.payload, &used_token), attempt) {
                Step::Proceed => {
                    if let Some(fresh) = reply.payload.app_token() {
                        self.session.adopt_token(fresh);
                    }
                    return Ok(reply);
                }
                Step::RetryWith(rotated) => {
                    warn!(
                        "{} rejected, retrying once with rotated token {}...",
                        submission.name(),
                        preview(&rotated)
                    );
                    self.session.adopt_token(&rotated);
                    token = rotated;
                    attempt += 1;
                }
                Step::Fail(ScrapeError::InvalidCaptcha) => {
                    // The next challenge must come with a fresh token
                    self.session.invalidate_token();
                    return Err(ScrapeError::InvalidCaptcha);
                }
                Step::Fail(e) => return Err(e),
            }
        }
    }

    /// One full request sequence; returns the reply and the token the final request carried
    async fn attempt(&mut self, submission: &Submission<'_>, token: &str) -> ScrapeResult<(Reply, String)> {
        let mut token = token.to_string();

        let reply = match submission {
            Submission::Hierarchy(query) => {
                let (endpoint, mut form) = hierarchy_form(query);
                form.push(("ajax_req", "true".to_string()));
                form.push(("app_token", token.clone()));
                self.post(endpoint, &form).await?
            }
            Submission::Cnr { cnr, captcha } => {
                let form = vec![
                    ("cino", cnr.to_string()),
                    ("fcaptcha_code", captcha.to_string()),
                    ("ajax_req", "true".to_string()),
                    ("app_token", token.clone()),
                ];
                self.post(Endpoint::SearchByCnr, &form).await?
            }
            Submission::CaseNumber { query, captcha } => {
                let form = vec![
                    ("p", Endpoint::SubmitCaseNo.route().to_string()),
                    ("state_code", query.location.state_code.clone()),
                    ("dist_code", query.location.dist_code.clone()),
                    ("court_complex_code", query.location.complex().complex_id),
                    ("est_code", query.est_code.clone()),
                    ("case_type", query.case_type.clone()),
                    ("case_no", query.case_number.clone()),
                    ("rgyear", query.year.clone()),
                    ("case_captcha_code", captcha.to_string()),
                    ("ajax_req", "true".to_string()),
                    ("app_token", token.clone()),
                ];
                self.post(Endpoint::SubmitCaseNo, &form).await?
            }
            Submission::CauseList {
                location,
                court,
                date,
                kind,
                court_name,
                captcha,
            } => {
                self.cause_list_preflight(location, court, &mut token).await?;

                // Field order follows the portal's own form
                let form = vec![
                    ("CL_court_no", court.as_str().to_string()),
                    ("causelist_date", date.to_string()),
                    ("cause_list_captcha_code", captcha.to_string()),
                    ("court_name_txt", court_name.to_string()),
                    ("state_code", location.state_code.clone()),
                    ("dist_code", location.dist_code.clone()),
                    ("court_complex_code", location.complex().complex_id),
                    ("est_code", "null".to_string()),
                    ("cicri", kind.as_str().to_string()),
                    ("selprevdays", "0".to_string()),
                    ("ajax_req", "true".to_string()),
                    ("app_token", token.clone()),
                ];
                self.post(Endpoint::SubmitCauseList, &form).await?
            }
        };

        Ok((reply, token))
    }

    /// The calls the portal front-end makes before it submits a cause-list query.
    ///
    /// Order matters: district twice, complex selection, captcha handshake, list init.
    async fn cause_list_preflight(&mut self, location: &Location, court: &CourtCode, token: &mut String) -> ScrapeResult<()> {
        let complex = location.complex();
        let est_list = complex
            .establishments
            .clone()
            .unwrap_or_else(|| court.establishment().to_string());
        let flag = complex.flag.clone().unwrap_or_else(|| "N".to_string());
        debug!("Cause-list preflight for complex {} with establishments {}", complex.complex_id, est_list);

        let steps: [(Endpoint, Vec<(&str, String)>); 5] = [
            (
                Endpoint::FillDistrict,
                vec![("state_code", location.state_code.clone())],
            ),
            (
                Endpoint::FillDistrict,
                vec![
                    ("state_code", location.state_code.clone()),
                    ("dist_code", location.dist_code.clone()),
                ],
            ),
            (
                Endpoint::SetData,
                vec![
                    ("complex_code", format!("{}@{}@{}", complex.complex_id, est_list, flag)),
                    ("selected_state_code", location.state_code.clone()),
                    ("selected_dist_code", location.dist_code.clone()),
                    ("selected_est_code", "null".to_string()),
                ],
            ),
            (Endpoint::GetCaptcha, Vec::new()),
            (
                Endpoint::FillCauseList,
                vec![
                    ("state_code", location.state_code.clone()),
                    ("dist_code", location.dist_code.clone()),
                    ("court_complex_code", complex.complex_id.clone()),
                    ("est_code", est_list.clone()),
                ],
            ),
        ];

        for (endpoint, mut form) in steps {
            form.push(("ajax_req", "true".to_string()));
            form.push(("app_token", token.clone()));

            let reply = self.post(endpoint, &form).await?;
            if let Some(fresh) = reply.payload.app_token() {
                if fresh != token.as_str() {
                    debug!("{} rotated token to {}...", endpoint.label(), preview(fresh));
                    *token = fresh.to_string();
                    self.session.adopt_token(fresh);
                }
            }
        }

        Ok(())
    }

    async fn post(&mut self, endpoint: Endpoint, form: &[(&str, String)]) -> ScrapeResult<Reply> {
        let response = self.session.post_form(endpoint, form).await?;
        let text = response.text();
        let payload = PortalResponse::from_text(&text);
        Ok(Reply { text, payload })
    }

    async fn save_last_cause_list(&self, html: &str) {
        if !self.output.save_raw_html {
            return;
        }

        let path = self.output.dir.join(LAST_CAUSE_LIST_FILE);
        let written = async {
            tokio::fs::create_dir_all(&self.output.dir).await?;
            tokio::fs::write(&path, html).await
        }
        .await;

        match written {
            Ok(()) => info!("Saved raw HTML to {} (len={})", path.display(), html.len()),
            Err(e) => warn!("Failed to save raw HTML to {}: {}", path.display(), e),
        }
    }
}

fn hierarchy_form(query: &HierarchyQuery) -> (Endpoint, Vec<(&'static str, String)>) {
    match query {
        HierarchyQuery::States => (Endpoint::CauseListPage, Vec::new()),
        HierarchyQuery::Districts { state } => (Endpoint::FillDistrict, vec![("state_code", state.clone())]),
        HierarchyQuery::Complexes { state, district } => (
            Endpoint::FillComplex,
            vec![("state_code", state.clone()), ("dist_code", district.clone())],
        ),
        HierarchyQuery::Courts { state, district, complex } => (
            Endpoint::FillCauseList,
            vec![
                ("state_code", state.clone()),
                ("dist_code", district.clone()),
                ("court_complex_code", complex.clone()),
                ("est_code", "undefined".to_string()),
                ("search_act", "undefined".to_string()),
            ],
        ),
    }
}

/// Parse a case-status reply; nothing parsed is a failed result that still carries the HTML
fn case_result(reply: &Reply) -> OperationResult<CaseRecord> {
    case_result_on(reply, model::today())
}

fn case_result_on(reply: &Reply, today: NaiveDate) -> OperationResult<CaseRecord> {
    let html = case_html(reply);
    match parse_case_details(&html, today) {
        Some(record) => OperationResult::ok(record, "Case found").with_html(html),
        None => OperationResult::failed(&ScrapeError::ParseEmpty("Case not found".to_string())).with_html(html),
    }
}

/// Case-status HTML: `case_data`, else the first JSON string holding a table, else the raw body
fn case_html(reply: &Reply) -> String {
    if let Some(html) = reply.payload.field(&["case_data"]) {
        return html;
    }
    reply
        .payload
        .string_values()
        .into_iter()
        .find(|value| value.contains("<table"))
        .map(String::from)
        .unwrap_or_else(|| reply.text.clone())
}

/// Operation boundary: every error becomes a failed envelope
fn finish<T>(operation: &str, result: ScrapeResult<OperationResult<T>>) -> OperationResult<T> {
    match result {
        Ok(envelope) => envelope,
        Err(e) => {
            error!("{} failed: {}", operation, e);
            OperationResult::failed(&e)
        }
    }
}

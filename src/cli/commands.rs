use anyhow::{Context as _, Result};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

use super::config::ScraperConfig;
use super::display::{render_result, Render};
use super::LocationArgs;
use crate::captcha::{ConsolePrompter, Prompter};
use crate::court::{CaseNumberQuery, CauseListRequest, CourtScraper, OperationResult};
use crate::model::{self, CaseKind, HierarchyLevel, HierarchyNode, Location, PORTAL_DATE_FORMAT};
use crate::render::{export_pdf, pdf_file_name, renderer_from_settings};

/// Options shared by every portal command
pub struct Context {
    pub profile: Option<String>,
    pub use_ocr: bool,
    pub output_json: Option<PathBuf>,
    pub output_text: Option<PathBuf>,
}

impl Context {
    fn config(&self) -> Result<ScraperConfig> {
        ScraperConfig::load(self.profile.as_deref()).context(match &self.profile {
            Some(name) => format!("Failed to load profile: {}", name),
            None => "Failed to load default configuration".to_string(),
        })
    }

    fn scraper(&self, config: &ScraperConfig) -> Result<CourtScraper> {
        CourtScraper::from_config(config, self.use_ocr).context("Failed to set up portal session")
    }
}

pub struct CauseListOptions {
    pub location: LocationArgs,
    pub court: Option<String>,
    pub date: String,
    pub kind: String,
    pub court_name: Option<String>,
    pub stats: bool,
    pub pdf: bool,
    pub captcha: Option<String>,
}

impl LocationArgs {
    fn to_location(&self) -> Location {
        Location::new(&self.state, &self.district, &self.complex)
    }
}

/// Cause-list date from the CLI flags, formatted for the portal
pub fn resolve_date(date: Option<&str>, today: bool, tomorrow: bool) -> Result<String> {
    resolve_date_on(date, today, tomorrow, model::today())
}

fn resolve_date_on(date: Option<&str>, today: bool, tomorrow: bool, now: NaiveDate) -> Result<String> {
    if tomorrow {
        return Ok(model::format_portal_date(now + Duration::days(1)));
    }
    match date {
        Some(date) if !today => {
            let parsed = NaiveDate::parse_from_str(date.trim(), PORTAL_DATE_FORMAT)
                .context(format!("Invalid date '{}', expected DD-MM-YYYY", date))?;
            Ok(model::format_portal_date(parsed))
        }
        _ => Ok(model::format_portal_date(now)),
    }
}

/// Print a result and write the requested exports; a failed result becomes an error
fn report<T: Render + Serialize>(ctx: &Context, result: &OperationResult<T>) -> Result<()> {
    let text = render_result(result);
    print!("{}", text);
    write_exports(ctx, result, &text)?;

    if result.success {
        Ok(())
    } else {
        anyhow::bail!("{}", result.message)
    }
}

fn write_exports<T: Serialize>(ctx: &Context, result: &OperationResult<T>, text: &str) -> Result<()> {
    if let Some(path) = &ctx.output_json {
        let json = serde_json::to_string_pretty(result).context("Failed to serialize result")?;
        std::fs::write(path, json).context(format!("Failed to write {}", path.display()))?;
        info!("Result written to: {}", path.display());
    }
    if let Some(path) = &ctx.output_text {
        std::fs::write(path, text).context(format!("Failed to write {}", path.display()))?;
        info!("Result written to: {}", path.display());
    }
    Ok(())
}

fn log_metrics(scraper: &CourtScraper) {
    let metrics = scraper.metrics();
    debug!("Portal traffic: {}", metrics.summary());
    if let Ok(json) = serde_json::to_string(metrics) {
        trace!("Portal traffic detail: {}", json);
    }
}

/// List one level of the court hierarchy
pub async fn hierarchy(ctx: &Context, level: HierarchyLevel, parents: Vec<String>) -> Result<()> {
    let config = ctx.config()?;
    let mut scraper = ctx.scraper(&config)?;

    let result = scraper.lookup_hierarchy(level, &parents).await;
    log_metrics(&scraper);
    report(ctx, &result)
}

/// Walk the hierarchy interactively and print the chosen codes
pub async fn select(ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let mut scraper = ctx.scraper(&config)?;
    let prompter = ConsolePrompter;

    let mut parents: Vec<String> = Vec::new();
    let mut chosen: Vec<HierarchyNode> = Vec::new();

    for level in [
        HierarchyLevel::State,
        HierarchyLevel::District,
        HierarchyLevel::CourtComplex,
        HierarchyLevel::Court,
    ] {
        let result = scraper.lookup_hierarchy(level, &parents).await;
        let nodes = match result.data {
            Some(nodes) if !nodes.is_empty() => nodes,
            _ => anyhow::bail!("No {} entries available: {}", level, result.message),
        };

        print!("\n{}", nodes.render());
        let node = pick(&prompter, level, &nodes).await?;
        println!("Selected {}: {} ({})", level, node.name, node.code);

        parents.push(node.code.clone());
        chosen.push(node);
    }

    log_metrics(&scraper);
    println!(
        "\necourts cause-list --state {} --district {} --complex {} --court '{}' --court-name '{}'",
        chosen[0].code, chosen[1].code, chosen[2].code, chosen[3].code, chosen[3].name
    );
    Ok(())
}

async fn pick(prompter: &dyn Prompter, level: HierarchyLevel, nodes: &[HierarchyNode]) -> Result<HierarchyNode> {
    // Two tries, then give up
    for _ in 0..2 {
        let answer = prompter.ask(&format!("Select {} [1-{}]: ", level, nodes.len())).await;
        match answer.parse::<usize>() {
            Ok(n) if (1..=nodes.len()).contains(&n) => return Ok(nodes[n - 1].clone()),
            _ => println!("Please enter a number between 1 and {}", nodes.len()),
        }
    }
    anyhow::bail!("No {} selected", level)
}

/// Look up a case by CNR
pub async fn cnr(ctx: &Context, cnr: String, captcha: Option<String>) -> Result<()> {
    let config = ctx.config()?;
    let mut scraper = ctx.scraper(&config)?;

    let mut result = scraper.search_by_cnr(&cnr, captcha.as_deref()).await;
    if result.is_invalid_captcha() && captcha.is_none() {
        println!("Invalid captcha, try again.");
        result = scraper.search_by_cnr(&cnr, None).await;
    }

    log_metrics(&scraper);
    report(ctx, &result)
}

/// Look up a case by type, number and year
pub async fn case(
    ctx: &Context,
    location: LocationArgs,
    est: String,
    case_type: String,
    number: String,
    year: String,
    captcha: Option<String>,
) -> Result<()> {
    let config = ctx.config()?;
    let mut scraper = ctx.scraper(&config)?;
    let query = CaseNumberQuery {
        location: location.to_location(),
        est_code: est,
        case_type,
        case_number: number,
        year,
    };

    let mut result = scraper.search_by_case_details(&query, captcha.as_deref()).await;
    if result.is_invalid_captcha() && captcha.is_none() {
        println!("Invalid captcha, try again.");
        result = scraper.search_by_case_details(&query, None).await;
    }

    log_metrics(&scraper);
    report(ctx, &result)
}

/// Fetch one court's cause list
pub async fn cause_list(ctx: &Context, options: CauseListOptions) -> Result<()> {
    let config = ctx.config()?;
    let mut scraper = ctx.scraper(&config)?;

    let request = CauseListRequest {
        location: options.location.to_location(),
        court_code: options.court.clone().unwrap_or_default(),
        date: Some(options.date.clone()),
        kind: CaseKind::normalize(&options.kind),
        court_name: options.court_name.clone(),
    };

    let mut result = scraper.get_cause_list(&request, options.captcha.as_deref()).await;
    if result.is_invalid_captcha() && options.captcha.is_none() {
        println!("Invalid captcha, try again.");
        result = scraper.get_cause_list(&request, None).await;
    }
    log_metrics(&scraper);

    if result.success {
        if let (true, Some(data)) = (options.stats, &result.data) {
            println!("\n{}", data.stats().render());
        }
        if options.pdf {
            save_pdf(&config, &request, &options.date, result.html.as_deref()).await;
        }
    }

    report(ctx, &result)
}

async fn save_pdf(config: &ScraperConfig, request: &CauseListRequest, date: &str, html: Option<&str>) {
    let renderer = renderer_from_settings(&config.pdf);
    let file_name = pdf_file_name(&request.location, &request.court_code, date);

    match export_pdf(renderer.as_ref(), html.unwrap_or_default(), &config.output.dir, &file_name).await {
        Ok(path) => println!("PDF saved to: {}", path.display()),
        Err(e) => warn!("{:#}", e),
    }
}

/// Fetch the cause list of every court in a complex with one captcha
pub async fn cause_list_all_courts(ctx: &Context, options: CauseListOptions) -> Result<()> {
    let config = ctx.config()?;
    let mut scraper = ctx.scraper(&config)?;
    let location = options.location.to_location();
    let kind = CaseKind::normalize(&options.kind);

    let mut result = scraper
        .cause_lists_for_complex(&location, Some(&options.date), kind, options.captcha.as_deref())
        .await;
    if result.is_invalid_captcha() && options.captcha.is_none() {
        println!("Invalid captcha, try again.");
        result = scraper.cause_lists_for_complex(&location, Some(&options.date), kind, None).await;
    }
    log_metrics(&scraper);

    if let (true, Some(sweep)) = (options.pdf, &result.data) {
        for court in sweep.courts.iter().filter(|c| c.result.success) {
            let request = CauseListRequest {
                location: location.clone(),
                court_code: court.court_code.clone(),
                date: Some(options.date.clone()),
                kind,
                court_name: Some(court.court.clone()),
            };
            save_pdf(&config, &request, &options.date, court.result.html.as_deref()).await;
        }
    }

    report(ctx, &result)
}

/// Fetch a captcha image and report where it was saved
pub async fn captcha(ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let mut scraper = ctx.scraper(&config)?;

    let (challenge, saved) = scraper.fetch_captcha().await;
    log_metrics(&scraper);

    match (challenge.source, saved) {
        (Some(source), Some(path)) => {
            println!("Captcha saved to: {} (via {:?})", path.display(), source);
            Ok(())
        }
        (Some(source), None) => {
            println!("Captcha fetched via {:?} but not saved; set captcha.image_dir", source);
            Ok(())
        }
        _ => anyhow::bail!("Captcha image could not be fetched from any endpoint"),
    }
}

/// List all available configuration profiles
pub fn list_profiles() -> Result<()> {
    let profiles = ScraperConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Show a profile, creating it from defaults if it does not exist
pub fn manage_profile(profile_name: String) -> Result<()> {
    match ScraperConfig::load_profile(&profile_name) {
        Ok(config) => {
            println!("Profile: {}", profile_name);
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Err(_) => {
            warn!("Profile '{}' does not exist. Creating a default profile.", profile_name);
            let path = ScraperConfig::default().save_as_profile(&profile_name)?;
            println!("Created default profile: {} ({})", profile_name, path.display());
        }
    }

    Ok(())
}

/// Show the configuration in effect
pub fn show_config(profile: Option<&str>) -> Result<()> {
    let config = ScraperConfig::load(profile)?;
    println!("Current configuration:");
    print!("{}", serde_yaml::to_string(&config)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::prompt::MockPrompter;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_date() {
        let now = day(2025, 10, 17);
        assert_eq!(resolve_date_on(None, false, false, now).unwrap(), "17-10-2025");
        assert_eq!(resolve_date_on(None, true, false, now).unwrap(), "17-10-2025");
        assert_eq!(resolve_date_on(None, false, true, now).unwrap(), "18-10-2025");
        assert_eq!(resolve_date_on(Some("1-2-2025"), false, false, now).unwrap(), "01-02-2025");
        assert!(resolve_date_on(Some("2025-02-01"), false, false, now).is_err());
    }

    fn nodes() -> Vec<HierarchyNode> {
        vec![
            HierarchyNode { code: "16".into(), name: "Karnataka".into() },
            HierarchyNode { code: "3".into(), name: "Kerala".into() },
        ]
    }

    #[tokio::test]
    async fn test_pick_retries_bad_input() {
        let mut prompter = MockPrompter::new();
        let mut answers = vec!["2".to_string(), "9".to_string()];
        prompter.expect_ask().times(2).returning(move |_| answers.pop().unwrap_or_default());

        let node = pick(&prompter, HierarchyLevel::State, &nodes()).await.unwrap();
        assert_eq!(node.code, "3");
    }

    #[tokio::test]
    async fn test_pick_gives_up() {
        let mut prompter = MockPrompter::new();
        prompter.expect_ask().times(2).returning(|_| "x".to_string());
        assert!(pick(&prompter, HierarchyLevel::State, &nodes()).await.is_err());
    }
}

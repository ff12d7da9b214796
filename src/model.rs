use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ScrapeError, ScrapeResult};

/// Date format the portal expects for cause-list queries
pub const PORTAL_DATE_FORMAT: &str = "%d-%m-%Y";

/// Formats accepted when reading hearing dates back out of HTML
const HEARING_DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d", "%d.%m.%Y"];

/// Level of the State → District → CourtComplex → Court tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    State,
    District,
    CourtComplex,
    Court,
}

impl HierarchyLevel {
    /// Number of parent codes needed to list this level
    pub fn parent_count(self) -> usize {
        match self {
            Self::State => 0,
            Self::District => 1,
            Self::CourtComplex => 2,
            Self::Court => 3,
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::State => "state",
            Self::District => "district",
            Self::CourtComplex => "court complex",
            Self::Court => "court",
        };
        f.write_str(name)
    }
}

/// A single selectable entry of the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub code: String,
    pub name: String,
}

/// Which list to fetch, with the parent codes it is scoped by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyQuery {
    States,
    Districts { state: String },
    Complexes { state: String, district: String },
    Courts { state: String, district: String, complex: String },
}

impl HierarchyQuery {
    /// Build a query from a level and its parent codes, outermost first
    pub fn from_parents(level: HierarchyLevel, parents: &[String]) -> ScrapeResult<Self> {
        let needed = level.parent_count();
        if parents.len() != needed || parents.iter().any(|p| p.trim().is_empty()) {
            return Err(ScrapeError::Validation(format!(
                "{} lookup needs {} parent code(s), got {}",
                level,
                needed,
                parents.iter().filter(|p| !p.trim().is_empty()).count()
            )));
        }

        let code = |i: usize| parents[i].trim().to_string();
        Ok(match level {
            HierarchyLevel::State => Self::States,
            HierarchyLevel::District => Self::Districts { state: code(0) },
            HierarchyLevel::CourtComplex => Self::Complexes {
                state: code(0),
                district: code(1),
            },
            HierarchyLevel::Court => Self::Courts {
                state: code(0),
                district: code(1),
                complex: ComplexSelection::parse(&code(2)).complex_id,
            },
        })
    }

    pub fn level(&self) -> HierarchyLevel {
        match self {
            Self::States => HierarchyLevel::State,
            Self::Districts { .. } => HierarchyLevel::District,
            Self::Complexes { .. } => HierarchyLevel::CourtComplex,
            Self::Courts { .. } => HierarchyLevel::Court,
        }
    }
}

/// A complex option value, which may be the composite `complex@estlist@flag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelection {
    pub complex_id: String,
    pub establishments: Option<String>,
    pub flag: Option<String>,
}

impl ComplexSelection {
    pub fn parse(value: &str) -> Self {
        let mut parts = value.trim().splitn(3, '@');
        let complex_id = parts.next().unwrap_or_default().trim().to_string();
        let non_empty = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let establishments = non_empty(parts.next());
        let flag = non_empty(parts.next());

        Self {
            complex_id,
            establishments,
            flag,
        }
    }
}

/// Court key in the form `establishment_id^court_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtCode {
    raw: String,
}

impl CourtCode {
    pub fn parse(value: &str) -> ScrapeResult<Self> {
        let value = value.trim();
        if value.matches('^').count() != 1 {
            return Err(ScrapeError::Validation(format!(
                "Invalid court_code '{}' (must be est^court)",
                value
            )));
        }
        Ok(Self {
            raw: value.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn establishment(&self) -> &str {
        self.raw.split('^').next().unwrap_or_default()
    }

    pub fn court(&self) -> &str {
        self.raw.split('^').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for CourtCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// State, district and complex that scope a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub state_code: String,
    pub dist_code: String,
    /// Plain complex id or the composite option value
    pub complex_code: String,
}

impl Location {
    pub fn new(state_code: impl Into<String>, dist_code: impl Into<String>, complex_code: impl Into<String>) -> Self {
        Self {
            state_code: state_code.into(),
            dist_code: dist_code.into(),
            complex_code: complex_code.into(),
        }
    }

    pub fn complex(&self) -> ComplexSelection {
        ComplexSelection::parse(&self.complex_code)
    }
}

/// Cause-list bucket used by the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseKind {
    Civil,
    Criminal,
}

impl CaseKind {
    /// `cri`, `crim` and `criminal` (any case) are criminal, anything else is civil
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "cri" | "crim" | "criminal" => Self::Criminal,
            _ => Self::Civil,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Civil => "civ",
            Self::Criminal => "cri",
        }
    }
}

/// Case details extracted from a case-status page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_number: Option<String>,
    pub case_type: Option<String>,
    pub filing_date: Option<String>,
    pub petitioner: Option<String>,
    pub respondent: Option<String>,
    pub court_name: Option<String>,
    pub judge_name: Option<String>,
    pub next_hearing: Option<String>,
    pub status: Option<String>,
    pub serial_number: Option<String>,
    pub is_listed_today: bool,
    pub is_listed_tomorrow: bool,
}

/// One row of a court's daily cause list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseListEntry {
    pub serial_number: String,
    pub case_number: String,
    pub parties: String,
    pub purpose: String,
    pub court_name: String,
    pub next_hearing: String,
    pub date: String,
}

/// Cause-list rows in source-table order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseListResult {
    pub date: String,
    pub total_cases: usize,
    pub cases: Vec<CauseListEntry>,
}

impl CauseListResult {
    pub fn new(date: impl Into<String>, cases: Vec<CauseListEntry>) -> Self {
        Self {
            date: date.into(),
            total_cases: cases.len(),
            cases,
        }
    }

    pub fn stats(&self) -> CauseListStats {
        let mut by_purpose = BTreeMap::new();
        let mut by_court = BTreeMap::new();

        for case in &self.cases {
            let purpose = if case.purpose.is_empty() { "Unknown" } else { &case.purpose };
            let court = if case.court_name.is_empty() { "Unknown" } else { &case.court_name };
            *by_purpose.entry(purpose.to_string()).or_insert(0) += 1;
            *by_court.entry(court.to_string()).or_insert(0) += 1;
        }

        CauseListStats {
            total_cases: self.cases.len(),
            unique_purposes: by_purpose.len(),
            unique_courts: by_court.len(),
            by_purpose,
            by_court,
        }
    }
}

/// Aggregate counts over a cause list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseListStats {
    pub total_cases: usize,
    pub unique_purposes: usize,
    pub unique_courts: usize,
    pub by_purpose: BTreeMap<String, usize>,
    pub by_court: BTreeMap<String, usize>,
}

impl CauseListStats {
    /// Purposes sorted by descending count, ties by name
    pub fn top_purposes(&self, limit: usize) -> Vec<(&str, usize)> {
        top_counts(&self.by_purpose, limit)
    }

    pub fn top_courts(&self, limit: usize) -> Vec<(&str, usize)> {
        top_counts(&self.by_court, limit)
    }
}

fn top_counts(map: &BTreeMap<String, usize>, limit: usize) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    counts.truncate(limit);
    counts
}

/// Cause list of one court inside an all-courts sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourtCauseList {
    pub court: String,
    pub court_code: String,
    pub result: crate::court::OperationResult<CauseListResult>,
}

/// Outcome of running the cause list for every court of a complex
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexCauseLists {
    pub complex_code: String,
    pub date: String,
    pub total_courts: usize,
    pub successful: usize,
    pub courts: Vec<CourtCauseList>,
}

/// Parse the leading date token of a hearing text
pub fn parse_hearing_date(text: &str) -> Option<NaiveDate> {
    let token = text.split_whitespace().next()?;
    HEARING_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
}

/// `(is_listed_today, is_listed_tomorrow)` for a hearing text relative to `today`
pub fn listing_flags(next_hearing: Option<&str>, today: NaiveDate) -> (bool, bool) {
    match next_hearing.and_then(parse_hearing_date) {
        Some(date) => (date == today, date == today + Duration::days(1)),
        None => (false, false),
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_portal_date(date: NaiveDate) -> String {
    date.format(PORTAL_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_court_code() {
        let code = CourtCode::parse("346^11").unwrap();
        assert_eq!(code.establishment(), "346");
        assert_eq!(code.court(), "11");

        assert!(CourtCode::parse("34611").is_err());
        assert!(CourtCode::parse("3^4^6").is_err());
    }

    #[test]
    fn test_complex_selection() {
        let sel = ComplexSelection::parse("1360016@1,2,3@N");
        assert_eq!(sel.complex_id, "1360016");
        assert_eq!(sel.establishments.as_deref(), Some("1,2,3"));
        assert_eq!(sel.flag.as_deref(), Some("N"));

        let plain = ComplexSelection::parse("1360016");
        assert_eq!(plain.complex_id, "1360016");
        assert_eq!(plain.establishments, None);
    }

    #[test]
    fn test_case_kind_normalization() {
        for value in ["cri", "CRIM", "Criminal", " crim "] {
            assert_eq!(CaseKind::normalize(value), CaseKind::Criminal);
        }
        for value in ["civ", "civil", "", "crime", "criminally"] {
            assert_eq!(CaseKind::normalize(value), CaseKind::Civil);
        }
        assert_eq!(CaseKind::Criminal.as_str(), "cri");
    }

    #[test]
    fn test_hierarchy_query_from_parents() {
        assert_eq!(
            HierarchyQuery::from_parents(HierarchyLevel::State, &[]).unwrap(),
            HierarchyQuery::States
        );

        let courts = HierarchyQuery::from_parents(
            HierarchyLevel::Court,
            &["16".to_string(), "13".to_string(), "1360016@1,2@N".to_string()],
        )
        .unwrap();
        assert_eq!(
            courts,
            HierarchyQuery::Courts {
                state: "16".into(),
                district: "13".into(),
                complex: "1360016".into(),
            }
        );

        assert!(HierarchyQuery::from_parents(HierarchyLevel::District, &[]).is_err());
        assert!(HierarchyQuery::from_parents(HierarchyLevel::District, &[" ".to_string()]).is_err());
    }

    #[test]
    fn test_parse_hearing_date_formats() {
        let expected = date(2025, 10, 17);
        for text in ["17-10-2025", "17/10/2025", "2025-10-17", "17.10.2025", "17-10-2025 (Hearing)"] {
            assert_eq!(parse_hearing_date(text), Some(expected), "{}", text);
        }
        assert_eq!(parse_hearing_date(""), None);
        assert_eq!(parse_hearing_date("not a date"), None);
    }

    #[test]
    fn test_listing_flags_are_exclusive() {
        let today = date(2025, 10, 17);
        assert_eq!(listing_flags(Some("17-10-2025"), today), (true, false));
        assert_eq!(listing_flags(Some("18-10-2025"), today), (false, true));
        assert_eq!(listing_flags(Some("19-10-2025"), today), (false, false));
        assert_eq!(listing_flags(Some("garbage"), today), (false, false));
        assert_eq!(listing_flags(None, today), (false, false));

        // month rollover
        assert_eq!(listing_flags(Some("01-11-2025"), date(2025, 10, 31)), (false, true));
    }

    #[test]
    fn test_cause_list_stats() {
        let entry = |purpose: &str, court: &str| CauseListEntry {
            serial_number: "1".into(),
            case_number: "OS/1/2020".into(),
            parties: String::new(),
            purpose: purpose.into(),
            court_name: court.into(),
            next_hearing: String::new(),
            date: "17-10-2025".into(),
        };
        let result = CauseListResult::new(
            "17-10-2025",
            vec![entry("Evidence", "Court 1"), entry("Evidence", "Court 2"), entry("", "Court 1")],
        );

        let stats = result.stats();
        assert_eq!(stats.total_cases, 3);
        assert_eq!(stats.unique_purposes, 2);
        assert_eq!(stats.unique_courts, 2);
        assert_eq!(stats.top_purposes(1), vec![("Evidence", 2)]);
        assert_eq!(stats.by_purpose.get("Unknown"), Some(&1));
    }
}

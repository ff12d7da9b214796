use std::fmt::Write;

use crate::court::OperationResult;
use crate::model::{CaseRecord, CauseListResult, CauseListStats, ComplexCauseLists, HierarchyNode};

const RULE: &str = "============================================================";

/// Types the CLI knows how to print
pub trait Render {
    fn render(&self) -> String;
}

impl Render for Vec<HierarchyNode> {
    fn render(&self) -> String {
        let width = self.iter().map(|n| n.code.len()).max().unwrap_or(0);
        let mut out = String::new();
        for (i, node) in self.iter().enumerate() {
            let _ = writeln!(out, "{:>3}. {:<width$}  {}", i + 1, node.code, node.name, width = width);
        }
        out
    }
}

impl Render for CaseRecord {
    fn render(&self) -> String {
        let fields = [
            ("Case Number", &self.case_number),
            ("Case Type", &self.case_type),
            ("Filing Date", &self.filing_date),
            ("Petitioner", &self.petitioner),
            ("Respondent", &self.respondent),
            ("Court", &self.court_name),
            ("Judge", &self.judge_name),
            ("Next Hearing", &self.next_hearing),
            ("Status", &self.status),
            ("Serial Number", &self.serial_number),
        ];

        let mut out = format!("{}\nCASE DETAILS\n{}\n", RULE, RULE);
        for (label, value) in fields {
            if let Some(value) = value {
                let _ = writeln!(out, "{:<14} {}", format!("{}:", label), value);
            }
        }
        if self.is_listed_today {
            out.push_str("\n>> Listed TODAY\n");
        } else if self.is_listed_tomorrow {
            out.push_str("\n>> Listed TOMORROW\n");
        }
        out
    }
}

impl Render for CauseListResult {
    fn render(&self) -> String {
        let mut out = format!("{}\nCAUSE LIST {} ({} cases)\n{}\n", RULE, self.date, self.total_cases, RULE);
        for case in &self.cases {
            let _ = writeln!(out, "{:>4}. {}", case.serial_number, case.case_number);
            if !case.parties.is_empty() {
                let _ = writeln!(out, "      Parties: {}", case.parties);
            }
            if !case.purpose.is_empty() {
                let _ = writeln!(out, "      Purpose: {}", case.purpose);
            }
            if !case.court_name.is_empty() {
                let _ = writeln!(out, "      Court:   {}", case.court_name);
            }
            if !case.next_hearing.is_empty() {
                let _ = writeln!(out, "      Next:    {}", case.next_hearing);
            }
        }
        out
    }
}

impl Render for CauseListStats {
    fn render(&self) -> String {
        let mut out = format!(
            "Total cases: {}\nUnique purposes: {}\nUnique courts: {}\n",
            self.total_cases, self.unique_purposes, self.unique_courts
        );
        out.push_str("\nTop purposes:\n");
        for (purpose, count) in self.top_purposes(10) {
            let _ = writeln!(out, "  {:>4}  {}", count, purpose);
        }
        out.push_str("\nBy court:\n");
        for (court, count) in self.top_courts(10) {
            let _ = writeln!(out, "  {:>4}  {}", count, court);
        }
        out
    }
}

impl Render for ComplexCauseLists {
    fn render(&self) -> String {
        let mut out = format!(
            "{}\nCOMPLEX {} on {}: {}/{} cause lists\n{}\n",
            RULE, self.complex_code, self.date, self.successful, self.total_courts, RULE
        );
        for court in &self.courts {
            let status = match (court.result.success, &court.result.data) {
                (true, Some(list)) => format!("{} cases", list.total_cases),
                _ => format!("failed: {}", court.result.message),
            };
            let _ = writeln!(out, "  {:<10} {:<40} {}", court.court_code, court.court, status);
        }
        out
    }
}

/// Formatted data on success, otherwise the failure line with its code
pub fn render_result<T: Render>(result: &OperationResult<T>) -> String {
    match (&result.data, result.success) {
        (Some(data), true) => format!("{}\n{}", result.message, data.render()),
        _ => {
            let code = result
                .code
                .and_then(|c| serde_json::to_value(c).ok())
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_else(|| "ERROR".to_string());
            format!("Failed [{}]: {}\n", code, result.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::model::CauseListEntry;

    #[test]
    fn test_render_cause_list() {
        let result = CauseListResult::new(
            "17-10-2025",
            vec![CauseListEntry {
                serial_number: "4".into(),
                case_number: "OS/12/2021".into(),
                parties: "Ram vs Shyam".into(),
                purpose: "Evidence".into(),
                court_name: String::new(),
                next_hearing: String::new(),
                date: "17-10-2025".into(),
            }],
        );
        let text = result.render();
        assert!(text.contains("CAUSE LIST 17-10-2025 (1 cases)"));
        assert!(text.contains("   4. OS/12/2021"));
        assert!(text.contains("Purpose: Evidence"));
        assert!(!text.contains("Court:"));
    }

    #[test]
    fn test_render_failure_shows_code() {
        let result: OperationResult<CaseRecord> = OperationResult::failed(&ScrapeError::InvalidCaptcha);
        assert_eq!(render_result(&result), "Failed [INVALID_CAPTCHA]: Invalid captcha\n");
    }

    #[test]
    fn test_render_case_listing_flag() {
        let record = CaseRecord {
            case_number: Some("OS/1/2020".into()),
            is_listed_tomorrow: true,
            ..CaseRecord::default()
        };
        let text = record.render();
        assert!(text.contains("Case Number:   OS/1/2020"));
        assert!(text.contains("Listed TOMORROW"));
    }
}

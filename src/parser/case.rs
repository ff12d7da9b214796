use chrono::NaiveDate;
use scraper::Html;

use super::{element_text, own_rows, row_cells, selector};
use crate::model::{listing_flags, CaseRecord};

/// Fields a label can populate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaseField {
    CaseNumber,
    CaseType,
    FilingDate,
    Petitioner,
    Respondent,
    CourtName,
    JudgeName,
    NextHearing,
    Status,
}

/// Map a lowercased label onto a field; first matching rule wins
fn classify_label(label: &str) -> Option<CaseField> {
    let has = |needle: &str| label.contains(needle);

    if has("case number") || has("case no") {
        Some(CaseField::CaseNumber)
    } else if has("case type") {
        Some(CaseField::CaseType)
    } else if has("filing") {
        Some(CaseField::FilingDate)
    } else if has("petitioner") || has("plaintiff") {
        Some(CaseField::Petitioner)
    } else if has("respondent") || has("defendant") {
        Some(CaseField::Respondent)
    } else if has("court") && has("name") {
        Some(CaseField::CourtName)
    } else if has("judge") || has("coram") {
        Some(CaseField::JudgeName)
    } else if has("next") && (has("date") || has("hearing")) {
        Some(CaseField::NextHearing)
    } else if has("status") {
        Some(CaseField::Status)
    } else {
        None
    }
}

/// Extract case details from label/value table rows.
///
/// Returns `None` when no case number was found, which callers report as
/// "case not found".
pub fn parse_case_details(html: &str, today: NaiveDate) -> Option<CaseRecord> {
    let document = Html::parse_document(html);
    let tables = selector("table");
    let mut record = CaseRecord::default();

    for table in document.select(&tables) {
        for row in own_rows(table) {
            let cells = row_cells(row, &["td", "th"]);
            if cells.len() < 2 {
                continue;
            }

            let label = element_text(cells[0]).to_lowercase();
            let value = element_text(cells[1]);
            if value.is_empty() || value == "-" {
                continue;
            }

            let Some(field) = classify_label(&label) else {
                continue;
            };
            let slot = match field {
                CaseField::CaseNumber => &mut record.case_number,
                CaseField::CaseType => &mut record.case_type,
                CaseField::FilingDate => &mut record.filing_date,
                CaseField::Petitioner => &mut record.petitioner,
                CaseField::Respondent => &mut record.respondent,
                CaseField::CourtName => &mut record.court_name,
                CaseField::JudgeName => &mut record.judge_name,
                CaseField::NextHearing => &mut record.next_hearing,
                CaseField::Status => &mut record.status,
            };
            *slot = Some(value);
        }
    }

    let (listed_today, listed_tomorrow) = listing_flags(record.next_hearing.as_deref(), today);
    record.is_listed_today = listed_today;
    record.is_listed_tomorrow = listed_tomorrow;

    record.case_number.is_some().then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 17).unwrap()
    }

    const CASE_PAGE: &str = r#"
        <html><body>
        <table class="case_details_table">
          <tr><th>Case Type</th><td>O.S. - Original Suit</td></tr>
          <tr><td>Filing Number</td><td>1234/2020</td></tr>
          <tr><td>Registration Number / Case No</td><td>OS/12/2020</td></tr>
          <tr><td>CNR Number</td><td>KAHN010012342020</td></tr>
        </table>
        <table class="case_status_table">
          <tr><td>First Hearing Date</td><td>-</td></tr>
          <tr><td>Next Hearing Date</td><td>18-10-2025</td></tr>
          <tr><td>Case Status</td><td>Pending</td></tr>
          <tr><td>Court Number and Judge</td><td>7-Additional Sub Judge</td></tr>
        </table>
        <table class="Petitioner_Advocate_table">
          <tr><td>Petitioner</td><td>Ram Kumar</td></tr>
          <tr><td>Respondent</td><td>Shyam Lal</td></tr>
          <tr><td>Only one cell</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_case_details() {
        let record = parse_case_details(CASE_PAGE, today()).expect("case parsed");

        assert_eq!(record.case_number.as_deref(), Some("OS/12/2020"));
        assert_eq!(record.case_type.as_deref(), Some("O.S. - Original Suit"));
        assert_eq!(record.filing_date.as_deref(), Some("1234/2020"));
        assert_eq!(record.petitioner.as_deref(), Some("Ram Kumar"));
        assert_eq!(record.respondent.as_deref(), Some("Shyam Lal"));
        assert_eq!(record.judge_name.as_deref(), Some("7-Additional Sub Judge"));
        assert_eq!(record.status.as_deref(), Some("Pending"));
        assert_eq!(record.next_hearing.as_deref(), Some("18-10-2025"));
        assert!(!record.is_listed_today);
        assert!(record.is_listed_tomorrow);
    }

    #[test]
    fn test_dash_values_are_ignored() {
        let html = r#"<table>
            <tr><td>Case No</td><td>OS/1/2021</td></tr>
            <tr><td>Petitioner</td><td>-</td></tr>
            <tr><td>Respondent</td><td>  </td></tr>
        </table>"#;
        let record = parse_case_details(html, today()).unwrap();
        assert_eq!(record.petitioner, None);
        assert_eq!(record.respondent, None);
    }

    #[test]
    fn test_missing_case_number_is_not_found() {
        let html = r#"<table><tr><td>Petitioner</td><td>Ram Kumar</td></tr></table>"#;
        assert_eq!(parse_case_details(html, today()), None);
        assert_eq!(parse_case_details("<p>Record not found</p>", today()), None);
    }

    #[test]
    fn test_label_matching_is_case_insensitive() {
        assert_eq!(classify_label("case no"), Some(CaseField::CaseNumber));
        assert_eq!(classify_label(&"CASE NUMBER".to_lowercase()), Some(CaseField::CaseNumber));
        assert_eq!(classify_label("name of the court"), Some(CaseField::CourtName));
        assert_eq!(classify_label("coram"), Some(CaseField::JudgeName));
        assert_eq!(classify_label("next date"), Some(CaseField::NextHearing));
        assert_eq!(classify_label("advocate"), None);
    }
}

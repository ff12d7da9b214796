use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

use super::{element_text, own_rows, row_cells, selector};
use crate::model::CauseListEntry;

/// Marker separating the case number from the next hearing inside the case cell
pub const NEXT_HEARING_MARKER: &str = "Next hearing date:";

fn view_prefix() -> &'static Regex {
    static VIEW: OnceLock<Regex> = OnceLock::new();
    VIEW.get_or_init(|| Regex::new(r"^(?i)view\b\s*").expect("view prefix pattern"))
}

fn dash_prefix() -> &'static Regex {
    static DASH: OnceLock<Regex> = OnceLock::new();
    DASH.get_or_init(|| Regex::new(r"^-\s*").expect("dash prefix pattern"))
}

/// Extract cause-list rows from every table of the fragment.
///
/// The first row of each table is a header. Output order is source order.
pub fn parse_cause_list(html: &str, date: &str) -> Vec<CauseListEntry> {
    let document = Html::parse_document(html);
    let tables = selector("table");
    let mut entries = Vec::new();

    for table in document.select(&tables) {
        for (idx, row) in own_rows(table).into_iter().enumerate().skip(1) {
            let cells = row_cells(row, &["td"]);
            if cells.len() < 2 {
                continue;
            }

            let (case_number, next_hearing) = split_case_cell(&element_text(cells[1]));
            if case_number.is_empty() {
                continue;
            }

            let cell_text = |i: usize| cells.get(i).map(|c| element_text(*c)).unwrap_or_default();
            let serial = cell_text(0);

            entries.push(CauseListEntry {
                serial_number: if serial.is_empty() { idx.to_string() } else { serial },
                case_number,
                parties: cell_text(2),
                purpose: cell_text(3),
                court_name: cell_text(4),
                next_hearing,
                date: date.to_string(),
            });
        }
    }

    entries
}

/// Split "View OS/12/2020 Next hearing date: - 18-10-2025" into its two parts
fn split_case_cell(text: &str) -> (String, String) {
    let mut parts = text.splitn(2, NEXT_HEARING_MARKER);
    let case_part = parts.next().unwrap_or_default().trim();
    let hearing_part = parts.next().unwrap_or_default().trim();

    let case_number = view_prefix().replace(case_part, "").trim().to_string();
    let next_hearing = dash_prefix().replace(hearing_part, "").trim().to_string();
    (case_number, next_hearing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cause_list_table(rows: &[(&str, &str, &str, &str)]) -> String {
        let mut html = String::from(
            "<table><tr><th>Sr No</th><th>Cases</th><th>Party Name</th><th>Advocate/Purpose</th></tr>",
        );
        for (serial, case, parties, purpose) in rows {
            html.push_str(&format!(
                "<tr><td>{serial}</td><td><a href='#'>View</a><br>{case}<br>Next hearing date:- 24-10-2025</td><td>{parties}</td><td>{purpose}</td></tr>"
            ));
        }
        html.push_str("</table>");
        html
    }

    #[test]
    fn test_rows_in_source_order() {
        let rows = [
            ("3", "OS/12/2020", "Ram Vs Shyam", "Evidence"),
            ("1", "MC/7/2021", "Anita Vs State", "Hearing"),
            ("2", "EP/45/2019", "Bank Vs Ravi", "Steps"),
        ];
        let entries = parse_cause_list(&cause_list_table(&rows), "17-10-2025");

        assert_eq!(entries.len(), 3);
        let serials: Vec<&str> = entries.iter().map(|e| e.serial_number.as_str()).collect();
        assert_eq!(serials, vec!["3", "1", "2"]);
        for (entry, row) in entries.iter().zip(rows.iter()) {
            assert_eq!(entry.case_number, row.1);
            assert_eq!(entry.parties, row.2);
            assert_eq!(entry.purpose, row.3);
            assert_eq!(entry.next_hearing, "24-10-2025");
            assert_eq!(entry.date, "17-10-2025");
            assert!(!entry.case_number.starts_with("View"));
            assert!(!entry.next_hearing.starts_with('-'));
        }
    }

    #[test]
    fn test_optional_columns_and_missing_serial() {
        let html = r#"<table>
            <tr><td>header</td><td>header</td></tr>
            <tr><td></td><td>OS/1/2020</td></tr>
            <tr><td>2</td><td>View OS/2/2020</td><td>A Vs B</td><td>Orders</td><td>Court 3</td></tr>
        </table>"#;
        let entries = parse_cause_list(html, "17-10-2025");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].serial_number, "1");
        assert_eq!(entries[0].parties, "");
        assert_eq!(entries[0].next_hearing, "");
        assert_eq!(entries[1].case_number, "OS/2/2020");
        assert_eq!(entries[1].court_name, "Court 3");
    }

    #[test]
    fn test_rows_without_case_number_are_dropped() {
        let html = r#"<table>
            <tr><th>Sr</th><th>Case</th></tr>
            <tr><td colspan="4">Civil Cases</td></tr>
            <tr><td>1</td><td>View</td><td>A Vs B</td></tr>
            <tr><td>2</td><td>Next hearing date: 20-10-2025</td></tr>
            <tr><td>3</td><td>OS/9/2022</td></tr>
        </table>"#;
        let entries = parse_cause_list(html, "17-10-2025");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].serial_number, "3");
    }

    #[test]
    fn test_each_table_skips_its_own_header() {
        let first = cause_list_table(&[("1", "OS/1/2020", "A Vs B", "Evidence")]);
        let second = cause_list_table(&[("1", "CC/5/2023", "State Vs C", "Plea")]);
        let entries = parse_cause_list(&format!("{first}{second}"), "17-10-2025");

        let numbers: Vec<&str> = entries.iter().map(|e| e.case_number.as_str()).collect();
        assert_eq!(numbers, vec!["OS/1/2020", "CC/5/2023"]);
    }

    #[test]
    fn test_split_case_cell() {
        assert_eq!(
            split_case_cell("View OS/12/2020 Next hearing date: - 18-10-2025"),
            ("OS/12/2020".to_string(), "18-10-2025".to_string())
        );
        assert_eq!(
            split_case_cell("Viewing/1/2020"),
            ("Viewing/1/2020".to_string(), String::new())
        );
    }
}

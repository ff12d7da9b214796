//! Pure extraction of typed records from the HTML fragments the portal returns.
//!
//! Nothing in here touches the network or keeps state; every function takes the
//! raw markup and returns owned records.

pub mod case;
pub mod cause_list;
pub mod hierarchy;

pub use case::parse_case_details;
pub use cause_list::parse_cause_list;
pub use hierarchy::{parse_options, parse_state_select};

use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

/// Compile a selector that is known to be valid at build time
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid static selector {css}: {e:?}"))
}

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

/// Remove anything that looks like a markup tag
pub fn strip_tags(text: &str) -> String {
    tag_pattern().replace_all(text, "").trim().to_string()
}

/// Collapse whitespace runs into single spaces
pub fn squash_whitespace(text: &str) -> String {
    whitespace_pattern().replace_all(text.trim(), " ").into_owned()
}

/// Visible text of an element, text nodes joined by single spaces
pub fn element_text(element: ElementRef<'_>) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    squash_whitespace(&joined)
}

/// Rows that belong to `table` itself, not to tables nested inside it
pub(crate) fn own_rows<'a>(table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let rows = selector("tr");
    table
        .select(&rows)
        .filter(|row| {
            row.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "table")
                .map(|owner| owner.id())
                == Some(table.id())
        })
        .collect()
}

/// Direct cell children of a row, restricted to the given tag names
pub(crate) fn row_cells<'a>(row: ElementRef<'a>, tags: &[&str]) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| tags.contains(&cell.value().name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<b>7-Smt. Sruthy M</b>"), "7-Smt. Sruthy M");
        assert_eq!(strip_tags("no tags"), "no tags");
    }

    #[test]
    fn test_element_text_joins_nodes() {
        let html = Html::parse_document("<table><tr><td>Ram<br>vs<br> Shyam  Lal</td></tr></table>");
        let td = html.select(&selector("td")).next().unwrap();
        assert_eq!(element_text(td), "Ram vs Shyam Lal");
    }

    #[test]
    fn test_own_rows_skips_nested_tables() {
        let html = Html::parse_document(
            "<table id='outer'><tr><td>a</td></tr><tr><td><table><tr><td>inner</td></tr></table></td></tr></table>",
        );
        let outer = html.select(&selector("table#outer")).next().unwrap();
        assert_eq!(own_rows(outer).len(), 2);
    }
}

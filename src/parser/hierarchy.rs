use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use tracing::debug;

use super::{element_text, selector, squash_whitespace, strip_tags};
use crate::model::{HierarchyLevel, HierarchyNode};

/// Option values that never denote a real entry
const PLACEHOLDER_VALUES: &[&str] = &["", "0"];

/// Extra placeholders the court list is known to carry
const COURT_PLACEHOLDERS: &[&str] = &["null", "undefined"];

fn json_pair_pattern() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| Regex::new(r#",\s*"[^"]*":\s*[^,}]*"#).expect("json pair pattern"))
}

fn json_tail_pattern() -> &'static Regex {
    static TAIL: OnceLock<Regex> = OnceLock::new();
    TAIL.get_or_init(|| Regex::new(r#"\{\s*".*?\}\s*$"#).expect("json tail pattern"))
}

/// Parse every usable `<option>` of a fragment as an entry of `level`
pub fn parse_options(html: &str, level: HierarchyLevel) -> Vec<HierarchyNode> {
    let fragment = Html::parse_fragment(html);
    let options = selector("option");
    let nodes: Vec<HierarchyNode> = fragment
        .select(&options)
        .filter_map(|option| option_node(option, level))
        .collect();

    debug!("Parsed {} {} option(s)", nodes.len(), level);
    nodes
}

/// Read the state list out of the landing page's state `<select>`
pub fn parse_state_select(html: &str) -> Vec<HierarchyNode> {
    let document = Html::parse_document(html);

    let by_id = selector("select#sess_state_code");
    let by_name = selector(r#"select[name="state_code"]"#);
    let any_select = selector("select");
    let options = selector("option");

    let select = document
        .select(&by_id)
        .next()
        .or_else(|| document.select(&by_name).next())
        .or_else(|| {
            document.select(&any_select).find(|s| {
                s.value()
                    .id()
                    .map_or(false, |id| id.to_lowercase().contains("state"))
            })
        });

    match select {
        Some(select) => select
            .select(&options)
            .filter_map(|option| option_node(option, HierarchyLevel::State))
            .collect(),
        None => {
            debug!("No state dropdown found in landing page");
            Vec::new()
        }
    }
}

fn option_node(option: ElementRef<'_>, level: HierarchyLevel) -> Option<HierarchyNode> {
    let value = option.value().attr("value")?.trim();
    if PLACEHOLDER_VALUES.contains(&value) {
        return None;
    }

    let text = element_text(option);
    match level {
        HierarchyLevel::State | HierarchyLevel::District => Some(HierarchyNode {
            code: value.to_string(),
            name: text,
        }),
        HierarchyLevel::CourtComplex => Some(HierarchyNode {
            code: value.split('@').next().unwrap_or(value).trim().to_string(),
            name: text,
        }),
        HierarchyLevel::Court => {
            if COURT_PLACEHOLDERS.contains(&value.to_lowercase().as_str()) || !value.contains('^') {
                return None;
            }
            let name = clean_court_label(&text);
            if name.is_empty() {
                return None;
            }
            Some(HierarchyNode {
                code: value.to_string(),
                name,
            })
        }
    }
}

/// Strip embedded tags and the pseudo-JSON the portal sometimes appends to court labels
pub fn clean_court_label(text: &str) -> String {
    let name = strip_tags(text);
    let name = json_pair_pattern().replace_all(&name, "");
    let name = json_tail_pattern().replace_all(&name, "");
    squash_whitespace(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(nodes: &[HierarchyNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.code.as_str()).collect()
    }

    #[test]
    fn test_placeholder_options_excluded() {
        let html = r#"
            <option value="">Select district</option>
            <option value="0">--- Select ---</option>
            <option value=" 0 ">Zero padded</option>
            <option value="13">HASSAN</option>
            <option>No value attribute</option>
            <option value="14">MYSURU</option>
        "#;
        let nodes = parse_options(html, HierarchyLevel::District);
        assert_eq!(codes(&nodes), vec!["13", "14"]);
        assert_eq!(nodes[0].name, "HASSAN");
    }

    #[test]
    fn test_complex_codes_strip_suffix() {
        let html = r#"
            <option value="0">Select court complex</option>
            <option value="1360016@1,2,3@N">Court Complex-Arasikere</option>
            <option value="1360017">Court Complex-Belur</option>
            <option value="1360018@@Y">Court Complex-Hassan</option>
        "#;
        let nodes = parse_options(html, HierarchyLevel::CourtComplex);
        assert_eq!(codes(&nodes), vec!["1360016", "1360017", "1360018"]);
        assert_eq!(nodes[0].name, "Court Complex-Arasikere");
    }

    #[test]
    fn test_court_options_require_composite_key() {
        let html = r#"
            <option value="0">Select court</option>
            <option value="null">null</option>
            <option value="undefined">undefined</option>
            <option value="D">Establishments</option>
            <option value="346^11">7-Smt. Sruthy M-Additional Sub judge</option>
            <option value="346^12">8-Sri. Ravi{"est_code":"346","court_no":"12"}</option>
            <option value="346^13">9-Sri. Kumar, "court_no": 13</option>
        "#;
        let nodes = parse_options(html, HierarchyLevel::Court);
        assert_eq!(codes(&nodes), vec!["346^11", "346^12", "346^13"]);
        assert_eq!(nodes[0].name, "7-Smt. Sruthy M-Additional Sub judge");
        assert_eq!(nodes[1].name, "8-Sri. Ravi");
        assert_eq!(nodes[2].name, "9-Sri. Kumar");
    }

    #[test]
    fn test_clean_court_label_escaped_tags() {
        assert_eq!(clean_court_label("<b>1-Principal   Judge</b>"), "1-Principal Judge");
    }

    #[test]
    fn test_parse_state_select() {
        let page = r#"
            <html><body>
              <select id="other"><option value="99">Not a state</option></select>
              <select id="sess_state_code" name="state_code">
                <option value="0">Select State</option>
                <option value="16">Karnataka</option>
                <option value="4">Kerala</option>
              </select>
            </body></html>
        "#;
        let states = parse_state_select(page);
        assert_eq!(codes(&states), vec!["16", "4"]);
        assert_eq!(states[1].name, "Kerala");
    }

    #[test]
    fn test_parse_state_select_fallback_on_id_substring() {
        let page = r#"<select id="cl_State_select"><option value="2">Andhra Pradesh</option></select>"#;
        let states = parse_state_select(page);
        assert_eq!(codes(&states), vec!["2"]);

        assert!(parse_state_select("<p>no dropdown</p>").is_empty());
    }
}

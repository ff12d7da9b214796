use regex::Regex;
use scraper::Html;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

use crate::parser::selector;

/// Minimum length of a hex string accepted as an app_token
pub const MIN_TOKEN_LEN: usize = 20;

/// Where a token was found during bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Url,
    InputField,
    Script,
    PageText,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Url => "URL",
            Self::InputField => "input field",
            Self::Script => "inline script",
            Self::PageText => "page text",
        };
        f.write_str(name)
    }
}

fn script_pattern() -> &'static Regex {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    SCRIPT.get_or_init(|| {
        Regex::new(r#"app_token["'\s:=]+["']([a-fA-F0-9]{20,})["']"#).expect("script token pattern")
    })
}

fn text_pattern() -> &'static Regex {
    static TEXT: OnceLock<Regex> = OnceLock::new();
    TEXT.get_or_init(|| Regex::new(r"(?i)app_token=([a-f0-9]{20,})").expect("text token pattern"))
}

/// Hex string of at least [`MIN_TOKEN_LEN`] characters
pub fn is_plausible(token: &str) -> bool {
    token.len() >= MIN_TOKEN_LEN && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Shorten a token for log output
pub fn preview(token: &str) -> &str {
    token.get(..12).unwrap_or(token)
}

pub fn from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "app_token")
        .map(|(_, value)| value.trim().to_string())
        .filter(|token| is_plausible(token))
}

pub fn from_input(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let by_id = selector("input#app_token");
    let by_name = selector(r#"input[name="app_token"]"#);
    let any_input = selector("input[id]");

    document
        .select(&by_id)
        .chain(document.select(&by_name))
        .chain(document.select(&any_input).filter(|input| {
            input
                .value()
                .id()
                .map_or(false, |id| id.to_lowercase().contains("token"))
        }))
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|value| is_plausible(value))
        .map(String::from)
}

pub fn from_script(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let scripts = selector("script");

    document
        .select(&scripts)
        .map(|script| script.text().collect::<String>())
        .filter(|body| body.contains("app_token"))
        .find_map(|body| {
            script_pattern()
                .captures(&body)
                .map(|caps| caps[1].to_string())
        })
}

pub fn from_page_text(body: &str) -> Option<String> {
    text_pattern()
        .captures(body)
        .map(|caps| caps[1].to_string())
        .filter(|token| is_plausible(token))
}

/// Try every extraction method in order; the first plausible token wins
pub fn extract_token(url: &Url, body: &str) -> Option<(String, TokenSource)> {
    if let Some(token) = from_url(url) {
        return Some((token, TokenSource::Url));
    }
    if let Some(token) = from_input(body) {
        return Some((token, TokenSource::InputField));
    }
    if let Some(token) = from_script(body) {
        return Some((token, TokenSource::Script));
    }
    from_page_text(body).map(|token| (token, TokenSource::PageText))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0a1b2c3d4e5f60718293a4b5c6d7e8f9";

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_plausibility() {
        assert!(is_plausible(TOKEN));
        assert!(!is_plausible("abc123"));
        assert!(!is_plausible("zzzzzzzzzzzzzzzzzzzzzzzz"));
        assert!(!is_plausible(""));
    }

    #[test]
    fn test_from_url() {
        let found = from_url(&url(&format!("https://portal.example/?p=cause_list/&app_token={TOKEN}")));
        assert_eq!(found.as_deref(), Some(TOKEN));
        assert_eq!(from_url(&url("https://portal.example/?app_token=short")), None);
        assert_eq!(from_url(&url("https://portal.example/")), None);
    }

    #[test]
    fn test_from_input() {
        let html = format!(r#"<form><input type="hidden" name="app_token" value="{TOKEN}"></form>"#);
        assert_eq!(from_input(&html).as_deref(), Some(TOKEN));

        let by_id = format!(r#"<input id="csrfToken" value=" {TOKEN} ">"#);
        assert_eq!(from_input(&by_id).as_deref(), Some(TOKEN));

        assert_eq!(from_input(r#"<input name="app_token" value="">"#), None);
    }

    #[test]
    fn test_from_script() {
        let html = format!(r#"<script>var x = 1; app_token = "{TOKEN}";</script>"#);
        assert_eq!(from_script(&html).as_deref(), Some(TOKEN));

        let json_like = format!(r#"<script>init({{"app_token":"{TOKEN}"}});</script>"#);
        assert_eq!(from_script(&json_like).as_deref(), Some(TOKEN));

        assert_eq!(from_script("<script>var app_token = '';</script>"), None);
    }

    #[test]
    fn test_extraction_order() {
        let body = format!(
            r#"<a href="?p=home&app_token={TOKEN}">home</a><input name="app_token" value="ffffffffffffffffffffffff">"#
        );
        let (token, source) = extract_token(&url("https://portal.example/"), &body).unwrap();
        assert_eq!(source, TokenSource::InputField);
        assert_eq!(token, "ffffffffffffffffffffffff");

        let (token, source) = extract_token(&url("https://portal.example/"), &format!("app_token={TOKEN}")).unwrap();
        assert_eq!(source, TokenSource::PageText);
        assert_eq!(token, TOKEN);

        assert!(extract_token(&url("https://portal.example/"), "<html></html>").is_none());
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview(TOKEN), "0a1b2c3d4e5f");
        assert_eq!(preview("abc"), "abc");
    }
}

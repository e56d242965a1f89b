use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

const SOFT_HYPHEN: char = '\u{00AD}';
const NON_BREAKING_SPACE: char = '\u{00A0}';

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Normalizes text scraped from a table cell into a single trimmed line.
pub fn clean_text(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| *c != SOFT_HYPHEN)
        .map(|c| if c == NON_BREAKING_SPACE { ' ' } else { c })
        .collect();

    whitespace().replace_all(stripped.trim(), " ").into_owned()
}

/// First match of `selector` inside `row`: the named attribute, or the cleaned text.
pub fn extract_from_row(row: &ElementRef, selector: &Selector, attr: Option<&str>) -> Option<String> {
    row.select(selector).next().map(|el| {
        if let Some(attr_name) = attr {
            el.value().attr(attr_name).unwrap_or_default().trim().to_string()
        } else {
            clean_text(&el.text().collect::<String>())
        }
    })
}

pub fn absolute_url(root: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    format!("{}/{}", root.trim_end_matches('/'), href.trim_start_matches('/'))
}

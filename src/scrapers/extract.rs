use regex::Regex;
use std::sync::LazyLock;

static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());
static RE_SURFACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*m(?:²|2|\b)").unwrap());
static RE_BEDROOMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:ch(?:ambre)?s?\b|slaapkamers?|bedrooms?)").unwrap()
});
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// `"350.000 €"`, `"€ 425 000"` and `"1.250 €/mois"` all give the leading amount.
pub fn extract_price(text: &str) -> Option<f64> {
    let cleaned = text
        .replace(['\u{a0}', ' ', '.', '€'], "")
        .replace("/mois", "")
        .replace("/m", "");
    RE_DIGITS
        .captures(&cleaned)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

pub fn extract_surface(text: &str) -> Option<f64> {
    let cleaned = text.replace('\u{a0}', " ").replace(',', ".");
    RE_SURFACE
        .captures(&cleaned)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

/// Bedrooms from free card text; only explicit "N ch" / "N chambres" forms count.
pub fn extract_bedrooms(text: &str) -> Option<u32> {
    RE_BEDROOMS
        .captures(text)
        .and_then(|caps| caps[1].parse::<u32>().ok())
}

/// Bedrooms from an element that holds only the bedroom count, e.g. `<span class="rooms">3</span>`.
pub fn extract_bedrooms_field(text: &str) -> Option<u32> {
    extract_bedrooms(text).or_else(|| {
        RE_DIGITS
            .captures(text)
            .and_then(|caps| caps[1].parse::<u32>().ok())
    })
}

pub fn clean_text(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Resolve a possibly relative href against an agency base URL.
pub fn absolute_url(base_url: &str, url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if url.starts_with('/') {
        return format!("{}{}", origin(base_url), url);
    }
    format!("{}/{}", base_url.trim_end_matches('/'), url)
}

fn origin(base_url: &str) -> &str {
    let after_scheme = base_url.find("://").map(|i| i + 3).unwrap_or(0);
    match base_url[after_scheme..].find('/') {
        Some(slash) => &base_url[..after_scheme + slash],
        None => base_url,
    }
}

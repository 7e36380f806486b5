//! Lenient numeric and timestamp coercion for scraped and persisted data.
//!
//! Agencies and older listing files mix JSON numbers with strings such as
//! `"350.000 €"` or `"85,5 m²"`. Everything goes through [`parse_number`] so
//! an unparseable value is always `None` instead of an error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce a JSON value (number or string) into a finite `f64`.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number_str(s),
        _ => None,
    }
}

/// Parse the first number found in free text.
///
/// `.` followed by groups of exactly three digits is a thousands separator,
/// a single `,` is a decimal separator. When both appear, the last one is
/// the decimal separator.
pub fn parse_number_str(text: &str) -> Option<f64> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    let start = compact.find(|c: char| c.is_ascii_digit())?;
    let run: String = compact[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let run = run.trim_end_matches(['.', ',']);

    let normalized = match (run.rfind('.'), run.rfind(',')) {
        (Some(dot), Some(comma)) if dot > comma => run.replace(',', ""),
        (Some(_), Some(_)) => run.replace('.', "").replace(',', "."),
        (Some(_), None) => normalize_single_separator(run, '.', true)?,
        (None, Some(_)) => normalize_single_separator(run, ',', false)?,
        (None, None) => run.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalize_single_separator(run: &str, sep: char, lone_is_thousands: bool) -> Option<String> {
    let groups: Vec<&str> = run.split(sep).collect();
    let thousands = groups[1..].iter().all(|g| g.len() == 3);

    if groups.len() > 2 {
        // "1.250.000" style; anything else with repeated separators is garbage
        return thousands.then(|| groups.concat());
    }
    if thousands && lone_is_thousands {
        Some(groups.concat())
    } else {
        Some(groups.join("."))
    }
}

/// Coerce into a non-negative whole count such as a number of bedrooms.
pub fn parse_count(value: &Value) -> Option<u32> {
    parse_number(value)
        .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32)
}

/// Parse an RFC 3339 timestamp, also accepting a naive ISO timestamp as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_number))
}

pub fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_count))
}

pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_timestamp(&s),
        _ => None,
    })
}

/// Missing or `null` strings become empty.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_pass_through() {
        assert_eq!(parse_number(&json!(1200)), Some(1200.0));
        assert_eq!(parse_number(&json!(85.5)), Some(85.5));
    }

    #[test]
    fn euro_prices_with_thousands_dots() {
        assert_eq!(parse_number_str("350.000 €"), Some(350_000.0));
        assert_eq!(parse_number_str("€ 1.250.000"), Some(1_250_000.0));
        assert_eq!(parse_number_str("Prix: 425 000 €"), Some(425_000.0));
    }

    #[test]
    fn decimal_separators() {
        assert_eq!(parse_number_str("85,5 m²"), Some(85.5));
        assert_eq!(parse_number_str("85.5"), Some(85.5));
        assert_eq!(parse_number_str("350.000,50"), Some(350_000.5));
        assert_eq!(parse_number_str("1,200.5"), Some(1_200.5));
    }

    #[test]
    fn garbage_is_unknown() {
        assert_eq!(parse_number_str("Prix sur demande"), None);
        assert_eq!(parse_number_str(""), None);
        assert_eq!(parse_number(&json!(null)), None);
        assert_eq!(parse_number(&json!([1, 2])), None);
        assert_eq!(parse_number_str("1.2.3"), None);
    }

    #[test]
    fn counts_must_be_whole() {
        assert_eq!(parse_count(&json!("2 chambres")), Some(2));
        assert_eq!(parse_count(&json!(2.5)), None);
        assert_eq!(parse_count(&json!(-1)), None);
    }

    #[test]
    fn timestamps_accept_python_isoformat() {
        let ts = parse_timestamp("2024-01-15T10:30:00.123456Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-15T10:30:00.123456+00:00");
        assert!(parse_timestamp("2024-01-15T10:30:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}

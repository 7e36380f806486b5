use crate::error::ScoutError;
use crate::models::Listing;
use crate::models::number::parse_number_str;

/// Inclusive numeric range; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeFilter {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeFilter {
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Accepts `"all"`, `""`, `"800-1200"`, `"120+"` and `"-300000"`.
    pub fn parse(field: &'static str, value: &str) -> Result<Self, ScoutError> {
        let value = value.trim();
        let invalid = |reason| ScoutError::InvalidFilter {
            field,
            value: value.to_string(),
            reason,
        };

        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return Ok(Self::default());
        }
        if let Some(min) = value.strip_suffix('+') {
            let min = parse_bound(min).ok_or(invalid("expected a number before `+`"))?;
            return Ok(Self { min: Some(min), max: None });
        }

        let (min, max) = value.split_once('-').ok_or(invalid("expected `min-max`, `min+` or `all`"))?;
        let min = match min.trim() {
            "" => None,
            m => Some(parse_bound(m).ok_or(invalid("lower bound is not a number"))?),
        };
        let max = Some(parse_bound(max).ok_or(invalid("upper bound is not a number"))?);
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(invalid("lower bound is above upper bound"));
            }
        }
        Ok(Self { min, max })
    }

    /// An active range never matches an unknown value.
    pub fn matches(&self, value: Option<f64>) -> bool {
        if !self.is_active() {
            return true;
        }
        let Some(v) = value else {
            return false;
        };
        self.min.map_or(true, |min| v >= min) && self.max.map_or(true, |max| v <= max)
    }
}

fn parse_bound(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit() || ".,_ ".contains(c)) {
        return None;
    }
    parse_number_str(&text.replace('_', ""))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BedroomFilter {
    #[default]
    Any,
    AtLeast(u32),
    Exactly(u32),
}

impl BedroomFilter {
    /// `"3+"` means three or more, `"3"` means exactly three.
    pub fn parse(value: &str) -> Result<Self, ScoutError> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return Ok(Self::Any);
        }
        let invalid = || ScoutError::InvalidFilter {
            field: "bedrooms",
            value: value.to_string(),
            reason: "expected `n`, `n+` or `all`",
        };
        match value.strip_suffix('+') {
            Some(n) => n.trim().parse().map(Self::AtLeast).map_err(|_| invalid()),
            None => value.parse().map(Self::Exactly).map_err(|_| invalid()),
        }
    }

    pub fn matches(&self, bedrooms: Option<u32>) -> bool {
        match (self, bedrooms) {
            (Self::Any, _) => true,
            (_, None) => false,
            (Self::AtLeast(n), Some(b)) => b >= *n,
            (Self::Exactly(n), Some(b)) => b == *n,
        }
    }
}

/// The four viewer filters; the default matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub commune: Option<String>,
    pub price: RangeFilter,
    pub bedrooms: BedroomFilter,
    pub surface: RangeFilter,
}

impl Filters {
    pub fn parse(
        commune: Option<&str>,
        price: Option<&str>,
        bedrooms: Option<&str>,
        surface: Option<&str>,
    ) -> Result<Self, ScoutError> {
        Ok(Self {
            commune: commune
                .map(str::trim)
                .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
                .map(str::to_string),
            price: RangeFilter::parse("price", price.unwrap_or_default())?,
            bedrooms: BedroomFilter::parse(bedrooms.unwrap_or_default())?,
            surface: RangeFilter::parse("surface", surface.unwrap_or_default())?,
        })
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        let commune_ok = self
            .commune
            .as_deref()
            .map_or(true, |c| listing.commune.to_lowercase().contains(&c.to_lowercase()));

        commune_ok
            && self.price.matches(listing.price)
            && self.bedrooms.matches(listing.bedrooms)
            && self.surface.matches(listing.surface)
    }
}

/// Filter and sort most recently discovered first. Ties keep input order.
pub fn apply_filters<'a>(listings: &'a [Listing], filters: &Filters) -> Vec<&'a Listing> {
    let mut shown: Vec<&Listing> = listings.iter().filter(|l| filters.matches(l)).collect();
    shown.sort_by(|a, b| b.first_seen_key().cmp(&a.first_seen_key()));
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::listing;
    use chrono::{Duration, TimeZone, Utc};

    fn priced(id: &str, price: Option<f64>) -> Listing {
        let mut l = listing(id, "Viabilis");
        l.price = price;
        l
    }

    #[test]
    fn range_parsing() {
        assert_eq!(
            RangeFilter::parse("price", "800-1200").unwrap(),
            RangeFilter { min: Some(800.0), max: Some(1200.0) }
        );
        assert_eq!(
            RangeFilter::parse("surface", "120+").unwrap(),
            RangeFilter { min: Some(120.0), max: None }
        );
        assert_eq!(
            RangeFilter::parse("price", "-300000").unwrap(),
            RangeFilter { min: None, max: Some(300_000.0) }
        );
        assert!(!RangeFilter::parse("price", "all").unwrap().is_active());
        assert!(!RangeFilter::parse("price", "").unwrap().is_active());
        assert!(RangeFilter::parse("price", "cheap").is_err());
        assert!(RangeFilter::parse("price", "1200-800").is_err());
    }

    #[test]
    fn price_range_includes_and_excludes() {
        let filters = Filters::parse(None, Some("800-1200"), None, None).unwrap();
        assert!(!filters.matches(&priced("a", Some(1500.0))));
        assert!(filters.matches(&priced("b", Some(900.0))));
        assert!(filters.matches(&priced("c", Some(1200.0))));
        assert!(!filters.matches(&priced("d", None)));
    }

    #[test]
    fn missing_surface_only_matters_when_filtered() {
        let mut l = listing("a", "Viabilis");
        l.surface = None;

        let any = Filters::default();
        assert!(any.matches(&l));

        let filtered = Filters::parse(None, None, None, Some("80-100")).unwrap();
        assert!(!filtered.matches(&l));
    }

    #[test]
    fn bedroom_threshold_or_exact() {
        let at_least = BedroomFilter::parse("2+").unwrap();
        let exactly = BedroomFilter::parse("2").unwrap();
        assert_eq!(at_least, BedroomFilter::AtLeast(2));
        assert!(at_least.matches(Some(3)));
        assert!(!exactly.matches(Some(3)));
        assert!(exactly.matches(Some(2)));
        assert!(!at_least.matches(None));
        assert!(BedroomFilter::Any.matches(None));
        assert!(BedroomFilter::parse("two").is_err());
    }

    #[test]
    fn commune_is_case_insensitive_substring() {
        let filters = Filters::parse(Some("gilles"), None, None, None).unwrap();
        assert!(filters.matches(&listing("a", "Viabilis")));

        let mut ixelles = listing("b", "Oralis Real Estate");
        ixelles.commune = "Ixelles".to_string();
        assert!(!filters.matches(&ixelles));
    }

    #[test]
    fn filtered_results_sorted_recent_first_with_stable_ties() {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut old = listing("old", "Viabilis");
        old.first_seen = Some(base);
        let mut tie_a = listing("tie_a", "Viabilis");
        tie_a.first_seen = Some(base + Duration::days(1));
        let mut tie_b = listing("tie_b", "Viabilis");
        tie_b.first_seen = Some(base + Duration::days(1));
        let undated = listing("undated", "Viabilis");

        let all = vec![undated, old, tie_a, tie_b];
        let shown: Vec<&str> = apply_filters(&all, &Filters::default())
            .into_iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(shown, vec!["tie_a", "tie_b", "old", "undated"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let all = vec![priced("a", Some(900.0)), priced("b", Some(1500.0)), priced("c", None)];
        let filters = Filters::parse(Some("saint"), Some("800-1200"), Some("1+"), None).unwrap();

        let once: Vec<Listing> = apply_filters(&all, &filters).into_iter().cloned().collect();
        let twice: Vec<Listing> = apply_filters(&once, &filters).into_iter().cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
    }
}

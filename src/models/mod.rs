pub mod number;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use number::{lenient_f64, lenient_string, lenient_timestamp, lenient_u32};

/// Brussels communes covered by the search
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Commune {
    SaintGilles,
    Forest,
    Ixelles,
}

/// Map centre used for listings outside the configured communes
pub const BRUSSELS_CENTER: (f64, f64) = (50.8503, 4.3517);

impl Commune {
    pub const ALL: [Commune; 3] = [Commune::SaintGilles, Commune::Forest, Commune::Ixelles];

    pub fn name(self) -> &'static str {
        match self {
            Commune::SaintGilles => "Saint-Gilles",
            Commune::Forest => "Forest",
            Commune::Ixelles => "Ixelles",
        }
    }

    pub fn postal_code(self) -> u16 {
        match self {
            Commune::SaintGilles => 1060,
            Commune::Forest => 1190,
            Commune::Ixelles => 1050,
        }
    }

    /// (latitude, longitude)
    pub fn centroid(self) -> (f64, f64) {
        match self {
            Commune::SaintGilles => (50.8275, 4.3454),
            Commune::Forest => (50.8103, 4.3180),
            Commune::Ixelles => (50.8333, 4.3667),
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Commune::SaintGilles => &["saint-gilles", "saint gilles", "st-gilles", "sint-gillis"],
            Commune::Forest => &["forest", "vorst"],
            Commune::Ixelles => &["ixelles", "elsene"],
        }
    }

    /// Look for a commune in free text, by postal code first, then by name.
    pub fn detect(text: &str) -> Option<Commune> {
        let lower = text.to_lowercase();
        let by_code = Commune::ALL
            .into_iter()
            .find(|c| contains_code(&lower, &c.postal_code().to_string()));
        by_code.or_else(|| {
            Commune::ALL
                .into_iter()
                .find(|c| c.aliases().iter().any(|alias| lower.contains(alias)))
        })
    }

    /// Resolve a stored commune string such as `"Ixelles (1050)"`.
    pub fn from_name(name: &str) -> Option<Commune> {
        let lower = name.to_lowercase();
        Commune::ALL
            .into_iter()
            .find(|c| lower.contains(&c.name().to_lowercase()))
    }
}

/// `code` as a standalone number: `"B-1050"` matches, `"105000 €"` does not.
fn contains_code(text: &str, code: &str) -> bool {
    text.match_indices(code).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + code.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
    })
}

impl std::fmt::Display for Commune {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One scraped apartment listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub commune: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub surface: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source_url: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_new: bool,
}

impl Listing {
    /// New if the collector flagged it, or if it was first seen within `window`.
    pub fn is_recent(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.is_new || self.first_seen.is_some_and(|seen| now - seen < window)
    }

    /// Sort key for "most recent first"; unknown dates count as the epoch.
    pub fn first_seen_key(&self) -> DateTime<Utc> {
        self.first_seen.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Window within which a listing is shown as new
pub fn new_listing_window() -> Duration {
    Duration::hours(24)
}

/// Stable id for a listing: the same source and reference always hash the same.
pub fn listing_id(source: &str, reference: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\n");
    hasher.update(reference.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

/// The persisted listing file read by the viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingFile {
    pub listings: Vec<Listing>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub new_count: usize,
}

impl ListingFile {
    pub fn new(listings: Vec<Listing>, new_count: usize, now: DateTime<Utc>) -> Self {
        Self {
            total_count: listings.len(),
            listings,
            last_updated: now,
            new_count,
        }
    }
}

/// Append-only record of every listing id ever seen
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct History {
    pub seen_ids: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl History {
    pub fn contains(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    /// Returns true if the id was not already known.
    pub fn record(&mut self, id: &str) -> bool {
        self.seen_ids.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_ids.is_empty()
    }
}

/// Accepts both the object form and a bare array of ids.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum HistoryOnDisk {
    Ids(Vec<String>),
    Full(History),
}

impl From<HistoryOnDisk> for History {
    fn from(raw: HistoryOnDisk) -> Self {
        match raw {
            HistoryOnDisk::Full(history) => history,
            HistoryOnDisk::Ids(ids) => History {
                seen_ids: ids.into_iter().collect(),
                last_updated: None,
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn listing_id_is_deterministic_and_source_scoped() {
        let a = listing_id("Viabilis", "https://www.viabilis.be/bien/1");
        assert_eq!(a, listing_id("Viabilis", "https://www.viabilis.be/bien/1"));
        assert_eq!(a.len(), 12);
        assert_ne!(a, listing_id("Fredimmo", "https://www.viabilis.be/bien/1"));
    }

    #[test]
    fn detects_commune_by_postal_code_or_name() {
        assert_eq!(Commune::detect("Rue Berckmans 4, 1060 Bruxelles"), Some(Commune::SaintGilles));
        assert_eq!(Commune::detect("Appartement à Vorst"), Some(Commune::Forest));
        assert_eq!(Commune::detect("ELSENE - Flagey"), Some(Commune::Ixelles));
        assert_eq!(Commune::detect("Uccle 1180"), None);
    }

    #[test]
    fn postal_code_must_stand_alone() {
        assert_eq!(Commune::detect("Prix 105000 €, Uccle"), None);
        assert_eq!(Commune::detect("Réf. 31060"), None);
        assert_eq!(Commune::detect("B-1050 Bruxelles"), Some(Commune::Ixelles));
        assert_eq!(Commune::detect("105000 € - 1190"), Some(Commune::Forest));
    }

    #[test]
    fn lenient_listing_deserialization() {
        let listing: Listing = serde_json::from_value(json!({
            "id": "abc",
            "price": "350.000 €",
            "surface": "n/a",
            "bedrooms": "2",
            "title": null,
            "first_seen": "not a date"
        }))
        .unwrap();

        assert_eq!(listing.price, Some(350_000.0));
        assert_eq!(listing.surface, None);
        assert_eq!(listing.bedrooms, Some(2));
        assert_eq!(listing.title, "");
        assert_eq!(listing.first_seen, None);
        assert!(!listing.is_new);
    }

    #[test]
    fn recent_is_flag_or_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let mut listing = fixtures::listing("a", "Viabilis");

        listing.first_seen = Some(now - Duration::hours(3));
        assert!(listing.is_recent(now, new_listing_window()));

        listing.first_seen = Some(now - Duration::hours(30));
        assert!(!listing.is_recent(now, new_listing_window()));

        listing.is_new = true;
        assert!(listing.is_recent(now, new_listing_window()));

        listing.is_new = false;
        listing.first_seen = None;
        assert!(!listing.is_recent(now, new_listing_window()));
    }

    #[test]
    fn history_reads_bare_array() {
        let raw: HistoryOnDisk = serde_json::from_value(json!(["a", "b", "a"])).unwrap();
        let history = History::from(raw);
        assert_eq!(history.len(), 2);
        assert!(history.contains("a"));
    }
}

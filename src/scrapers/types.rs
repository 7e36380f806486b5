use crate::models::number::{lenient_f64, lenient_string, lenient_u32};
use crate::models::{Commune, Listing};
use serde::{Deserialize, Serialize};

/// Search criteria every scraped listing must satisfy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Communes a listing may be located in
    pub communes: Vec<Commune>,
    /// Minimum price (EUR)
    pub min_price: f64,
    /// Maximum price (EUR)
    pub max_price: f64,
    /// Minimum number of bedrooms
    pub min_bedrooms: u32,
    /// Minimum size in square meters
    pub min_surface: f64,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            communes: Commune::ALL.to_vec(),
            min_price: 0.0,
            max_price: 500_000.0,
            min_bedrooms: 1,
            min_surface: 80.0,
        }
    }
}

impl SearchCriteria {
    /// Unknown values pass: only a known value outside a bound rejects.
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(price) = listing.price {
            if price < self.min_price || price > self.max_price {
                return false;
            }
        }
        if let Some(surface) = listing.surface {
            if surface < self.min_surface {
                return false;
            }
        }
        if let Some(bedrooms) = listing.bedrooms {
            if bedrooms < self.min_bedrooms {
                return false;
            }
        }

        let commune = listing.commune.to_lowercase();
        commune.is_empty()
            || self
                .communes
                .iter()
                .any(|c| commune.contains(&c.name().to_lowercase()))
    }
}

/// Fields pulled out of one listing card, before normalization.
/// Also the shape the AI extractor is asked to return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListing {
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub surface: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub bedrooms: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub commune: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
}

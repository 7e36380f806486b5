//! Read-only view over the published listing file: filter, sort, render, map.

pub mod filters;
pub mod map;
pub mod render;

use crate::models::{Listing, ListingFile};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub use filters::{apply_filters, BedroomFilter, Filters, RangeFilter};
pub use map::{place_markers, to_geojson, MapMarker};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("could not fetch {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },

    #[error("{origin} is not a listing file: {source}")]
    Parse {
        origin: String,
        source: serde_json::Error,
    },
}

/// Listings plus the filters currently applied to them
#[derive(Debug, Clone, Default)]
pub struct ViewerState {
    pub listings: Vec<Listing>,
    pub last_updated: Option<DateTime<Utc>>,
    pub filters: Filters,
}

impl ViewerState {
    pub fn new(file: ListingFile) -> Self {
        Self {
            listings: file.listings,
            last_updated: Some(file.last_updated),
            filters: Filters::default(),
        }
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn visible(&self) -> Vec<&Listing> {
        apply_filters(&self.listings, &self.filters)
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Load the listing file from a local path or an `http(s)` URL.
pub async fn load_listing_file(source: &str) -> Result<ListingFile, LoadError> {
    let body = if is_url(source) {
        fetch(source).await.map_err(|e| LoadError::Fetch {
            url: source.to_string(),
            source: e,
        })?
    } else {
        tokio::fs::read_to_string(Path::new(source))
            .await
            .map_err(|e| LoadError::Read {
                path: source.to_string(),
                source: e,
            })?
    };

    serde_json::from_str(&body).map_err(|e| LoadError::Parse {
        origin: source.to_string(),
        source: e,
    })
}

async fn fetch(url: &str) -> Result<String, reqwest::Error> {
    reqwest::Client::new()
        .get(url)
        .timeout(Duration::from_secs(30))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// Retry the load `retries` more times before surfacing the last error.
pub async fn load_with_retry(source: &str, retries: u32, pause: Duration) -> Result<ListingFile, LoadError> {
    let mut attempt = 0;
    loop {
        match load_listing_file(source).await {
            Ok(file) => return Ok(file),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!("Loading listings failed ({}), retry {}/{}", e, attempt, retries);
                tokio::time::sleep(pause).await;
            }
            Err(e) => return Err(e),
        }
    }
}

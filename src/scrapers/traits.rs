use crate::models::{Commune, Listing};
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for all agency scrapers
#[async_trait]
pub trait ScraperTrait: Send + Sync {
    /// Scrape the agency's current listings, already filtered by the search criteria
    async fn scrape(&self) -> Result<Vec<Listing>>;

    /// Agency name, used as the listing source
    fn source_name(&self) -> &str;

    /// Commune the agency covers; `None` for portals spanning several
    fn commune(&self) -> Option<Commune>;
}

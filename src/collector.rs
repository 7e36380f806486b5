use crate::models::{Listing, ListingFile};
use crate::notify::{format_price, notify_new_listings, Notifier};
use crate::reconcile::reconcile;
use crate::scrapers::ScraperTrait;
use crate::storage::Store;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{error, info};

/// What one agency produced during a run
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: String,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Scraped(Vec<Listing>),
    /// The agency could not be scraped; its known listings are kept as they are
    Failed(String),
}

impl SourceBatch {
    pub fn listings(&self) -> &[Listing] {
        match &self.outcome {
            BatchOutcome::Scraped(listings) => listings,
            BatchOutcome::Failed(_) => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Failed(_))
    }
}

/// Run every scraper in turn. A failing agency never aborts the run.
pub async fn collect(scrapers: &[Box<dyn ScraperTrait>]) -> Vec<SourceBatch> {
    let mut batches = Vec::with_capacity(scrapers.len());

    for scraper in scrapers {
        let source = scraper.source_name().to_string();
        let area = scraper.commune().map(|c| c.name()).unwrap_or("Bruxelles");
        info!("[{}] Scraping ({})", source, area);
        let outcome = match scraper.scrape().await {
            Ok(listings) => BatchOutcome::Scraped(listings),
            Err(e) => {
                error!("[{}] Scraper failed: {:#}", source, e);
                BatchOutcome::Failed(format!("{e:#}"))
            }
        };
        batches.push(SourceBatch { source, outcome });
    }

    let total: usize = batches.iter().map(|b| b.listings().len()).sum();
    let failed = batches.iter().filter(|b| b.is_failed()).count();
    info!(
        "Total listings found: {} ({} agencies, {} failed)",
        total,
        batches.len(),
        failed
    );

    batches
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Scrape and log only: nothing is read, written or sent
    pub dry_run: bool,
    pub notify_pause: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scraped: usize,
    pub failed_sources: usize,
    pub total: usize,
    pub new_listings: usize,
    pub notified: usize,
    pub notify_failures: usize,
}

/// One collector run: scrape, reconcile with the store, persist, then notify.
///
/// Files are written listing file first and history last. Notification
/// failures are counted in the summary and never undo what was saved.
pub async fn run_pipeline(
    store: &Store,
    scrapers: &[Box<dyn ScraperTrait>],
    notifier: Option<&dyn Notifier>,
    options: RunOptions,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let batches = collect(scrapers).await;
    let mut summary = RunSummary {
        scraped: batches.iter().map(|b| b.listings().len()).sum(),
        failed_sources: batches.iter().filter(|b| b.is_failed()).count(),
        ..RunSummary::default()
    };

    if options.dry_run {
        info!("🔍 Dry run: {} listings scraped, nothing saved", summary.scraped);
        for listing in batches.iter().flat_map(|b| b.listings()).take(10) {
            info!(
                "  [{}] {} | {} | {}",
                listing.source,
                listing.title,
                listing.commune,
                listing.price.map(format_price).unwrap_or_else(|| "N/A".to_string())
            );
        }
        return Ok(summary);
    }

    let previous = store.load_listings()?;
    let history = store.load_history()?;
    info!("Loaded {} known listings, {} ids in history", previous.len(), history.len());

    let result = reconcile(&previous, &history, &batches, now);
    summary.total = result.listings.len();
    summary.new_listings = result.new_listings.len();
    info!("🆕 {} new listings", summary.new_listings);

    store.save_listings(&ListingFile::new(result.listings, result.new_listings.len(), now))?;
    store.save_new_listings(&result.new_listings)?;
    store.save_history(&result.history)?;

    if result.new_listings.is_empty() {
        return Ok(summary);
    }
    match notifier {
        Some(notifier) => {
            let (sent, failed) = notify_new_listings(notifier, &result.new_listings, options.notify_pause).await;
            summary.notified = sent;
            summary.notify_failures = failed;
        }
        None => info!("Notifications disabled, {} new listings not sent", summary.new_listings),
    }

    Ok(summary)
}

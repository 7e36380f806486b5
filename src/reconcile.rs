//! Merge a run's scraped batches into the persisted listing set and history.

use crate::collector::SourceBatch;
use crate::models::{History, Listing};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Full listing set, most recently discovered first
    pub listings: Vec<Listing>,
    /// Listings whose id was not in the history, in scrape order
    pub new_listings: Vec<Listing>,
    /// Previous history plus every id scraped this run
    pub history: History,
}

/// Deterministic for identical inputs and `now`.
///
/// A successfully scraped source replaces its previous listings. Sources that
/// failed, or were not part of this run, keep theirs. `first_seen` is never
/// overwritten once recorded.
pub fn reconcile(
    previous: &[Listing],
    history: &History,
    batches: &[SourceBatch],
    now: DateTime<Utc>,
) -> Reconciliation {
    let previous_by_id: HashMap<&str, &Listing> = previous.iter().map(|l| (l.id.as_str(), l)).collect();
    let refreshed_sources: HashSet<&str> = batches
        .iter()
        .filter(|b| !b.is_failed())
        .map(|b| b.source.as_str())
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut listings = Vec::new();
    let mut new_listings = Vec::new();

    for scraped in batches.iter().flat_map(|b| b.listings()) {
        if !seen.insert(scraped.id.clone()) || !first_url(&mut seen_urls, scraped) {
            continue;
        }

        let mut listing = scraped.clone();
        let known_first_seen = previous_by_id.get(listing.id.as_str()).and_then(|p| p.first_seen);
        listing.first_seen = known_first_seen.or(Some(now));
        listing.last_seen = Some(now);
        listing.is_new = !history.contains(&listing.id);

        if listing.is_new {
            new_listings.push(listing.clone());
        }
        listings.push(listing);
    }

    for kept in previous {
        if refreshed_sources.contains(kept.source.as_str())
            || !seen.insert(kept.id.clone())
            || !first_url(&mut seen_urls, kept)
        {
            continue;
        }
        let mut listing = kept.clone();
        listing.is_new = false;
        listings.push(listing);
    }

    // stable: equal first_seen keeps scrape order
    listings.sort_by(|a, b| b.first_seen_key().cmp(&a.first_seen_key()));

    let mut updated_history = history.clone();
    for batch in batches {
        for listing in batch.listings() {
            updated_history.record(&listing.id);
        }
    }
    updated_history.last_updated = Some(now);

    Reconciliation {
        listings,
        new_listings,
        history: updated_history,
    }
}

/// False when another listing already claimed this page. Empty urls never collide.
fn first_url(seen_urls: &mut HashSet<String>, listing: &Listing) -> bool {
    listing.source_url.is_empty() || seen_urls.insert(listing.source_url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::BatchOutcome;
    use crate::models::fixtures::listing;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap()
    }

    fn scraped(source: &str, listings: Vec<Listing>) -> SourceBatch {
        SourceBatch {
            source: source.to_string(),
            outcome: BatchOutcome::Scraped(listings),
        }
    }

    fn failed(source: &str) -> SourceBatch {
        SourceBatch {
            source: source.to_string(),
            outcome: BatchOutcome::Failed("timeout".to_string()),
        }
    }

    fn history_of(ids: &[&str]) -> History {
        History {
            seen_ids: ids.iter().map(|s| s.to_string()).collect(),
            last_updated: None,
        }
    }

    fn ids(listings: &[Listing]) -> Vec<&str> {
        listings.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn only_unknown_ids_are_new() {
        let earlier = now() - Duration::days(3);
        let mut a = listing("A", "Viabilis");
        a.price = Some(1000.0);
        a.first_seen = Some(earlier);
        let mut b = listing("B", "Viabilis");
        b.price = Some(1200.0);

        let result = reconcile(
            &[a.clone()],
            &history_of(&["A"]),
            &[scraped("Viabilis", vec![a, b])],
            now(),
        );

        assert_eq!(ids(&result.new_listings), vec!["B"]);
        assert_eq!(ids(&result.listings), vec!["B", "A"]);
        assert!(result.history.contains("A") && result.history.contains("B"));
        assert_eq!(result.history.last_updated, Some(now()));
    }

    #[test]
    fn first_seen_survives_repeated_runs() {
        let earlier = now() - Duration::days(10);
        let mut a = listing("A", "Viabilis");
        a.first_seen = Some(earlier);
        let mut rescraped = listing("A", "Viabilis");
        rescraped.price = Some(299_000.0);

        let first = reconcile(&[a], &history_of(&["A"]), &[scraped("Viabilis", vec![rescraped.clone()])], now());
        let later = now() + Duration::days(1);
        let second = reconcile(
            &first.listings,
            &first.history,
            &[scraped("Viabilis", vec![rescraped])],
            later,
        );

        let a = &second.listings[0];
        assert_eq!(a.first_seen, Some(earlier));
        assert_eq!(a.last_seen, Some(later));
        assert_eq!(a.price, Some(299_000.0));
        assert!(!a.is_new);
        assert!(second.new_listings.is_empty());
    }

    #[test]
    fn new_listing_gets_first_seen_now_and_flag() {
        let result = reconcile(&[], &History::default(), &[scraped("Modifa", vec![listing("X", "Modifa")])], now());
        let x = &result.new_listings[0];
        assert!(x.is_new);
        assert_eq!(x.first_seen, Some(now()));
        assert_eq!(x.last_seen, Some(now()));
    }

    #[test]
    fn failed_or_skipped_sources_keep_their_listings() {
        let mut old_fredimmo = listing("F", "Fredimmo");
        old_fredimmo.first_seen = Some(now() - Duration::days(2));
        old_fredimmo.is_new = true;
        let mut old_oralis = listing("O", "Oralis Real Estate");
        old_oralis.first_seen = Some(now() - Duration::days(5));

        let result = reconcile(
            &[old_fredimmo, old_oralis],
            &history_of(&["F", "O"]),
            &[failed("Fredimmo"), scraped("Viabilis", vec![listing("V", "Viabilis")])],
            now(),
        );

        assert_eq!(ids(&result.listings), vec!["V", "F", "O"]);
        assert!(result.listings.iter().all(|l| l.id == "V" || !l.is_new));
    }

    #[test]
    fn refreshed_source_drops_listings_it_no_longer_shows() {
        let mut gone = listing("G", "Viabilis");
        gone.first_seen = Some(now() - Duration::days(4));

        let result = reconcile(
            &[gone],
            &history_of(&["G"]),
            &[scraped("Viabilis", vec![listing("H", "Viabilis")])],
            now(),
        );

        assert_eq!(ids(&result.listings), vec!["H"]);
        // history is append-only
        assert!(result.history.contains("G"));
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let mut first = listing("D", "Viabilis");
        first.title = "first".to_string();
        let mut second = listing("D", "Viabilis");
        second.title = "second".to_string();

        let result = reconcile(&[], &History::default(), &[scraped("Viabilis", vec![first, second])], now());
        assert_eq!(result.listings.len(), 1);
        assert_eq!(result.listings[0].title, "first");
        assert_eq!(result.new_listings.len(), 1);
    }

    #[test]
    fn same_page_from_two_sources_is_one_listing() {
        let jam = listing("J1", "JAM Properties");
        let mut jam_ai = listing("J2", "JAM Properties (AI)");
        jam_ai.source_url = jam.source_url.clone();

        let result = reconcile(
            &[],
            &History::default(),
            &[scraped("JAM Properties", vec![jam]), scraped("JAM Properties (AI)", vec![jam_ai])],
            now(),
        );

        assert_eq!(ids(&result.listings), vec!["J1"]);
        assert_eq!(ids(&result.new_listings), vec!["J1"]);
    }

    #[test]
    fn kept_listing_does_not_duplicate_a_scraped_page() {
        let mut stale = listing("OLD", "MyImmo Ixelles");
        stale.first_seen = Some(now() - Duration::days(6));
        let mut fresh = listing("NEW", "MYIMMO Altitude");
        fresh.source_url = stale.source_url.clone();

        let result = reconcile(
            &[stale],
            &history_of(&["OLD"]),
            &[failed("MyImmo Ixelles"), scraped("MYIMMO Altitude", vec![fresh])],
            now(),
        );

        assert_eq!(ids(&result.listings), vec!["NEW"]);
    }

    #[test]
    fn same_inputs_same_output() {
        let previous = vec![listing("A", "Viabilis")];
        let history = history_of(&["A"]);
        let batches = vec![
            scraped("Viabilis", vec![listing("A", "Viabilis"), listing("B", "Viabilis")]),
            scraped("Modifa", vec![listing("C", "Modifa")]),
        ];

        let one = reconcile(&previous, &history, &batches, now());
        let two = reconcile(&previous, &history, &batches, now());
        assert_eq!(one.listings, two.listings);
        assert_eq!(one.new_listings, two.new_listings);
        assert_eq!(one.history, two.history);
    }

    #[test]
    fn id_missing_from_history_keeps_recorded_first_seen() {
        let earlier = now() - Duration::days(7);
        let mut a = listing("A", "Viabilis");
        a.first_seen = Some(earlier);

        let result = reconcile(&[a.clone()], &History::default(), &[scraped("Viabilis", vec![a])], now());
        assert_eq!(result.new_listings.len(), 1);
        assert_eq!(result.listings[0].first_seen, Some(earlier));
    }
}

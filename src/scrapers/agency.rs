use crate::error::ScoutError;
use crate::models::{listing_id, Commune, Listing};
use crate::scrapers::extract::{
    absolute_url, clean_text, extract_bedrooms, extract_bedrooms_field, extract_price, extract_surface,
};
use crate::scrapers::http::Fetcher;
use crate::scrapers::registry::{AgencyConfig, SelectorRules};
use crate::scrapers::traits::ScraperTrait;
use crate::scrapers::types::{RawListing, SearchCriteria};
use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Selector rules parsed once per scraper
pub struct CompiledRules {
    cards: Selector,
    fallback_cards: Option<Selector>,
    link: Selector,
    title: Selector,
    price: Selector,
    surface: Option<Selector>,
    bedrooms: Option<Selector>,
    address: Option<Selector>,
    image: Selector,
}

fn selector(css: &str) -> Result<Selector, ScoutError> {
    Selector::parse(css).map_err(|_| ScoutError::InvalidSelector(css.to_string()))
}

fn optional_selector(css: Option<&str>) -> Result<Option<Selector>, ScoutError> {
    css.map(selector).transpose()
}

impl CompiledRules {
    pub fn compile(rules: &SelectorRules) -> Result<Self, ScoutError> {
        Ok(Self {
            cards: selector(rules.cards)?,
            fallback_cards: optional_selector(rules.fallback_cards)?,
            link: selector(rules.link)?,
            title: selector(rules.title)?,
            price: selector(rules.price)?,
            surface: optional_selector(rules.surface)?,
            bedrooms: optional_selector(rules.bedrooms)?,
            address: optional_selector(rules.address)?,
            image: selector(rules.image)?,
        })
    }

    /// Pull raw fields out of every listing card on a page.
    pub fn parse_cards(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);

        let mut cards: Vec<ElementRef> = document.select(&self.cards).collect();
        if cards.is_empty() {
            if let Some(fallback) = &self.fallback_cards {
                cards = document.select(fallback).collect();
            }
        }
        debug!("Found {} listing cards in HTML", cards.len());

        cards
            .into_iter()
            .filter_map(|card| {
                let raw = self.parse_card(card);
                if raw.url.is_empty() {
                    debug!("Skipped card without link");
                    None
                } else {
                    Some(raw)
                }
            })
            .collect()
    }

    fn parse_card(&self, card: ElementRef) -> RawListing {
        let card_text = clean_text(&card.text().collect::<String>());

        let url = card
            .select(&self.link)
            .find_map(|a| a.value().attr("href"))
            .or_else(|| card.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        let title = first_text(card, &self.title).unwrap_or_default();
        let price = first_text(card, &self.price).and_then(|t| extract_price(&t));

        let surface = self
            .surface
            .as_ref()
            .and_then(|sel| first_text(card, sel))
            .and_then(|t| extract_surface(&t))
            .or_else(|| extract_surface(&card_text));

        let bedrooms = self
            .bedrooms
            .as_ref()
            .and_then(|sel| first_text(card, sel))
            .and_then(|t| extract_bedrooms_field(&t))
            .or_else(|| extract_bedrooms(&card_text));

        let address = self
            .address
            .as_ref()
            .and_then(|sel| first_text(card, sel))
            .unwrap_or_default();

        let images = card
            .select(&self.image)
            .next()
            .and_then(|img| {
                img.value()
                    .attr("src")
                    .filter(|src| !src.is_empty())
                    .or_else(|| img.value().attr("data-src"))
            })
            .map(|src| vec![src.to_string()])
            .unwrap_or_default();

        RawListing {
            url,
            title,
            price,
            surface,
            bedrooms,
            address,
            commune: String::new(),
            description: String::new(),
            images,
        }
    }
}

fn first_text(card: ElementRef, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Turn a raw card into a listing attributed to `agency`. Cards without a link yield `None`.
pub fn normalize(raw: RawListing, agency: &AgencyConfig) -> Option<Listing> {
    if raw.url.trim().is_empty() {
        return None;
    }

    let source_url = absolute_url(agency.base_url, &raw.url);
    let commune = if !raw.commune.trim().is_empty() {
        Commune::detect(&raw.commune)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| clean_text(&raw.commune))
    } else {
        agency
            .commune
            .or_else(|| Commune::detect(&format!("{} {}", raw.title, raw.address)))
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "Bruxelles".to_string())
    };

    Some(Listing {
        id: listing_id(agency.site(), &source_url),
        source: agency.name.to_string(),
        commune,
        title: clean_text(&raw.title),
        address: clean_text(&raw.address),
        description: clean_text(&raw.description),
        price: raw.price,
        surface: raw.surface,
        bedrooms: raw.bedrooms,
        images: raw
            .images
            .iter()
            .filter(|img| !img.trim().is_empty())
            .map(|img| absolute_url(agency.base_url, img))
            .collect(),
        source_url,
        first_seen: None,
        last_seen: None,
        is_new: false,
    })
}

/// Normalize, apply the search criteria and drop repeated ids (nested card
/// selectors often match the same listing twice).
pub fn finalize(raws: Vec<RawListing>, agency: &AgencyConfig, criteria: &SearchCriteria) -> Vec<Listing> {
    let mut seen = HashSet::new();
    let mut listings = Vec::new();

    for raw in raws {
        let Some(listing) = normalize(raw, agency) else {
            warn!("[{}] Failed to normalize listing", agency.name);
            continue;
        };
        if !criteria.matches(&listing) {
            debug!("[{}] {} does not match search criteria", agency.name, listing.source_url);
            continue;
        }
        if seen.insert(listing.id.clone()) {
            listings.push(listing);
        }
    }

    listings
}

/// CSS-selector scraper for one agency listing page
pub struct SelectorScraper {
    agency: &'static AgencyConfig,
    rules: CompiledRules,
    fetcher: Fetcher,
    criteria: SearchCriteria,
}

impl SelectorScraper {
    pub fn new(
        agency: &'static AgencyConfig,
        rules: SelectorRules,
        fetcher: Fetcher,
        criteria: SearchCriteria,
    ) -> Result<Self> {
        Ok(Self {
            agency,
            rules: CompiledRules::compile(&rules)?,
            fetcher,
            criteria,
        })
    }
}

#[async_trait]
impl ScraperTrait for SelectorScraper {
    async fn scrape(&self) -> Result<Vec<Listing>> {
        info!("[{}] Starting scrape...", self.agency.name);

        let html = self.fetcher.get_text(&self.agency.listings_url()).await?;
        let raws = self.rules.parse_cards(&html);
        let listings = finalize(raws, self.agency, &self.criteria);

        info!("[{}] Found {} matching listings", self.agency.name, listings.len());
        Ok(listings)
    }

    fn source_name(&self) -> &str {
        self.agency.name
    }

    fn commune(&self) -> Option<Commune> {
        self.agency.commune
    }
}

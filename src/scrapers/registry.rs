//! The agencies scraped on every run.
//!
//! Most agency sites are built on a handful of real-estate CMS templates, so
//! the selector rules differ mostly in which card containers they look for.

use crate::error::ScoutError;
use crate::models::Commune;
use crate::scrapers::agency::SelectorScraper;
use crate::scrapers::ai::{AiExtractor, AiScraper};
use crate::scrapers::http::Fetcher;
use crate::scrapers::traits::ScraperTrait;
use crate::scrapers::types::SearchCriteria;
use anyhow::Result;
use tracing::info;

/// CSS selector lists (comma-separated) for one agency site
#[derive(Debug, Clone, Copy)]
pub struct SelectorRules {
    pub cards: &'static str,
    /// Tried only when `cards` matches nothing
    pub fallback_cards: Option<&'static str>,
    pub link: &'static str,
    pub title: &'static str,
    pub price: &'static str,
    /// `None`: read the surface from the whole card text
    pub surface: Option<&'static str>,
    /// `None`: read the bedrooms from the whole card text
    pub bedrooms: Option<&'static str>,
    pub address: Option<&'static str>,
    pub image: &'static str,
}

const DEFAULT_RULES: SelectorRules = SelectorRules {
    cards: ".property, .bien, article, .listing",
    fallback_cards: None,
    link: "a[href]",
    title: "h2, h3, .title",
    price: ".price, .prix",
    surface: None,
    bedrooms: None,
    address: Some(".address, .location"),
    image: "img",
};

#[derive(Debug, Clone, Copy)]
pub enum Extraction {
    Selectors(SelectorRules),
    /// Page handed to the LLM extractor
    Ai,
}

#[derive(Debug, Clone, Copy)]
pub struct AgencyConfig {
    pub name: &'static str,
    pub base_url: &'static str,
    pub listings_path: &'static str,
    pub commune: Option<Commune>,
    pub extraction: Extraction,
}

impl AgencyConfig {
    pub fn listings_url(&self) -> String {
        format!("{}{}", self.base_url, self.listings_path)
    }

    pub fn is_ai(&self) -> bool {
        matches!(self.extraction, Extraction::Ai)
    }

    /// Host of the agency site without `www.`. Entries that scrape the same
    /// site share it, so their listing ids agree.
    pub fn site(&self) -> &'static str {
        let host = self
            .base_url
            .split_once("://")
            .map_or(self.base_url, |(_, rest)| rest);
        let host = host.split('/').next().unwrap_or(host);
        host.strip_prefix("www.").unwrap_or(host)
    }
}

const fn agency(
    name: &'static str,
    base_url: &'static str,
    listings_path: &'static str,
    commune: Commune,
    rules: SelectorRules,
) -> AgencyConfig {
    AgencyConfig {
        name,
        base_url,
        listings_path,
        commune: Some(commune),
        extraction: Extraction::Selectors(rules),
    }
}

const fn ai_agency(
    name: &'static str,
    base_url: &'static str,
    listings_path: &'static str,
    commune: Commune,
) -> AgencyConfig {
    AgencyConfig {
        name,
        base_url,
        listings_path,
        commune: Some(commune),
        extraction: Extraction::Ai,
    }
}

use Commune::{Forest, Ixelles, SaintGilles};

pub static AGENCIES: &[AgencyConfig] = &[
    // Saint-Gilles (1060)
    agency(
        "JAM Properties",
        "https://www.jamproperties.be",
        "/fr/a-vendre",
        SaintGilles,
        SelectorRules {
            cards: ".property-card, .bien-item, article.property, .listing-item, [class*=\"property\"]",
            fallback_cards: Some(".card, article, .item"),
            link: "a[href*=\"bien\"], a[href*=\"property\"], a[href]",
            title: "h2, h3, .title, .property-title, [class*=\"title\"]",
            price: ".price, .prix, [class*=\"price\"], [class*=\"prix\"]",
            surface: Some("[class*=\"surface\"], [class*=\"area\"], .m2"),
            bedrooms: Some("[class*=\"room\"], [class*=\"chambre\"], [class*=\"bedroom\"]"),
            address: Some(".address, .adresse, [class*=\"location\"], [class*=\"address\"]"),
            image: "img[src], img[data-src]",
        },
    ),
    agency(
        "Everest Properties",
        "https://www.everestproperties.be",
        "/fr/ventes",
        SaintGilles,
        SelectorRules {
            cards: ".property-item, .listing-card, .bien, article, .property",
            title: "h2, h3, .title, .property-title",
            price: ".price, .prix, [class*=\"price\"]",
            address: Some(".address, .location, [class*=\"address\"]"),
            ..DEFAULT_RULES
        },
    ),
    agency("Viabilis", "https://www.viabilis.be", "/fr/a-vendre", SaintGilles, DEFAULT_RULES),
    agency(
        "Nesting Realty",
        "https://www.nesting-realty.be",
        "/fr/biens-a-vendre",
        SaintGilles,
        SelectorRules {
            cards: ".property-card, .bien, .listing, article, .property-item",
            ..DEFAULT_RULES
        },
    ),
    agency(
        "Inside Properties",
        "https://www.inside-properties.be",
        "/fr/properties",
        SaintGilles,
        SelectorRules {
            cards: ".property, .bien, article, .listing-item",
            ..DEFAULT_RULES
        },
    ),
    agency("Fredimmo", "https://www.fredimmo.be", "/fr/a-vendre", SaintGilles, DEFAULT_RULES),
    agency(
        "Modifa",
        "https://www.modifa.be",
        "/biens?type=vente",
        SaintGilles,
        SelectorRules {
            cards: ".property, .bien, article, .listing, .card",
            ..DEFAULT_RULES
        },
    ),
    // Forest (1190)
    agency(
        "MYIMMO Altitude",
        "https://www.myimmo.be",
        "/fr/biens-a-vendre.php",
        Forest,
        SelectorRules {
            cards: ".property-card, .bien-item, .listing, article, .property, .item",
            title: "h2, h3, .title, .property-title",
            price: ".price, .prix, [class*=\"price\"]",
            address: Some(".address, .location, [class*=\"address\"]"),
            ..DEFAULT_RULES
        },
    ),
    agency(
        "Immobilière Georges",
        "https://www.immobilieregeorges.be",
        "/fr/ventes",
        Forest,
        SelectorRules {
            cards: ".property, .bien, article, .listing-item, .property-card",
            title: "h2, h3, .title, .property-title",
            ..DEFAULT_RULES
        },
    ),
    agency(
        "Abri-Europe",
        "https://www.abrieurope.be",
        "/fr/a-vendre",
        Forest,
        SelectorRules {
            address: None,
            ..DEFAULT_RULES
        },
    ),
    agency(
        "Century 21 A à Z",
        "https://www.century21.be",
        "/fr/agence/century-21-a-a-z-immobilier",
        Forest,
        SelectorRules {
            cards: ".property-card, .property, .bien, article, .listing",
            link: "a[href*=\"bien\"], a[href*=\"property\"], a[href]",
            title: "h2, h3, .title, .property-title",
            price: ".price, .prix, [class*=\"price\"]",
            ..DEFAULT_RULES
        },
    ),
    // Ixelles (1050)
    agency(
        "Lecobel Vaneau",
        "https://www.lecobel-vaneau.be",
        "/fr/biens-a-vendre",
        Ixelles,
        SelectorRules {
            cards: ".property-card, .property, .bien, article, .listing-item",
            title: "h2, h3, .title, .property-title",
            price: ".price, .prix, [class*=\"price\"]",
            ..DEFAULT_RULES
        },
    ),
    agency("Oralis Real Estate", "https://www.oralis.be", "/fr/a-vendre", Ixelles, DEFAULT_RULES),
    agency(
        "Tribel Immo",
        "https://www.tribel-immo.be",
        "/fr/a-vendre",
        Ixelles,
        SelectorRules {
            cards: ".property, .bien, article, .listing, .property-card",
            ..DEFAULT_RULES
        },
    ),
    agency(
        "ERA Châtelain",
        "https://www.era.be",
        "/fr/era-chatelain/a-vendre",
        Ixelles,
        SelectorRules {
            cards: ".property-card, .property, .bien, article, .listing",
            price: ".price, .prix, [class*=\"price\"]",
            ..DEFAULT_RULES
        },
    ),
    agency("By the Way", "https://www.bytheway.immo", "/fr/ventes", Ixelles, DEFAULT_RULES),
    agency("Fierce Immo", "https://fierceimmo.com", "/fr/ventes", Ixelles, DEFAULT_RULES),
    agency(
        "MyImmo Ixelles",
        "https://www.myimmo.be",
        "/fr/biens-a-vendre.php",
        Ixelles,
        SelectorRules {
            cards: ".property, .bien, article, .listing, .item",
            ..DEFAULT_RULES
        },
    ),
    agency("Address Real Estate", "https://www.address-re.be", "/fr/a-vendre", Ixelles, DEFAULT_RULES),
    agency("Immo Clairière", "https://www.immoclairiere.be", "/fr/a-vendre", Ixelles, DEFAULT_RULES),
    agency(
        "Immobilière de Maurissens",
        "https://www.demaurissens.be",
        "/fr/ventes",
        Ixelles,
        DEFAULT_RULES,
    ),
    agency(
        "Engel & Völkers",
        "https://www.engelvoelkers.com",
        "/fr-be/bruxelles/acheter",
        Ixelles,
        SelectorRules {
            cards: ".property-card, .property, .ev-property, article, .listing",
            price: ".price, .prix, [class*=\"price\"]",
            ..DEFAULT_RULES
        },
    ),
    agency(
        "Trevi Louise",
        "https://www.trevi.be",
        "/fr/trevi-brussels-ixelles/a-vendre",
        Ixelles,
        SelectorRules {
            cards: ".property-card, .property, .bien, article, .listing",
            price: ".price, .prix, [class*=\"price\"]",
            ..DEFAULT_RULES
        },
    ),
    // Portals spanning the three communes
    AgencyConfig {
        name: "Immoweb",
        base_url: "https://www.immoweb.be",
        listings_path: "/fr/recherche/appartement/a-vendre?countries=BE&maxPrice=500000&minSurface=80&propertyTypes=APARTMENT&provinces=BRUSSELS&postalCodes=BE-1050,BE-1060,BE-1190&orderBy=newest",
        commune: None,
        extraction: Extraction::Selectors(SelectorRules {
            cards: "article.card, article[class*=\"card\"], .search-results__item, .result-item",
            fallback_cards: Some("[class*=\"search-result\"], [class*=\"property-card\"], .card--result"),
            link: "a[href*=\"/annonce/\"], a[href*=\"/classified/\"], a.card__title-link",
            title: ".card__title, h2, h3",
            price: ".card--result__price, [class*=\"price\"]",
            surface: Some(".card__information--property, [class*=\"surface\"]"),
            bedrooms: None,
            address: Some(".card__information--locality, [class*=\"locality\"]"),
            image: "img",
        }),
    },
    AgencyConfig {
        name: "Zimmo",
        base_url: "https://www.zimmo.be",
        listings_path: "/fr/chercher/?search=eyJmaWx0ZXIiOnsic3RhdHVzIjp7ImluIjpbIkZPUl9TQUxFIl19fX0&ptype=app&price=0-500000&sort=date_desc",
        commune: None,
        extraction: Extraction::Selectors(SelectorRules {
            cards: ".property-item, .search-result-item, article.property, .result-card",
            link: "a[href]",
            title: ".property-item_title, h2, h3",
            price: ".property-item_price, .price",
            address: Some(".property-item_address, .address"),
            ..DEFAULT_RULES
        }),
    },
    // LLM-extracted sites whose markup defeats the selector rules
    ai_agency("JAM Properties (AI)", "https://www.jamproperties.be", "/fr/a-vendre", SaintGilles),
    ai_agency("Lecobel Vaneau (AI)", "https://www.lecobel-vaneau.be", "/fr/biens-a-vendre", Ixelles),
    ai_agency("ERA Châtelain (AI)", "https://www.era.be", "/fr/era-chatelain/a-vendre", Ixelles),
];

/// Case-insensitive lookup: exact name first, then a unique substring match.
pub fn find_agency(name: &str) -> Result<&'static AgencyConfig, ScoutError> {
    let needle = name.trim().to_lowercase();
    if let Some(exact) = AGENCIES.iter().find(|a| a.name.to_lowercase() == needle) {
        return Ok(exact);
    }

    let partial: Vec<&'static AgencyConfig> = AGENCIES
        .iter()
        .filter(|a| a.name.to_lowercase().contains(&needle))
        .collect();
    match partial.as_slice() {
        [only] => Ok(*only),
        _ => Err(ScoutError::UnknownAgency {
            name: name.to_string(),
            suggestions: partial.iter().map(|a| a.name.to_string()).collect(),
        }),
    }
}

/// Instantiate scrapers for the given agencies. AI agencies need an API key
/// and are left out without one.
pub fn build_scrapers(
    configs: &[&'static AgencyConfig],
    fetcher: &Fetcher,
    criteria: &SearchCriteria,
    deepseek_api_key: Option<&str>,
) -> Result<Vec<Box<dyn ScraperTrait>>> {
    let mut scrapers: Vec<Box<dyn ScraperTrait>> = Vec::with_capacity(configs.len());

    for config in configs {
        match config.extraction {
            Extraction::Selectors(rules) => {
                let scraper = SelectorScraper::new(config, rules, fetcher.clone(), criteria.clone())?;
                scrapers.push(Box::new(scraper));
            }
            Extraction::Ai => match deepseek_api_key {
                Some(key) => {
                    let extractor = AiExtractor::new(fetcher.client().clone(), key);
                    scrapers.push(Box::new(AiScraper::new(
                        config,
                        fetcher.clone(),
                        extractor,
                        criteria.clone(),
                    )));
                }
                None => info!("[{}] DEEPSEEK_API_KEY not set, skipping AI scraper", config.name),
            },
        }
    }

    Ok(scrapers)
}

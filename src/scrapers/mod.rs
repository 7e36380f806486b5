pub mod agency;
pub mod ai;
pub mod extract;
pub mod http;
pub mod registry;
pub mod traits;
pub mod types;

pub use agency::SelectorScraper;
pub use ai::{AiExtractor, AiScraper, ApiCheck};
pub use http::Fetcher;
pub use registry::{build_scrapers, find_agency, AgencyConfig, AGENCIES};
pub use traits::ScraperTrait;
pub use types::SearchCriteria;

pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod scrapers;
pub mod storage;
pub mod viewer;

pub use error::ScoutError;
pub use models::{Commune, History, Listing, ListingFile};

use crate::error::ScoutError;
use anyhow::{Context, Result};
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, warn};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// Shared HTTP client for agency pages, with polite delays and retries
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    delay: (Duration, Duration),
}

impl Fetcher {
    pub fn new(delay: (Duration, Duration)) -> Result<Self> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("fr-BE,fr;q=0.9,nl;q=0.8,en;q=0.7"));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_retries: 3,
            delay,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET a page body, retrying with exponential backoff.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.polite_delay().await;

        let mut last_error = String::new();
        for attempt in 0..self.max_retries {
            debug!("Fetching URL: {} (attempt {})", url, attempt + 1);
            match self.try_get(url).await {
                Ok(body) => {
                    debug!("Downloaded {} bytes from {}", body.len(), url);
                    return Ok(body);
                }
                Err(e) => {
                    warn!("Request failed (attempt {}): {:#}", attempt + 1, e);
                    last_error = format!("{e:#}");
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                    }
                }
            }
        }

        error!("All retries failed for {}", url);
        Err(ScoutError::FetchExhausted {
            url: url.to_string(),
            attempts: self.max_retries,
            message: last_error,
        }
        .into())
    }

    async fn try_get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        if !response.status().is_success() {
            return Err(ScoutError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        response.text().await.context("Failed to read response body")
    }

    async fn polite_delay(&self) {
        let (min, max) = self.delay;
        if max.is_zero() {
            return;
        }
        let wait = if max > min {
            rand::rng().random_range(min..max)
        } else {
            min
        };
        tokio::time::sleep(wait).await;
    }
}

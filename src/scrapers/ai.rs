//! LLM-backed extraction for agency sites whose markup has no stable selectors.

use crate::error::ScoutError;
use crate::models::{Commune, Listing};
use crate::scrapers::agency::finalize;
use crate::scrapers::http::Fetcher;
use crate::scrapers::registry::AgencyConfig;
use crate::scrapers::traits::ScraperTrait;
use crate::scrapers::types::{RawListing, SearchCriteria};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const MAX_HTML_CHARS: usize = 15_000;

const EXTRACTION_PROMPT: &str = r#"Tu es un assistant qui extrait des annonces immobilières d'une page HTML.

Extrais TOUTES les annonces de vente d'appartements de cette page. Pour chaque annonce, retourne un objet JSON avec:
- url: lien vers l'annonce (relatif ou absolu)
- title: titre de l'annonce
- price: prix en nombre (juste le chiffre, sans € ni espaces)
- surface: surface en m² (juste le nombre)
- bedrooms: nombre de chambres (juste le nombre)
- address: adresse ou localisation

Retourne UNIQUEMENT un tableau JSON valide, sans explication. Si aucune annonce, retourne [].

Exemple de réponse:
[{"url": "/bien/123", "title": "Appartement 2ch", "price": 350000, "surface": 85, "bedrooms": 2, "address": "Rue de la Paix, 1060"}]

HTML de la page:
"#;

static NOISE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script, style, nav, footer, header, noscript").unwrap());
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static RE_JSON_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[\s\S]*\]").unwrap());

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Drop non-content elements from the parsed tree, keep the body and cap
/// the size sent to the model.
pub fn prepare_html(html: &str) -> String {
    let mut document = Html::parse_document(html);

    let noise: Vec<_> = document.select(&NOISE).map(|el| el.id()).collect();
    for id in noise {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let body = document
        .select(&BODY)
        .next()
        .map(|body| body.html())
        .unwrap_or_else(|| document.root_element().html());

    match body.char_indices().nth(MAX_HTML_CHARS) {
        Some((cut, _)) => body[..cut].to_string(),
        None => body,
    }
}

/// Find the JSON array in a model reply. Items that are not objects are dropped.
pub fn parse_reply(content: &str) -> Result<Vec<RawListing>, ScoutError> {
    let Some(array) = RE_JSON_ARRAY.find(content) else {
        return Ok(Vec::new());
    };

    let items: Vec<Value> = serde_json::from_str(array.as_str())
        .map_err(|e| ScoutError::Extraction(format!("reply is not a JSON array: {e}")))?;

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawListing>(item) {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!("Dropping malformed extracted item: {}", e);
                None
            }
        })
        .collect())
}

/// DeepSeek chat-completions client
#[derive(Clone)]
pub struct AiExtractor {
    client: Client,
    api_key: String,
}

impl AiExtractor {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    async fn chat(&self, content: String, max_tokens: u32, timeout: Duration) -> Result<Response> {
        let request = ChatRequest {
            model: "deepseek-chat",
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            temperature: 0.1,
            max_tokens,
        };

        self.client
            .post(DEEPSEEK_API_URL)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .context("Failed to call DeepSeek API")
    }

    pub async fn extract(&self, html: &str) -> Result<Vec<RawListing>> {
        let prompt = format!("{EXTRACTION_PROMPT}{}", prepare_html(html));
        let response = self.chat(prompt, 4000, Duration::from_secs(60)).await?;

        if !response.status().is_success() {
            return Err(status_error(response.status()).into());
        }
        let content = first_choice(response).await?;
        Ok(parse_reply(&content)?)
    }

    /// Round-trip a tiny prompt to confirm the key and endpoint work.
    pub async fn check(&self) -> Result<ApiCheck> {
        let response = self
            .chat("Dis juste 'OK'".to_string(), 10, Duration::from_secs(30))
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(ApiCheck::RateLimited);
        }
        if !status.is_success() {
            return Err(status_error(status).into());
        }
        Ok(ApiCheck::Reachable(first_choice(response).await?))
    }
}

/// Outcome of [`AiExtractor::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCheck {
    Reachable(String),
    /// Rate limited, which still proves the key reaches the API
    RateLimited,
}

fn status_error(status: StatusCode) -> ScoutError {
    match status {
        StatusCode::UNAUTHORIZED => ScoutError::Extraction("DeepSeek rejected the API key (401)".to_string()),
        other => ScoutError::Extraction(format!("DeepSeek returned status {}", other.as_u16())),
    }
}

async fn first_choice(response: Response) -> Result<String> {
    let body: ChatResponse = response.json().await.context("Invalid DeepSeek response")?;
    body.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ScoutError::Extraction("DeepSeek returned no choices".to_string()).into())
}

/// Scraper that hands the agency page to the LLM extractor
pub struct AiScraper {
    agency: &'static AgencyConfig,
    fetcher: Fetcher,
    extractor: AiExtractor,
    criteria: SearchCriteria,
}

impl AiScraper {
    pub fn new(
        agency: &'static AgencyConfig,
        fetcher: Fetcher,
        extractor: AiExtractor,
        criteria: SearchCriteria,
    ) -> Self {
        Self {
            agency,
            fetcher,
            extractor,
            criteria,
        }
    }
}

#[async_trait]
impl ScraperTrait for AiScraper {
    async fn scrape(&self) -> Result<Vec<Listing>> {
        info!("[AI] Scraping {}...", self.agency.name);

        let html = self.fetcher.get_text(&self.agency.listings_url()).await?;
        let raws = self.extractor.extract(&html).await?;
        if raws.is_empty() {
            warn!("[{}] Model found no listings on the page", self.agency.name);
        }

        let listings = finalize(raws, self.agency, &self.criteria);
        info!("[AI] Found {} listings from {}", listings.len(), self.agency.name);
        Ok(listings)
    }

    fn source_name(&self) -> &str {
        self.agency.name
    }

    fn commune(&self) -> Option<Commune> {
        self.agency.commune
    }
}

use crate::error::ScoutError;
use crate::models::Listing;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Telegram bot notifier
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    pub fn from_credentials(credentials: Option<(&str, &str)>) -> Result<Self> {
        let (token, chat_id) =
            credentials.ok_or(ScoutError::MissingCredentials("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID"))?;
        Self::new(token, chat_id)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach Telegram")?;
        if !response.status().is_success() {
            anyhow::bail!("Telegram returned status {}", response.status());
        }
        Ok(())
    }
}

/// `350000.0` -> `"350.000"`
pub fn format_price(price: f64) -> String {
    let whole = price.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

fn or_placeholder<T: ToString>(value: Option<T>, placeholder: &str) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| placeholder.to_string())
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Escape the characters Telegram's legacy Markdown treats as entity markers.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '[' | '`') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub fn format_message(listing: &Listing) -> String {
    let price = listing.price.map(format_price).unwrap_or_else(|| "N/A".to_string());
    let surface = or_placeholder(listing.surface.map(|s| s.round() as i64), "?");

    format!(
        "🏠 *Nouvelle annonce !*\n\n\
         📍 *{commune}* - {address}\n\
         💰 {price} €\n\
         🛏️ {bedrooms} chambre(s) | 📐 {surface} m²\n\n\
         🏢 Source: {source}\n\n\
         🔗 [Voir l'annonce]({url})",
        commune = escape_markdown(non_empty(&listing.commune, "Bruxelles")),
        address = escape_markdown(non_empty(&listing.address, "Adresse non disponible")),
        bedrooms = or_placeholder(listing.bedrooms, "?"),
        source = escape_markdown(non_empty(&listing.source, "Unknown")),
        url = non_empty(&listing.source_url, "#"),
    )
}

/// Send one message per listing. Delivery failures are logged, never returned.
pub async fn notify_new_listings(notifier: &dyn Notifier, listings: &[Listing], pause: Duration) -> (usize, usize) {
    let mut sent = 0;
    let mut failed = 0;

    for (i, listing) in listings.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        match notifier.send(&format_message(listing)).await {
            Ok(()) => sent += 1,
            Err(e) => {
                error!("Failed to send notification for {}: {:#}", listing.id, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        warn!("📱 {} of {} notifications failed", failed, listings.len());
    } else {
        info!("📱 Sent {} notifications", sent);
    }
    (sent, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::listing;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, text: &str) -> Result<()> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_on == Some(sent.len()) {
                sent.push(String::new());
                anyhow::bail!("chat endpoint unavailable");
            }
            sent.push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn prices_use_dot_thousands() {
        assert_eq!(format_price(350_000.0), "350.000");
        assert_eq!(format_price(1_250_000.0), "1.250.000");
        assert_eq!(format_price(950.0), "950");
    }

    #[test]
    fn message_contains_listing_details() {
        let mut l = listing("a", "Viabilis");
        l.bedrooms = None;
        let message = format_message(&l);

        assert!(message.contains("*Saint-Gilles* - Rue de la Victoire 12, 1060"));
        assert!(message.contains("💰 350.000 €"));
        assert!(message.contains("? chambre(s)"));
        assert!(message.contains("90 m²"));
        assert!(message.contains("(https://example.be/bien/a)"));
    }

    #[test]
    fn missing_price_renders_placeholder() {
        let mut l = listing("a", "Viabilis");
        l.price = None;
        l.address = String::new();
        let message = format_message(&l);
        assert!(message.contains("N/A €"));
        assert!(message.contains("Adresse non disponible"));
    }

    #[test]
    fn scraped_text_cannot_open_markdown_entities() {
        let mut l = listing("a", "Immo_Clairière");
        l.address = "Rue *Neuve* [bis] 3_A `x`".to_string();
        let message = format_message(&l);

        assert!(message.contains(r"Rue \*Neuve\* \[bis] 3\_A \`x\`"));
        assert!(message.contains(r"Source: Immo\_Clairière"));
        assert!(message.starts_with("🏠 *Nouvelle annonce !*"));
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_not_raised() {
        let notifier = RecordingNotifier {
            fail_on: Some(1),
            ..Default::default()
        };
        let listings = vec![listing("a", "Viabilis"), listing("b", "Viabilis"), listing("c", "Modifa")];

        let (sent, failed) = notify_new_listings(&notifier, &listings, Duration::ZERO).await;

        assert_eq!((sent, failed), (2, 1));
        assert_eq!(notifier.sent.lock().unwrap().len(), 3);
    }

    #[test]
    fn missing_credentials_are_reported() {
        let err = TelegramNotifier::from_credentials(None).err().unwrap();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }
}

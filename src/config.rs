use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Runtime configuration loaded from the environment (and `.env` if present).
/// Secrets are optional: a missing key disables the feature that needs it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Notifications
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // AI extraction
    pub deepseek_api_key: Option<String>,

    // Storage
    pub data_dir: PathBuf,
    pub docs_dir: PathBuf,

    // Politeness delay bounds between agency requests
    pub request_delay: (Duration, Duration),
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let request_delay = match non_empty_var("DREAMHOUSE_REQUEST_DELAY_MS") {
            Some(raw) => parse_delay(&raw)?,
            None => (Duration::from_millis(1000), Duration::from_millis(2500)),
        };

        let config = Self {
            telegram_bot_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty_var("TELEGRAM_CHAT_ID"),
            deepseek_api_key: non_empty_var("DEEPSEEK_API_KEY"),
            data_dir: non_empty_var("DREAMHOUSE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            docs_dir: non_empty_var("DREAMHOUSE_DOCS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("docs")),
            request_delay,
        };

        config.log_keys();
        Ok(config)
    }

    pub fn telegram_credentials(&self) -> Option<(&str, &str)> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat)) => Some((token.as_str(), chat.as_str())),
            _ => None,
        }
    }

    fn log_keys(&self) {
        info!(
            telegram_bot_token = %preview(self.telegram_bot_token.as_deref()),
            telegram_chat_id = %preview(self.telegram_chat_id.as_deref()),
            deepseek_api_key = %preview(self.deepseek_api_key.as_deref()),
            "Loaded configuration"
        );
    }
}

/// `"1000"` -> 1 s to 1.5 s between requests
fn parse_delay(raw: &str) -> Result<(Duration, Duration)> {
    let ms: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("DREAMHOUSE_REQUEST_DELAY_MS is not a number: {raw}"))?;
    Ok((Duration::from_millis(ms), Duration::from_millis(ms.saturating_add(ms / 2))))
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn preview(val: Option<&str>) -> String {
    match val {
        Some(v) => {
            let shown: String = v.chars().take(4).collect();
            format!("{shown}...")
        }
        None => "(not set)".to_string(),
    }
}

mod args;

use anyhow::{Context, Result};
use args::{Args, Command, ViewArgs};
use chrono::Utc;
use clap::Parser;
use dreamhouse_scout::collector::{run_pipeline, RunOptions};
use dreamhouse_scout::config::AppConfig;
use dreamhouse_scout::error::ScoutError;
use dreamhouse_scout::models::Commune;
use dreamhouse_scout::notify::{Notifier, TelegramNotifier};
use dreamhouse_scout::scrapers::{
    build_scrapers, find_agency, AgencyConfig, AiExtractor, ApiCheck, Fetcher, SearchCriteria, AGENCIES,
};
use dreamhouse_scout::storage::{write_json_atomic, Store};
use dreamhouse_scout::viewer::render::{render_card, render_html, render_summary};
use dreamhouse_scout::viewer::{load_with_retry, place_markers, to_geojson, Filters, ViewerState};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const NOTIFY_PAUSE: Duration = Duration::from_millis(500);
const LOAD_RETRY_PAUSE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // .env must be loaded before clap reads the path variables
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = args.docs_dir {
        config.docs_dir = dir;
    }

    match args.command {
        Command::Run {
            agency,
            dry_run,
            no_notify,
        } => run(&config, agency.as_deref(), dry_run, no_notify).await,
        Command::List => {
            list_agencies();
            Ok(())
        }
        Command::View(view_args) => view(&config, view_args).await,
        Command::CheckAi => check_ai(&config).await,
    }
}

async fn run(config: &AppConfig, agency: Option<&str>, dry_run: bool, no_notify: bool) -> Result<()> {
    info!("🏠 Dreamhouse Scout");
    info!("==================");

    let configs: Vec<&'static AgencyConfig> = match agency {
        Some(name) => vec![find_agency(name)?],
        None => AGENCIES.iter().collect(),
    };

    let fetcher = Fetcher::new(config.request_delay)?;
    let criteria = SearchCriteria::default();
    let scrapers = build_scrapers(&configs, &fetcher, &criteria, config.deepseek_api_key.as_deref())?;
    info!("Scraping {} agencies", scrapers.len());

    let notifier = if dry_run || no_notify {
        None
    } else {
        match TelegramNotifier::from_credentials(config.telegram_credentials()) {
            Ok(notifier) => Some(notifier),
            Err(e) => {
                warn!("Skipping notifications: {:#}", e);
                None
            }
        }
    };

    let store = Store::new(&config.data_dir, &config.docs_dir);
    let options = RunOptions {
        dry_run,
        notify_pause: NOTIFY_PAUSE,
    };
    let summary = run_pipeline(
        &store,
        &scrapers,
        notifier.as_ref().map(|n| n as &dyn Notifier),
        options,
        Utc::now(),
    )
    .await?;

    info!(
        "✅ Done: {} scraped, {} failed agencies, {} listings, {} new, {} notified",
        summary.scraped, summary.failed_sources, summary.total, summary.new_listings, summary.notified
    );
    Ok(())
}

async fn check_ai(config: &AppConfig) -> Result<()> {
    let key = config
        .deepseek_api_key
        .as_deref()
        .ok_or(ScoutError::MissingCredentials("DEEPSEEK_API_KEY"))?;

    info!("🔄 Testing DeepSeek connection...");
    let fetcher = Fetcher::new(config.request_delay)?;
    match AiExtractor::new(fetcher.client().clone(), key).check().await? {
        ApiCheck::Reachable(reply) => println!("✅ DeepSeek API OK, reply: {}", reply.trim()),
        ApiCheck::RateLimited => println!("⚠️ Rate limited, but the API is reachable"),
    }
    Ok(())
}

fn list_agencies() {
    let groups = Commune::ALL
        .iter()
        .map(|c| (c.name(), Some(*c)))
        .chain(std::iter::once(("Bruxelles", None)));

    for (label, commune) in groups {
        let members: Vec<&AgencyConfig> = AGENCIES.iter().filter(|a| a.commune == commune).collect();
        if members.is_empty() {
            continue;
        }
        println!("{label} ({}):", members.len());
        for agency in members {
            let marker = if agency.is_ai() { " 🤖" } else { "" };
            println!("  - {}{marker}  {}", agency.name, agency.listings_url());
        }
        println!();
    }
    println!("Total: {} agencies", AGENCIES.len());
}

async fn view(config: &AppConfig, args: ViewArgs) -> Result<()> {
    let source = match args.source {
        Some(source) => source,
        None => Store::new(&config.data_dir, &config.docs_dir)
            .listings_path()
            .display()
            .to_string(),
    };

    let filters = Filters::parse(
        args.commune.as_deref(),
        args.price.as_deref(),
        args.bedrooms.as_deref(),
        args.surface.as_deref(),
    )?;

    let file = load_with_retry(&source, args.retry, LOAD_RETRY_PAUSE)
        .await
        .with_context(|| format!("Failed to load listings from {source} (rerun later or pass --retry N)"))?;
    let state = ViewerState::new(file).with_filters(filters);

    let now = Utc::now();
    let visible = state.visible();
    println!("{}\n", render_summary(visible.len(), state.listings.len(), state.last_updated));
    for listing in &visible {
        println!("{}", render_card(listing, now));
    }

    if args.html.is_none() && args.map.is_none() {
        return Ok(());
    }

    let markers = place_markers(&visible, &mut rand::rng());

    if let Some(path) = &args.html {
        let page = render_html(&visible, &markers, state.listings.len(), now, state.last_updated);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(path, page)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("💾 Wrote page to {}", path.display());
    }

    if let Some(path) = &args.map {
        write_json_atomic(path, &to_geojson(&markers))?;
        info!("🗺️ Wrote {} markers to {}", markers.len(), path.display());
    }

    Ok(())
}

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dreamhouse")]
#[command(about = "Collects Brussels property listings from agency websites and shows them")]
#[command(version)]
pub struct Args {
    /// Directory holding history.json and new_listings.json
    #[arg(long, global = true, env = "DREAMHOUSE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the published listings.json
    #[arg(long, global = true, env = "DREAMHOUSE_DOCS_DIR")]
    pub docs_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape agencies, merge with known listings and notify about new ones
    Run {
        /// Only scrape this agency (case-insensitive, partial names allowed)
        #[arg(short, long)]
        agency: Option<String>,

        /// Scrape and log results without writing files or notifying
        #[arg(long)]
        dry_run: bool,

        /// Persist results but skip Telegram notifications
        #[arg(long)]
        no_notify: bool,
    },

    /// Print the configured agencies grouped by commune
    List,

    /// Filter and display the published listings
    View(ViewArgs),

    /// Check that DEEPSEEK_API_KEY reaches the DeepSeek API
    CheckAi,
}

#[derive(ClapArgs, Debug)]
pub struct ViewArgs {
    /// Listing file path or http(s) URL (defaults to <docs-dir>/listings.json)
    #[arg(short, long)]
    pub source: Option<String>,

    /// Commune name or part of it
    #[arg(long)]
    pub commune: Option<String>,

    /// Price range: `all`, `min-max`, `min+` or `-max`
    #[arg(long)]
    pub price: Option<String>,

    /// Bedrooms: `n` for exactly n, `n+` for at least n
    #[arg(long)]
    pub bedrooms: Option<String>,

    /// Surface range in m², same syntax as --price
    #[arg(long)]
    pub surface: Option<String>,

    /// Also write a static HTML page with cards and a map
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Also write the map markers as GeoJSON
    #[arg(long)]
    pub map: Option<PathBuf>,

    /// Extra load attempts when the listing file cannot be read
    #[arg(long, default_value_t = 2)]
    pub retry: u32,
}

mod config;
mod models;
mod output;
mod scrapers;

use anyhow::{Context, Result};
use clap::Parser;
use config::{parse_page_count, Config, SourceKind};
use scrapers::{BrowserPageSource, HttpPageSource, PageSource, Pipeline};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn, Level};

/// Listings per results page, used for the startup estimate
const LISTINGS_PER_PAGE: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "spitogatos-scout")]
#[command(about = "Scrape spitogatos.gr listing pages into a CSV file", long_about = None)]
struct Args {
    /// JSON config file (built-in defaults when missing)
    #[arg(short, long, default_value = "scout.json")]
    config: PathBuf,

    /// Write the default config to --config and exit
    #[arg(long)]
    init_config: bool,

    /// Fetch strategy
    #[arg(short, long, value_enum)]
    source: Option<SourceKind>,

    /// Page cap for every area
    #[arg(short, long)]
    pages: Option<u32>,

    /// Ask for the page cap on stdin
    #[arg(long, conflicts_with = "pages")]
    ask_pages: bool,

    /// Only scrape these areas (repeatable)
    #[arg(short, long = "area")]
    areas: Vec<String>,

    /// Directory for the CSV file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Run Chrome without a window
    #[arg(long)]
    headless: bool,

    /// Start immediately instead of waiting a few seconds
    #[arg(long)]
    no_countdown: bool,
}

fn init_logging(config: &Config) {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        return;
    }

    let level = match config.tracing_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn prompt_page_count() -> Result<u32> {
    print!("How many pages per area? ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(parse_page_count(&line))
}

/// Expected listings and minutes for the configured areas
struct Plan {
    per_area: Vec<u64>,
    total_listings: u64,
    minutes: u64,
}

fn plan(config: &Config) -> Plan {
    let per_area: Vec<u64> = config
        .areas
        .iter()
        .map(|a| u64::from(a.pages).saturating_mul(LISTINGS_PER_PAGE))
        .collect();
    let total_listings = per_area.iter().fold(0u64, |acc, n| acc.saturating_add(*n));
    let total_pages = config
        .areas
        .iter()
        .fold(0u64, |acc, a| acc.saturating_add(u64::from(a.pages)));

    Plan {
        per_area,
        total_listings,
        minutes: total_pages.saturating_mul(10) / 60,
    }
}

fn print_plan(config: &Config) {
    let plan = plan(config);

    info!("📍 Areas and pages to scrape:");
    for (i, (area, expected)) in config.areas.iter().zip(&plan.per_area).enumerate() {
        info!(
            "  {}. {}: {} pages (~{} listings)",
            i + 1,
            area.display_name(),
            area.pages,
            expected
        );
    }

    info!("📊 Expected total: ~{} listings", plan.total_listings);
    info!("⏱️  Estimated time: ~{} minutes", plan.minutes);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init_config {
        Config::create_default(&args.config)?;
        println!("Wrote default config to {}", args.config.display());
        return Ok(());
    }

    let mut config = Config::load(&args.config)?;
    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if args.headless {
        config.headless = true;
    }
    config.restrict_areas(&args.areas)?;

    init_logging(&config);

    if let Some(pages) = args.pages {
        config.set_page_cap(pages);
    } else if args.ask_pages {
        config.set_page_cap(prompt_page_count()?);
    }

    config.validate()?;

    if config.source == SourceKind::Browser && !config.headless {
        info!("⚠️  A Chrome window will open - don't close it while scraping");
    }

    info!("🏠 Spitogatos Scout ({} source)", match config.source {
        SourceKind::Http => "HTTP",
        SourceKind::Browser => "browser",
    });
    print_plan(&config);

    if !args.no_countdown && config.startup_delay_secs > 0 {
        info!(
            "Starting in {} seconds... (Press Ctrl+C to cancel)",
            config.startup_delay_secs
        );
        tokio::time::sleep(Duration::from_secs(config.startup_delay_secs)).await;
    }

    let origin = reqwest::Url::parse(&config.site_origin).context("Invalid site_origin")?;

    let source: Box<dyn PageSource> = match config.source {
        SourceKind::Http => Box::new(HttpPageSource::new(
            &config.user_agent,
            config.request_timeout_secs,
        )?),
        SourceKind::Browser => Box::new(BrowserPageSource::new(
            &config.user_agent,
            config.headless,
            config.browser,
        )?),
    };

    let report = Pipeline::new(source.as_ref(), origin, config.politeness())
        .run(&config.areas)
        .await;
    drop(source);

    info!("{}", "=".repeat(70));
    info!("📊 RESULTS");
    info!("{}", "=".repeat(70));
    for stats in &report.areas {
        info!(
            "  {}: {} listings from {} pages ({})",
            stats.name, stats.listings, stats.pages_fetched, stats.stop
        );
    }
    info!("  TOTAL: {}", report.listings.len());

    if report.listings.is_empty() {
        warn!("❌ No data collected");
        return Ok(());
    }

    match output::save_listings(&report.listings, &config.output_dir, &config.file_prefix) {
        Ok(path) => {
            info!("📁 Saved: {}", path.display());
            info!("Total: {} properties", report.listings.len());
            Ok(())
        }
        Err(e) => {
            error!("Failed to save listings: {:#}", e);
            Err(e)
        }
    }
}

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Pages per area used when `--ask-pages` gets unusable input
pub const DEFAULT_PROMPT_PAGES: u32 = 10;

/// Upper bound for any single politeness delay
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// How listing pages are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Http,
    Browser,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(SourceKind::Http),
            "browser" => Ok(SourceKind::Browser),
            other => anyhow::bail!("Unknown source '{}', expected 'http' or 'browser'", other),
        }
    }
}

/// Uniform random delay in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    #[cfg(test)]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Random duration in the range, clamped to `0..=MAX_DELAY_SECS`.
    /// Non-finite bounds sample as zero.
    pub fn sample(&self) -> Duration {
        if !self.min_secs.is_finite() || !self.max_secs.is_finite() {
            return Duration::ZERO;
        }

        let min = self.min_secs.clamp(0.0, MAX_DELAY_SECS);
        let max = self.max_secs.clamp(0.0, MAX_DELAY_SECS);
        let secs = if max <= min {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    fn validate(&self, what: &str) -> Result<()> {
        if !self.min_secs.is_finite() || !self.max_secs.is_finite() {
            anyhow::bail!("{} delay must be a finite number of seconds", what);
        }
        if self.min_secs < 0.0 {
            anyhow::bail!("{} delay cannot be negative", what);
        }
        if self.max_secs > MAX_DELAY_SECS {
            anyhow::bail!(
                "{} delay of {}s exceeds the {}s limit",
                what,
                self.max_secs,
                MAX_DELAY_SECS
            );
        }
        if self.min_secs > self.max_secs {
            anyhow::bail!(
                "{} delay has min {}s greater than max {}s",
                what,
                self.min_secs,
                self.max_secs
            );
        }
        Ok(())
    }
}

/// One paginated feed on the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaConfig {
    pub name: String,
    pub url: String,
    /// Page cap
    pub pages: u32,
}

impl AreaConfig {
    /// "athens-north" -> "Athens North"
    pub fn display_name(&self) -> String {
        self.name
            .split('-')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Sleeps inserted between requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Politeness {
    pub between_pages: DelayRange,
    /// Take a long break after every N-th page (0 disables it)
    pub long_break_every: u32,
    pub long_break: DelayRange,
    pub between_areas: DelayRange,
}

impl Politeness {
    /// Delay preset matching the fetch strategy and number of areas
    pub fn preset(source: SourceKind, area_count: usize) -> Self {
        let between_pages = match (source, area_count) {
            (SourceKind::Browser, _) => DelayRange::new(5.0, 10.0),
            (SourceKind::Http, n) if n <= 1 => DelayRange::new(2.0, 5.0),
            (SourceKind::Http, _) => DelayRange::new(5.0, 12.0),
        };

        Self {
            between_pages,
            long_break_every: 10,
            long_break: DelayRange::new(20.0, 40.0),
            between_areas: DelayRange::new(30.0, 60.0),
        }
    }

    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            between_pages: DelayRange::zero(),
            long_break_every: 0,
            long_break: DelayRange::zero(),
            between_areas: DelayRange::zero(),
        }
    }
}

/// Timing knobs for the browser page source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrowserTiming {
    #[serde(default = "default_page_load")]
    pub page_load: DelayRange,
    #[serde(default = "default_scroll_step")]
    pub scroll_step: DelayRange,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl Default for BrowserTiming {
    fn default() -> Self {
        Self {
            page_load: default_page_load(),
            scroll_step: default_scroll_step(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_site_origin")]
    pub site_origin: String,
    #[serde(default = "default_areas")]
    pub areas: Vec<AreaConfig>,
    #[serde(default = "default_source")]
    pub source: SourceKind,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub browser: BrowserTiming,
    /// Falls back to `Politeness::preset` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub politeness: Option<Politeness>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

fn default_site_origin() -> String {
    "https://www.spitogatos.gr".to_string()
}

fn default_areas() -> Vec<AreaConfig> {
    [("athens-center", 80), ("athens-north", 80), ("athens-south", 60)]
        .into_iter()
        .map(|(name, pages)| AreaConfig {
            name: name.to_string(),
            url: format!("https://www.spitogatos.gr/en/for_sale-homes/{}", name),
            pages,
        })
        .collect()
}

fn default_source() -> SourceKind {
    SourceKind::Browser
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_headless() -> bool {
    false
}

fn default_page_load() -> DelayRange {
    DelayRange::new(3.0, 6.0)
}

fn default_scroll_step() -> DelayRange {
    DelayRange::new(0.5, 1.5)
}

fn default_wait_timeout_secs() -> u64 {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_prefix() -> String {
    "athens_listings".to_string()
}

fn default_startup_delay_secs() -> u64 {
    3
}

fn default_tracing_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_origin: default_site_origin(),
            areas: default_areas(),
            source: default_source(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            headless: default_headless(),
            browser: BrowserTiming::default(),
            politeness: None,
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            startup_delay_secs: default_startup_delay_secs(),
            tracing_level: default_tracing_level(),
        }
    }
}

impl Config {
    /// Load from a JSON file if it exists, otherwise start from defaults,
    /// then apply `SCOUT_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_json(&raw)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Write the default configuration as pretty JSON
    pub fn create_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut config = Self::default();
        config.politeness = Some(Politeness::preset(config.source, config.areas.len()));

        let json = serde_json::to_string_pretty(&config)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = env::var("SCOUT_SOURCE") {
            self.source = source.parse().context("Failed to parse SCOUT_SOURCE")?;
        }

        if let Ok(user_agent) = env::var("SCOUT_USER_AGENT") {
            self.user_agent = user_agent;
        }

        if let Ok(dir) = env::var("SCOUT_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }

        if let Ok(pages) = env::var("SCOUT_PAGES") {
            let pages = pages
                .trim()
                .parse()
                .context("Failed to parse SCOUT_PAGES environment variable")?;
            self.set_page_cap(pages);
        }

        Ok(())
    }

    /// Same page cap for every area
    pub fn set_page_cap(&mut self, pages: u32) {
        for area in &mut self.areas {
            area.pages = pages;
        }
    }

    /// Keep only the named areas, in configured order
    pub fn restrict_areas(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }

        for name in names {
            if !self.areas.iter().any(|a| &a.name == name) {
                anyhow::bail!("Unknown area '{}'", name);
            }
        }

        self.areas.retain(|a| names.contains(&a.name));
        Ok(())
    }

    pub fn politeness(&self) -> Politeness {
        self.politeness
            .unwrap_or_else(|| Politeness::preset(self.source, self.areas.len()))
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.site_origin)
            .with_context(|| format!("Invalid site_origin '{}'", self.site_origin))?;

        if self.areas.is_empty() {
            anyhow::bail!("At least one area is required");
        }

        for area in &self.areas {
            if area.url.trim().is_empty() {
                anyhow::bail!("Area '{}' has an empty url", area.name);
            }
        }

        let politeness = self.politeness();
        politeness.between_pages.validate("between_pages")?;
        politeness.long_break.validate("long_break")?;
        politeness.between_areas.validate("between_areas")?;
        self.browser.page_load.validate("page_load")?;
        self.browser.scroll_step.validate("scroll_step")?;

        Ok(())
    }
}

/// Parse a page count typed at the prompt, falling back on bad input
pub fn parse_page_count(input: &str) -> u32 {
    match input.trim().parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => DEFAULT_PROMPT_PAGES,
    }
}

use crate::config::BrowserTiming;
use crate::scrapers::extract::LISTING_SELECTOR;
use crate::scrapers::traits::{FetchError, PageSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// Browser-driven page source using Chrome over the DevTools protocol
pub struct BrowserPageSource {
    // Field order matters: the tab must go before the browser process
    tab: Arc<Tab>,
    _browser: Browser,
    timing: BrowserTiming,
}

impl BrowserPageSource {
    /// Launch Chrome with anti-automation flags and open one tab for the whole run
    pub fn new(user_agent: &str, headless: bool, timing: BrowserTiming) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", headless);

        let user_agent_arg = format!("--user-agent={}", user_agent);
        let args = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(user_agent_arg.as_str()),
        ];

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(Duration::from_secs(600))
            .ignore_default_args(vec![OsStr::new("--enable-automation")])
            .args(args)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_user_agent(user_agent, None, None)
            .context("Failed to set user agent")?;

        Ok(Self {
            tab,
            _browser: browser,
            timing,
        })
    }
}

fn browser_err(err: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(err.to_string())
}

/// Navigate, linger, scroll in three steps and wait for listing tiles
fn load_page(tab: &Tab, url: &str, timing: &BrowserTiming) -> Result<String, FetchError> {
    tab.navigate_to(url).map_err(browser_err)?;
    tab.wait_until_navigated().map_err(browser_err)?;

    if let Err(e) = tab.evaluate(HIDE_WEBDRIVER, false) {
        debug!("Could not hide navigator.webdriver: {}", e);
    }

    thread::sleep(timing.page_load.sample());

    let total_height = tab
        .evaluate("document.body.scrollHeight", false)
        .map_err(browser_err)?
        .value
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    for step in 1..=3 {
        let y = total_height * f64::from(step) / 4.0;
        tab.evaluate(&format!("window.scrollTo(0, {});", y), false)
            .map_err(browser_err)?;
        thread::sleep(timing.scroll_step.sample());
    }

    if tab
        .wait_for_element_with_custom_timeout(
            LISTING_SELECTOR,
            Duration::from_secs(timing.wait_timeout_secs),
        )
        .is_err()
    {
        warn!("  No listings found or page didn't load properly");
        return Err(FetchError::NoListings);
    }

    let html = tab
        .evaluate("document.documentElement.outerHTML", false)
        .map_err(browser_err)?
        .value
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    if html.is_empty() {
        return Err(FetchError::Browser("page HTML was empty".to_string()));
    }

    Ok(html)
}

#[async_trait]
impl PageSource for BrowserPageSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        info!("  Loading: {}", url);

        let tab = Arc::clone(&self.tab);
        let timing = self.timing;
        let url = url.to_string();

        tokio::task::spawn_blocking(move || load_page(&tab, &url, &timing))
            .await
            .map_err(browser_err)?
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

impl Drop for BrowserPageSource {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close failed: {}", e);
        }
        info!("🔒 Browser closed");
    }
}

use crate::config::{AreaConfig, DelayRange, Politeness};
use crate::models::{AreaStats, Listing, ScrapeReport, StopReason};
use crate::scrapers::extract::extract_page;
use crate::scrapers::traits::{page_url, PageSource};
use async_trait::async_trait;
use reqwest::Url;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A politeness pause and where in the run it happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    BetweenPages { after_page: u32 },
    LongBreak { after_page: u32 },
    BetweenAreas { after_area: usize },
}

impl fmt::Display for Pause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pause::BetweenPages { .. } => write!(f, "  Waiting"),
            Pause::LongBreak { .. } => write!(f, "  ⏸️  Longer break:"),
            Pause::BetweenAreas { .. } => write!(f, "⏸️  BREAK before next area:"),
        }
    }
}

/// Where the pipeline's sleeps go
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, pause: Pause, duration: Duration);
}

/// Real sleeps on the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, _pause: Pause, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Walks every area page by page through one page source
pub struct Pipeline<'a> {
    source: &'a dyn PageSource,
    origin: Url,
    politeness: Politeness,
    sleeper: Arc<dyn Sleeper>,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn PageSource, origin: Url, politeness: Politeness) -> Self {
        Self {
            source,
            origin,
            politeness,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    async fn pause(&self, range: DelayRange, pause: Pause) {
        let delay = range.sample();
        if delay.is_zero() {
            return;
        }
        info!("{} {:.1}s...", pause, delay.as_secs_f64());
        self.sleeper.sleep(pause, delay).await;
    }

    /// Scrape one area until the page cap, an empty page or a failed fetch
    pub async fn scrape_area(&self, area: &AreaConfig) -> (Vec<Listing>, AreaStats) {
        info!("{}", "=".repeat(70));
        info!("📍 SCRAPING AREA: {}", area.display_name().to_uppercase());
        info!("   Target: {} pages", area.pages);
        info!("{}", "=".repeat(70));

        let mut listings = Vec::new();
        let mut pages_fetched = 0;
        let mut stop = StopReason::PageCap;

        for page in 1..=area.pages {
            let url = page_url(&area.url, page);

            let html = match self.source.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("  Page {} of {} failed: {}. Stopping for this area.", page, area.name, e);
                    stop = StopReason::FetchFailed {
                        page,
                        error: e.to_string(),
                    };
                    break;
                }
            };
            pages_fetched += 1;

            let extracted = extract_page(&html, &self.origin);
            info!("  Found {} listings", extracted.found);
            if extracted.dropped > 0 {
                info!("  Skipped {} listings without a url", extracted.dropped);
            }

            if extracted.listings.is_empty() {
                info!("  No listings found on page {}. Stopping for this area.", page);
                stop = StopReason::EmptyPage(page);
                break;
            }

            listings.extend(extracted.listings);
            info!("  Total from {}: {} listings", area.name, listings.len());

            if page == area.pages {
                break;
            }

            self.pause(
                self.politeness.between_pages,
                Pause::BetweenPages { after_page: page },
            )
            .await;

            let every = self.politeness.long_break_every;
            if every > 0 && page % every == 0 {
                self.pause(self.politeness.long_break, Pause::LongBreak { after_page: page })
                    .await;
            }
        }

        info!("✅ Finished {}: {} listings ({})", area.name, listings.len(), stop);

        let stats = AreaStats {
            name: area.name.clone(),
            pages_fetched,
            listings: listings.len(),
            stop,
        };
        (listings, stats)
    }

    /// Scrape all areas in order, resting between them
    pub async fn run(&self, areas: &[AreaConfig]) -> ScrapeReport {
        let mut report = ScrapeReport::default();

        for (idx, area) in areas.iter().enumerate() {
            info!("🔄 Starting {} via {}...", area.name, self.source.name());

            let (listings, stats) = self.scrape_area(area).await;
            report.listings.extend(listings);
            report.areas.push(stats);

            if idx + 1 < areas.len() {
                self.pause(
                    self.politeness.between_areas,
                    Pause::BetweenAreas { after_area: idx },
                )
                .await;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::traits::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages and records every requested url
    struct FakeSource {
        pages: HashMap<String, Result<String, FetchError>>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn with_page(mut self, url: &str, ids: &[u32]) -> Self {
            self.pages.insert(url.to_string(), Ok(tiles(ids)));
            self
        }

        fn with_error(mut self, url: &str, error: FetchError) -> Self {
            self.pages.insert(url.to_string(), Err(error));
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn tiles(ids: &[u32]) -> String {
        let body: String = ids
            .iter()
            .map(|id| {
                format!(
                    r#"<article class="ordered-element">
                        <h3 class="tile__title">Apartment, {}m²</h3>
                        <a class="tile__link" href="/en/property/{}"></a>
                    </article>"#,
                    50 + id,
                    id
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", body)
    }

    fn area(name: &str, pages: u32) -> AreaConfig {
        AreaConfig {
            name: name.to_string(),
            url: format!("https://www.spitogatos.gr/en/for_sale-homes/{}", name),
            pages,
        }
    }

    fn pipeline(source: &FakeSource) -> Pipeline<'_> {
        Pipeline::new(
            source,
            Url::parse("https://www.spitogatos.gr").unwrap(),
            Politeness::none(),
        )
    }

    const BASE: &str = "https://www.spitogatos.gr/en/for_sale-homes/athens-center";

    /// Records pauses instead of sleeping
    #[derive(Default)]
    struct RecordingSleeper {
        pauses: Mutex<Vec<(Pause, Duration)>>,
    }

    impl RecordingSleeper {
        fn pauses(&self) -> Vec<Pause> {
            self.pauses.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, pause: Pause, duration: Duration) {
            self.pauses.lock().unwrap().push((pause, duration));
        }
    }

    fn fixed_politeness() -> Politeness {
        Politeness {
            between_pages: DelayRange::new(1.0, 1.0),
            long_break_every: 10,
            long_break: DelayRange::new(2.0, 2.0),
            between_areas: DelayRange::new(3.0, 3.0),
        }
    }

    fn recorded(source: &FakeSource) -> (Pipeline<'_>, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = Pipeline::new(
            source,
            Url::parse("https://www.spitogatos.gr").unwrap(),
            fixed_politeness(),
        )
        .with_sleeper(sleeper.clone());
        (pipeline, sleeper)
    }

    fn full_area(pages: u32) -> FakeSource {
        (1..=pages).fold(FakeSource::new(), |source, page| {
            source.with_page(&page_url(BASE, page), &[page])
        })
    }

    #[tokio::test]
    async fn test_long_break_after_every_tenth_page() {
        let source = full_area(12);
        let (pipeline, sleeper) = recorded(&source);

        pipeline.scrape_area(&area("athens-center", 12)).await;

        let mut expected: Vec<Pause> = (1..=11)
            .map(|page| Pause::BetweenPages { after_page: page })
            .collect();
        expected.insert(10, Pause::LongBreak { after_page: 10 });
        assert_eq!(sleeper.pauses(), expected);

        let durations: Vec<Duration> = sleeper
            .pauses
            .lock()
            .unwrap()
            .iter()
            .map(|(_, d)| *d)
            .collect();
        assert_eq!(durations[9], Duration::from_secs(1));
        assert_eq!(durations[10], Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_no_pause_after_page_that_hits_cap() {
        let source = full_area(10);
        let (pipeline, sleeper) = recorded(&source);

        pipeline.scrape_area(&area("athens-center", 10)).await;

        let expected: Vec<Pause> = (1..=9)
            .map(|page| Pause::BetweenPages { after_page: page })
            .collect();
        assert_eq!(sleeper.pauses(), expected);
    }

    #[tokio::test]
    async fn test_no_pause_after_empty_page() {
        let source = FakeSource::new()
            .with_page(BASE, &[1])
            .with_page(&page_url(BASE, 2), &[]);
        let (pipeline, sleeper) = recorded(&source);

        pipeline.scrape_area(&area("athens-center", 5)).await;

        assert_eq!(sleeper.pauses(), vec![Pause::BetweenPages { after_page: 1 }]);
    }

    #[tokio::test]
    async fn test_area_break_between_areas_but_not_after_last() {
        let north = "https://www.spitogatos.gr/en/for_sale-homes/athens-north";
        let source = FakeSource::new()
            .with_page(BASE, &[1])
            .with_page(north, &[2]);
        let (pipeline, sleeper) = recorded(&source);

        // athens-south is never served and fails on its first page
        pipeline
            .run(&[
                area("athens-center", 1),
                area("athens-south", 1),
                area("athens-north", 1),
            ])
            .await;

        assert_eq!(
            sleeper.pauses(),
            vec![
                Pause::BetweenAreas { after_area: 0 },
                Pause::BetweenAreas { after_area: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_single_area_run_never_takes_area_break() {
        let source = FakeSource::new().with_page(BASE, &[1]);
        let (pipeline, sleeper) = recorded(&source);

        pipeline.run(&[area("athens-center", 1)]).await;

        assert!(sleeper.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_first_empty_page() {
        let source = FakeSource::new()
            .with_page(BASE, &[1, 2])
            .with_page(&format!("{}/page_2", BASE), &[3])
            .with_page(&format!("{}/page_3", BASE), &[])
            .with_page(&format!("{}/page_4", BASE), &[4]);

        let (listings, stats) = pipeline(&source)
            .scrape_area(&area("athens-center", 10))
            .await;

        assert_eq!(listings.len(), 3);
        assert_eq!(stats.stop, StopReason::EmptyPage(3));
        assert_eq!(stats.pages_fetched, 3);
        assert_eq!(source.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_never_requests_beyond_page_cap() {
        let source = FakeSource::new()
            .with_page(BASE, &[1])
            .with_page(&format!("{}/page_2", BASE), &[2])
            .with_page(&format!("{}/page_3", BASE), &[3]);

        let (listings, stats) = pipeline(&source)
            .scrape_area(&area("athens-center", 2))
            .await;

        assert_eq!(listings.len(), 2);
        assert_eq!(stats.stop, StopReason::PageCap);
        assert_eq!(
            source.requested(),
            vec![BASE.to_string(), format!("{}/page_2", BASE)]
        );
    }

    #[tokio::test]
    async fn test_zero_page_cap_requests_nothing() {
        let source = FakeSource::new().with_page(BASE, &[1]);

        let (listings, stats) = pipeline(&source)
            .scrape_area(&area("athens-center", 0))
            .await;

        assert!(listings.is_empty());
        assert_eq!(stats.pages_fetched, 0);
        assert!(source.requested().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_ends_area_without_retry() {
        let source = FakeSource::new()
            .with_page(BASE, &[1, 2])
            .with_error(&format!("{}/page_2", BASE), FetchError::Timeout);

        let (listings, stats) = pipeline(&source)
            .scrape_area(&area("athens-center", 5))
            .await;

        assert_eq!(listings.len(), 2);
        assert_eq!(
            stats.stop,
            StopReason::FetchFailed {
                page: 2,
                error: "request timed out".to_string()
            }
        );
        assert_eq!(source.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_page_with_only_urlless_tiles_counts_as_empty() {
        let html = r#"<html><body><article class="ordered-element">
            <h3 class="tile__title">Apartment, 70m²</h3></article></body></html>"#;
        let mut source = FakeSource::new();
        source.pages.insert(BASE.to_string(), Ok(html.to_string()));

        let (listings, stats) = pipeline(&source)
            .scrape_area(&area("athens-center", 3))
            .await;

        assert!(listings.is_empty());
        assert_eq!(stats.stop, StopReason::EmptyPage(1));
    }

    #[tokio::test]
    async fn test_run_accumulates_areas_in_order_and_keeps_duplicates() {
        let north = "https://www.spitogatos.gr/en/for_sale-homes/athens-north";
        let source = FakeSource::new()
            .with_page(BASE, &[1, 2])
            .with_page(north, &[2, 3]);

        let report = pipeline(&source)
            .run(&[area("athens-center", 1), area("athens-north", 1)])
            .await;

        let urls: Vec<&str> = report
            .listings
            .iter()
            .filter_map(|l| l.url.as_deref())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://www.spitogatos.gr/en/property/1",
                "https://www.spitogatos.gr/en/property/2",
                "https://www.spitogatos.gr/en/property/2",
                "https://www.spitogatos.gr/en/property/3",
            ]
        );
        assert_eq!(report.areas.len(), 2);
        assert_eq!(report.areas[1].name, "athens-north");
        assert_eq!(report.areas[1].listings, 2);
    }

    #[tokio::test]
    async fn test_failed_area_does_not_stop_following_areas() {
        let north = "https://www.spitogatos.gr/en/for_sale-homes/athens-north";
        let source = FakeSource::new().with_page(north, &[7]);

        let report = pipeline(&source)
            .run(&[area("athens-center", 3), area("athens-north", 1)])
            .await;

        assert_eq!(report.listings.len(), 1);
        assert_eq!(
            report.areas[0].stop,
            StopReason::FetchFailed {
                page: 1,
                error: "HTTP status 404".to_string()
            }
        );
        assert_eq!(report.areas[1].stop, StopReason::PageCap);
    }
}

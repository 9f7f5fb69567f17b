use async_trait::async_trait;
use thiserror::Error;

/// Page-level failure. Any of these ends pagination for the current area.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("browser error: {0}")]
    Browser(String),
    #[error("listings never appeared on the page")]
    NoListings,
}

/// Common trait for every way of getting a listing page's HTML
/// (plain HTTP, a driven browser, or a fake in tests)
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one listing page and return its HTML
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Get the name of the page source
    fn name(&self) -> &'static str;
}

/// URL of page `page` of an area feed: the base itself for page 1,
/// `{base}/page_{n}` after that
pub fn page_url(base: &str, page: u32) -> String {
    let base = base.trim_end_matches('/');
    if page <= 1 {
        base.to_string()
    } else {
        format!("{}/page_{}", base, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_first_page_is_base() {
        let base = "https://www.spitogatos.gr/en/for_sale-homes/athens-center";
        assert_eq!(page_url(base, 1), base);
        assert_eq!(page_url(base, 0), base);
    }

    #[test]
    fn test_page_url_later_pages() {
        assert_eq!(
            page_url("https://www.spitogatos.gr/en/for_sale-homes/athens-north/", 7),
            "https://www.spitogatos.gr/en/for_sale-homes/athens-north/page_7"
        );
    }
}

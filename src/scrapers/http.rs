use crate::scrapers::traits::{FetchError, PageSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::{debug, info};

/// Fetches listing pages with plain GET requests
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self> {
        let client = create_http_client(user_agent, timeout_secs)?;
        Ok(Self { client })
    }
}

/// Client with headers copied from a desktop browser
pub fn create_http_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("en-US,en;q=0.9,el;q=0.8"),
    );
    headers.insert(header::DNT, header::HeaderValue::from_static("1"));
    headers.insert(
        "Upgrade-Insecure-Requests",
        header::HeaderValue::from_static("1"),
    );
    headers.insert("Sec-Fetch-Dest", header::HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", header::HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", header::HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", header::HeaderValue::from_static("?1"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to create HTTP client")
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = err.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Network(err.to_string())
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        info!("  Loading: {}", url);

        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let html = response.text().await.map_err(classify)?;
        debug!("Downloaded {} bytes of HTML", html.len());

        Ok(html)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

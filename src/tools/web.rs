//! Web search and page crawling using daedra
//!
//! daedra searches DuckDuckGo and fetches pages as Markdown. Both are exposed
//! through the research capability traits so the agent loop can swap them out.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::research::capabilities::{Crawler, WebSearch};
use crate::types::{AppError, Result, SearchHit};
use crate::utils::toml_config::CrawlerConfig;

/// Web search powered by daedra
#[derive(Debug, Clone, Default)]
pub struct DaedraSearch;

impl DaedraSearch {
    /// Search with daedra defaults
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WebSearch for DaedraSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        let args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: count,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&args)
            .await
            .map_err(|e| AppError::Search(format!("Search for '{}' failed: {}", query, e)))?;

        Ok(response
            .data
            .iter()
            .take(count)
            .map(|r| SearchHit {
                title: r.title.clone(),
                url: r.url.clone(),
                snippet: r.description.clone(),
                published_at: None,
            })
            .collect())
    }
}

/// Page crawler powered by daedra, retrying transient failures
#[derive(Debug, Clone)]
pub struct DaedraCrawler {
    max_retries: u32,
    backoff: Duration,
}

impl DaedraCrawler {
    /// Crawler retrying as configured in `[crawler]`
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    async fn fetch(url: &str) -> Result<String> {
        let args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector: None,
        };

        let page = daedra::tools::fetch::fetch_page(&args)
            .await
            .map_err(|e| AppError::Crawl(format!("Failed to fetch {}: {}", url, e)))?;

        if page.content.trim().is_empty() {
            return Err(AppError::Crawl(format!("No content at {}", url)));
        }
        Ok(page.content)
    }
}

impl Default for DaedraCrawler {
    fn default() -> Self {
        Self::new(CrawlerConfig::default())
    }
}

#[async_trait]
impl Crawler for DaedraCrawler {
    async fn crawl(&self, url: &str) -> Result<String> {
        retry_with_backoff(self.max_retries, self.backoff, || Self::fetch(url)).await
    }
}

/// Run `op` up to `max_retries + 1` times, doubling the delay after each
/// failure. Returns the last error if every attempt fails.
pub async fn retry_with_backoff<T, F, Fut>(max_retries: u32, backoff: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = backoff;
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::debug!(attempt, max_retries, error = %e, "Retrying after failure");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

//! Web scraper module for my.taggrading.com
//!
//! Provides browser automation, HTML parsing, and page caching.

pub mod browser;
pub mod cache;
pub mod http;
pub mod parsers;
pub mod rate_limiter;

pub use browser::Browser;
pub use cache::PageCache;
pub use parsers::{CardParser, CardRecord};
pub use rate_limiter::RateLimiter;

use anyhow::Result;

use crate::config::{FetchMode, FetcherConfig};
use crate::retry::{retry, RetryConfig};

/// Base URL for card detail pages
pub const CARD_BASE_URL: &str = "https://my.taggrading.com";

/// Base URL for slab photography; images are keyed by cert number alone
pub const SLAB_IMAGE_BASE_URL: &str = "https://devblock-tag.s3.us-west-2.amazonaws.com/slab-images";

/// Build card detail page URL
pub fn card_url(cert_number: &str) -> String {
    format!("{}/card/{}", CARD_BASE_URL, cert_number)
}

/// Build front slab image URL
pub fn slab_image_url(cert_number: &str) -> String {
    format!("{}/{}_Slabbed_FRONT.jpg", SLAB_IMAGE_BASE_URL, cert_number)
}

/// Fetch the markup of a card page: cache first, then the configured
/// transport behind the shared rate limiter, with retries.
///
/// The page is client-rendered, so the browser transport is the default;
/// [`FetchMode::Http`] skips rendering and will leave every scraped field
/// empty, which is the documented trade-off of that mode.
pub async fn fetch_card_page(
    fetcher: &FetcherConfig,
    cache: &PageCache,
    limiter: &RateLimiter,
    cert_number: &str,
) -> Result<String> {
    if let Some(html) = cache.get(cert_number) {
        tracing::debug!(cert_number, "card page served from cache");
        return Ok(html);
    }

    limiter.acquire().await;

    let url = card_url(cert_number);
    tracing::info!(%url, "fetching card page");

    let html = retry(&RetryConfig::fetch(), "fetch card page", || async {
        match fetcher.mode {
            FetchMode::Browser => {
                let browser = Browser::launch(fetcher).await?;
                let result = browser.fetch_page(&url).await;
                browser.close().await?;
                result
            }
            FetchMode::Http => http::fetch_page(fetcher, &url).await,
        }
    })
    .await?;

    if let Err(e) = cache.set(cert_number, &html) {
        tracing::warn!(cert_number, "failed to cache card page: {}", e);
    }

    Ok(html)
}

/// Fetch a card page and extract its record in one step.
///
/// The error is always a fetch failure; extraction itself cannot fail and
/// degrades to empty fields instead.
pub async fn scrape_card(
    fetcher: &FetcherConfig,
    cache: &PageCache,
    limiter: &RateLimiter,
    cert_number: &str,
) -> Result<CardRecord> {
    let html = fetch_card_page(fetcher, cache, limiter, cert_number).await?;
    let record = CardParser::parse(&html, cert_number);
    tracing::info!(
        cert_number,
        player = %record.player_name,
        grade = %record.grade_label,
        "card extracted"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_url() {
        assert_eq!(card_url("V1044190"), "https://my.taggrading.com/card/V1044190");
    }

    #[test]
    fn test_slab_image_url() {
        assert_eq!(
            slab_image_url("V1044190"),
            "https://devblock-tag.s3.us-west-2.amazonaws.com/slab-images/V1044190_Slabbed_FRONT.jpg"
        );
    }
}

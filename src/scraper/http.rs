//! Plain HTTP page fetch.
//!
//! No JavaScript runs, so card pages fetched this way parse to all-empty
//! fields. Useful against saved snapshots and in environments without
//! Chrome; the extractor does not care which transport produced the markup.

use anyhow::Result;
use std::time::Duration;

use crate::config::FetcherConfig;

/// Requests a page and returns the response body.
pub async fn fetch_page(config: &FetcherConfig, url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.page_timeout_secs))
        .build()?;

    let res = client.get(url).send().await?.error_for_status()?;
    let html = res.text().await?;
    Ok(html)
}

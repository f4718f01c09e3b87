//! Browser automation using chromiumoxide.
//!
//! The card pages are rendered client-side, so a plain GET returns an empty
//! shell; fetching goes through headless Chrome, either a locally launched
//! binary or a remote DevTools endpoint (a hosted browser pool).

use anyhow::Result;
use chromiumoxide::browser::{Browser as ChromeBrowser, BrowserConfig};
use futures::StreamExt;

use crate::config::FetcherConfig;

/// Browser wrapper for web scraping
pub struct Browser {
    browser: ChromeBrowser,
    handle: tokio::task::JoinHandle<()>,
    render_wait_ms: u64,
}

impl Browser {
    /// Launch a local headless browser, or connect to the configured remote
    /// DevTools websocket endpoint when one is set.
    pub async fn launch(config: &FetcherConfig) -> Result<Self> {
        let (browser, mut handler) = match &config.remote_ws_url {
            Some(ws_url) => {
                tracing::debug!(%ws_url, "connecting to remote browser");
                ChromeBrowser::connect(ws_url.clone())
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to connect to remote browser: {}", e))?
            }
            None => {
                let chrome_path = config
                    .chrome_path
                    .clone()
                    .unwrap_or_else(|| default_chrome_path().to_string());

                let browser_config = BrowserConfig::builder()
                    .chrome_executable(chrome_path)
                    .no_sandbox()
                    .arg("--headless=new")
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .arg("--no-first-run")
                    .arg("--no-default-browser-check")
                    .arg("--disable-extensions")
                    .arg("--disable-background-networking")
                    .arg("--disable-sync")
                    .arg("--mute-audio")
                    .window_size(1920, 1080)
                    .build()
                    .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

                ChromeBrowser::launch(browser_config)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to launch browser: {}", e))?
            }
        };

        // Spawn handler task - must keep running for browser to work
        let handle = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => continue, // Don't break on errors
                    None => break,
                }
            }
        });

        Ok(Self {
            browser,
            handle,
            render_wait_ms: config.render_wait_ms,
        })
    }

    /// Fetch page content with JavaScript rendering
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create new page: {}", e))?;

        // The page swaps in its data after load; give the scripts time to run
        tokio::time::sleep(tokio::time::Duration::from_millis(self.render_wait_ms)).await;

        let html = page
            .content()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get page content: {}", e))?;

        let _ = page.close().await;

        Ok(html)
    }

    /// Close the browser
    pub async fn close(mut self) -> Result<()> {
        let _ = self.browser.close().await;
        self.handle.abort();
        Ok(())
    }
}

fn default_chrome_path() -> &'static str {
    if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
    } else if cfg!(target_os = "windows") {
        "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe"
    } else {
        "google-chrome"
    }
}

//! BrowserManager — CDP browser lifecycle and tab bookkeeping.
//!
//! The browser is started lazily on the first request that needs a tab.
//! Tools that only operate on an existing tab go through
//! `current_tab_or_die()`, which never launches anything.

use crate::page::{CdpPage, PageEvaluator};
use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::Handler;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const NO_CURRENT_TAB: &str =
    "No current snapshot available. Capture a snapshot or navigate to a new location first.";

/// Configuration for the BrowserManager.
#[derive(Debug, Clone)]
pub struct BrowserManagerConfig {
    /// Custom Chrome/Edge binary path.
    pub browser_path: Option<String>,
    /// Connect to an already-running browser via CDP URL.
    pub cdp_url: Option<String>,
    /// Run headless (default: true).
    pub headless: bool,
    /// Browser window size.
    pub window_size: (u32, u32),
}

impl Default for BrowserManagerConfig {
    fn default() -> Self {
        Self {
            browser_path: None,
            cdp_url: None,
            headless: true,
            window_size: (1280, 720),
        }
    }
}

/// A browser tab the tools act on.
#[derive(Debug, Clone)]
pub struct Tab {
    page: Page,
}

impl Tab {
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Script evaluator bound to this tab.
    pub fn evaluator(&self) -> Arc<dyn PageEvaluator> {
        Arc::new(CdpPage::new(self.page.clone()))
    }
}

/// Summary of one open tab.
#[derive(Debug, Clone, Serialize)]
pub struct TabInfo {
    pub index: usize,
    pub url: String,
    pub title: String,
    pub current: bool,
}

#[derive(Default)]
struct Tabs {
    pages: Vec<Page>,
    current: Option<usize>,
}

/// Central browser lifecycle manager.
pub struct BrowserManager {
    browser: RwLock<Option<Browser>>,
    tabs: Mutex<Tabs>,
    config: BrowserManagerConfig,
}

impl BrowserManager {
    pub fn new(config: BrowserManagerConfig) -> Self {
        Self {
            browser: RwLock::new(None),
            tabs: Mutex::new(Tabs::default()),
            config,
        }
    }

    /// Ensure a browser is running, launching one if needed.
    pub async fn ensure_browser(&self) -> Result<()> {
        {
            let guard = self.browser.read().await;
            if guard.is_some() {
                return Ok(());
            }
        }

        let mut browser_guard = self.browser.write().await;
        // Double-check after acquiring write lock
        if browser_guard.is_some() {
            return Ok(());
        }

        let browser = if let Some(ref cdp_url) = self.config.cdp_url {
            let (browser, handler) = Browser::connect(cdp_url)
                .await
                .with_context(|| format!("Failed to connect to browser at {}", cdp_url))?;
            spawn_handler(handler);
            tracing::info!(cdp_url = %cdp_url, "Connected to running browser");
            browser
        } else {
            let mut builder = BrowserConfig::builder();

            if let Some(ref path) = self.config.browser_path {
                builder = builder.chrome_executable(path);
            }

            if !self.config.headless {
                builder = builder.with_head();
            }

            builder = builder
                .window_size(self.config.window_size.0, self.config.window_size.1)
                .arg("--disable-dev-shm-usage")
                .arg("--remote-allow-origins=*");

            let config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;

            let (browser, handler) = Browser::launch(config)
                .await
                .context("Failed to launch browser")?;
            spawn_handler(handler);
            tracing::info!(headless = self.config.headless, "Launched browser");
            browser
        };

        *browser_guard = Some(browser);
        Ok(())
    }

    /// The current tab, or an error when no tab has been opened yet.
    pub async fn current_tab_or_die(&self) -> Result<Tab> {
        let tabs = self.tabs.lock().await;
        tabs.current
            .and_then(|idx| tabs.pages.get(idx))
            .map(|page| Tab { page: page.clone() })
            .context(NO_CURRENT_TAB)
    }

    /// The current tab, opening `about:blank` if there is none.
    pub async fn ensure_tab(&self) -> Result<Tab> {
        if let Ok(tab) = self.current_tab_or_die().await {
            return Ok(tab);
        }
        self.new_tab("about:blank").await
    }

    /// Open a new tab at `url` and make it current.
    pub async fn new_tab(&self, url: &str) -> Result<Tab> {
        self.ensure_browser().await?;

        let page = {
            let browser_guard = self.browser.read().await;
            let browser = browser_guard.as_ref().context("Browser not initialized")?;
            browser
                .new_page(url)
                .await
                .with_context(|| format!("Failed to open new tab at {}", url))?
        };

        let mut tabs = self.tabs.lock().await;
        tabs.pages.push(page.clone());
        let index = tabs.pages.len() - 1;
        tabs.current = Some(index);
        tracing::debug!(index, url, "Opened tab");

        Ok(Tab { page })
    }

    /// Make the tab at `index` current.
    pub async fn select_tab(&self, index: usize) -> Result<Tab> {
        let page = {
            let mut tabs = self.tabs.lock().await;
            let count = tabs.pages.len();
            let page = tabs
                .pages
                .get(index)
                .cloned()
                .with_context(|| format!("Tab index {} out of range ({} open)", index, count))?;
            tabs.current = Some(index);
            page
        };

        // Tab list lock is released before the CDP round trip.
        if let Err(e) = page.bring_to_front().await {
            tracing::warn!(index, error = %e, "Failed to bring tab to front");
        }

        Ok(Tab { page })
    }

    /// Describe all open tabs.
    pub async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let (pages, current) = {
            let tabs = self.tabs.lock().await;
            (tabs.pages.clone(), tabs.current)
        };

        let mut infos = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let url = page
                .url()
                .await
                .with_context(|| format!("Failed to get URL of tab {}", index))?
                .unwrap_or_default();
            let title = page
                .get_title()
                .await
                .with_context(|| format!("Failed to get title of tab {}", index))?
                .unwrap_or_default();
            infos.push(TabInfo {
                index,
                url,
                title,
                current: current == Some(index),
            });
        }
        Ok(infos)
    }

    /// Close the browser and forget all tabs.
    pub async fn shutdown(&self) {
        {
            let mut tabs = self.tabs.lock().await;
            *tabs = Tabs::default();
        }

        let mut guard = self.browser.write().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "Failed to close browser cleanly");
            }
            let _ = browser.wait().await;
            tracing::info!("Browser shut down");
        }
    }
}

fn spawn_handler(mut handler: Handler) {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });
}

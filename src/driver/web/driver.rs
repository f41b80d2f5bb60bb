//! Browser driver implementation using Playwright
//!
//! Every recording session gets its own browser process so that closing one
//! window never affects another recording.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::driver::traits::{BrowserDriver, BrowserHandle};

/// Web browser type
#[derive(Debug, Clone, Copy, Default)]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Explicit browser executable (Chromium only)
    pub executable: Option<PathBuf>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        let headless = std::env::var("LUMI_HEADLESS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            browser_type: BrowserType::Chromium,
            headless,
            viewport_width: 1280,
            viewport_height: 900,
            executable: None,
        }
    }
}

/// One opened browser. Fields are kept alive for as long as the session runs;
/// dropping the last reference closes the window.
struct BrowserInstance {
    browser: Browser,
    context: BrowserContext,
    page: Page,
}

/// Browser driver using Playwright
pub struct PlaywrightDriver {
    playwright: Playwright,
    config: WebDriverConfig,
    browsers: Mutex<HashMap<BrowserHandle, BrowserInstance>>,
}

impl PlaywrightDriver {
    /// Initialize Playwright. Browsers are launched lazily, one per [`BrowserDriver::open`].
    pub async fn new(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        Ok(Self {
            playwright,
            config,
            browsers: Mutex::new(HashMap::new()),
        })
    }

    async fn launch(&self) -> Result<Browser> {
        let browser = match self.config.browser_type {
            BrowserType::Chromium => {
                let chromium = self.playwright.chromium();
                let args = chromium_args();
                let executable = self.config.executable.clone().or_else(find_chromium);

                let mut launcher = chromium.launcher().headless(self.config.headless);
                if let Some(ref path) = executable {
                    info!("Using browser executable: {}", path.display());
                    launcher = launcher.executable(path);
                }
                launcher = launcher.args(&args);
                launcher.launch().await?
            }
            BrowserType::Firefox => {
                self.playwright
                    .firefox()
                    .launcher()
                    .headless(self.config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                self.playwright
                    .webkit()
                    .launcher()
                    .headless(self.config.headless)
                    .launch()
                    .await?
            }
        };
        Ok(browser)
    }

    async fn page(&self, handle: &BrowserHandle) -> Result<Page> {
        let browsers = self.browsers.lock().await;
        browsers
            .get(handle)
            .map(|b| b.page.clone())
            .ok_or_else(|| anyhow::anyhow!("Unknown browser handle: {}", handle))
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn open(&self) -> Result<BrowserHandle> {
        let browser = self.launch().await.context("Failed to launch browser")?;
        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;

        page.set_viewport_size(Viewport {
            width: self.config.viewport_width as i32,
            height: self.config.viewport_height as i32,
        })
        .await?;
        page.goto_builder("about:blank").goto().await?;

        let handle = BrowserHandle::new(uuid::Uuid::new_v4().to_string());
        debug!("Opened browser {}", handle);

        self.browsers.lock().await.insert(
            handle.clone(),
            BrowserInstance {
                browser,
                context,
                page,
            },
        );
        Ok(handle)
    }

    async fn close(&self, handle: &BrowserHandle) -> Result<()> {
        let instance = self.browsers.lock().await.remove(handle);
        if let Some(instance) = instance {
            if let Err(e) = instance.context.close().await {
                debug!("Browser context {} already gone: {}", handle, e);
            }
            instance.browser.close().await?;
            debug!("Closed browser {}", handle);
        }
        Ok(())
    }

    async fn current_url(&self, handle: &BrowserHandle) -> Result<String> {
        let page = self.page(handle).await?;
        Ok(page.url()?)
    }

    async fn execute_script(
        &self,
        handle: &BrowserHandle,
        source: &str,
    ) -> Result<serde_json::Value> {
        let page = self.page(handle).await?;
        // Wrap as a function so the body can `return` like a WebDriver script
        let js = format!("() => {{\n{}\n}}", source);
        let value: serde_json::Value = page.evaluate(&js, ()).await?;
        Ok(value)
    }

    async fn is_closed(&self, handle: &BrowserHandle) -> Result<bool> {
        let browsers = self.browsers.lock().await;
        let Some(instance) = browsers.get(handle) else {
            return Ok(true);
        };
        // The user closing the last window leaves the context without pages
        let pages = instance.context.pages()?;
        Ok(pages.is_empty())
    }
}

/// Chromium flags needed for the capture script to post events to the recorder API
/// from pages served over HTTPS.
fn chromium_args() -> Vec<String> {
    [
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-infobars",
        "--disable-blink-features=AutomationControlled",
        "--allow-running-insecure-content",
        "--disable-web-security",
        "--ignore-certificate-errors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn find_chromium() -> Option<PathBuf> {
    if let Some(path) = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(PathBuf::from)
    {
        return Some(path);
    }

    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];
    let found = common_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists());
    if found.is_none() {
        warn!("No system Chromium found, relying on the Playwright bundled browser");
    }
    found
}

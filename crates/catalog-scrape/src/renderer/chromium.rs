//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer};
use crate::error::{FetchError, FetchResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Environment variable overriding Chromium discovery.
pub const ENV_CHROMIUM_PATH: &str = "CATALOG_CHROMIUM_PATH";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(ENV_CHROMIUM_PATH) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser", "google-chrome-stable"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
///
/// `shutdown` closes the browser process and stops the CDP handler task.
/// It is idempotent; later calls are no-ops.
pub struct ChromiumRenderer {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch() -> FetchResult<Self> {
        let chrome_path = find_chromium().ok_or_else(|| {
            FetchError::browser(format!(
                "Chromium not found; install Chrome or set {ENV_CHROMIUM_PATH}"
            ))
        })?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| FetchError::browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::browser(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {e}");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> FetchResult<Box<dyn RenderContext>> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| FetchError::browser("browser already shut down"))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::browser(format!("failed to create page: {e}")))?;

        Ok(Box::new(ChromiumContext { page }))
    }

    async fn shutdown(&self) -> FetchResult<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = browser
            .close()
            .await
            .map_err(|e| FetchError::browser(format!("failed to close browser: {e}")));
        let waited = browser.wait().await;

        if let Some(task) = self.handler.lock().await.take() {
            task.abort();
            let _ = task.await;
        }

        closed?;
        waited?;
        debug!("browser closed");
        Ok(())
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> FetchResult<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(FetchError::browser(format!("navigation failed: {e}"))),
            Err(_) => Err(FetchError::Timeout(timeout_ms)),
        }
    }

    async fn execute_js(&self, script: &str) -> FetchResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| FetchError::browser(format!("JS execution failed: {e}")))?;

        result
            .into_value()
            .map_err(|e| FetchError::browser(format!("failed to convert JS result: {e:?}")))
    }

    async fn close(self: Box<Self>) -> FetchResult<()> {
        if let Err(e) = self.page.close().await {
            warn!("closing page failed: {e}");
        }
        Ok(())
    }
}

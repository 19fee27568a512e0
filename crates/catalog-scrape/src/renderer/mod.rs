//! Renderer abstraction for browser-based page rendering.
//!
//! `Renderer` and `RenderContext` abstract over the browser engine
//! (Chromium via chromiumoxide). `PageInspector` is the narrower capability
//! the reconciler consumes; `BrowserInspector` implements it on top of a
//! render context.

pub mod chromium;
pub mod inspector;

pub use inspector::{BrowserInspector, PageInspector};

use crate::error::FetchResult;
use async_trait::async_trait;

/// Result of navigating to a URL.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> FetchResult<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> FetchResult<()>;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> FetchResult<NavigationResult>;
    /// Evaluate a JavaScript expression in the page and return its value.
    async fn execute_js(&self, script: &str) -> FetchResult<serde_json::Value>;
    /// Close this context.
    async fn close(self: Box<Self>) -> FetchResult<()>;
}

/// A renderer used when Chromium is unavailable.
///
/// Every context request fails, so page scraping degrades to empty data
/// while the HTTP-side steps keep working.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> FetchResult<Box<dyn RenderContext>> {
        Err(crate::error::FetchError::browser(
            "browser not available, HTTP-only mode",
        ))
    }
    async fn shutdown(&self) -> FetchResult<()> {
        Ok(())
    }
}

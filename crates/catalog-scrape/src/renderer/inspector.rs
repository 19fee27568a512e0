//! DOM inspection capability used by page scraping.
//!
//! `PageInspector` is what the reconciler needs from a live page: navigate,
//! read the title and images, click a tab by its label and read a section's
//! text. `BrowserInspector` implements it with small scripts evaluated in a
//! `RenderContext`; tests implement it with fixtures.

use super::{RenderContext, Renderer};
use crate::error::{FetchError, FetchResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Read-and-click access to one live object page.
#[async_trait]
pub trait PageInspector: Send + Sync {
    /// Load `url`, replacing the current page.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> FetchResult<()>;
    /// Main heading of the page, or the document title.
    async fn title(&self) -> FetchResult<String>;
    /// Absolute image URLs on the page, in document order.
    async fn discovered_image_urls(&self) -> FetchResult<Vec<String>>;
    /// Click the first element whose visible text is exactly `label`.
    ///
    /// `Ok(false)` means no such element exists.
    async fn click_labeled_tab(&mut self, label: &str, timeout_ms: u64) -> FetchResult<bool>;
    /// Text of the container enclosing the first heading containing `heading`.
    ///
    /// Empty when no heading matches.
    async fn section_text(&self, heading: &str) -> FetchResult<String>;
    /// Release the page and the browser session behind it.
    async fn close(self: Box<Self>) -> FetchResult<()>;
}

const TITLE_JS: &str = r#"(() => {
  const main = document.querySelector('main') || document.body;
  const h1 = main ? main.querySelector('h1') : null;
  return h1 ? h1.textContent.trim() : (document.title || '');
})()"#;

const IMAGES_JS: &str = r#"(() => {
  const imgs = Array.from(document.querySelectorAll('main img, body img'));
  const urls = imgs.map(img => img.currentSrc || img.src || '').filter(u => u.startsWith('http'));
  return Array.from(new Set(urls));
})()"#;

const CLICK_TAB_FN: &str = r#"((label) => {
  const matches = Array.from(document.querySelectorAll('body *')).filter(el =>
    (el.textContent || '').trim() === label &&
    !Array.from(el.children).some(c => (c.textContent || '').trim() === label));
  if (!matches.length) return false;
  matches[0].click();
  return true;
})"#;

const SECTION_TEXT_FN: &str = r#"((needle) => {
  const headings = Array.from(document.querySelectorAll('h1, h2, h3'));
  const heading = headings.find(h => h.textContent.includes(needle));
  if (!heading) return '';
  const container = heading.closest('section, div') || heading.parentElement;
  return container ? container.innerText : '';
})"#;

/// Apply a script function to one string argument.
fn call_with_str(function: &str, arg: &str) -> String {
    let literal = Value::String(arg.to_string()).to_string();
    format!("{function}({literal})")
}

/// `PageInspector` backed by a browser tab.
///
/// Holds no tab when the browser could not provide one; every navigation
/// then fails and page data degrades to empty. Closing the inspector closes
/// the tab and shuts the renderer down.
pub struct BrowserInspector {
    renderer: Arc<dyn Renderer>,
    context: Option<Box<dyn RenderContext>>,
}

impl BrowserInspector {
    /// Open a tab on `renderer`, falling back to a detached inspector.
    pub async fn open(renderer: Arc<dyn Renderer>) -> Self {
        let context = match renderer.new_context().await {
            Ok(context) => Some(context),
            Err(e) => {
                warn!("no browser tab available ({e}); page data will be empty");
                None
            }
        };
        Self { renderer, context }
    }

    fn context(&self) -> FetchResult<&dyn RenderContext> {
        self.context
            .as_deref()
            .ok_or_else(|| FetchError::browser("browser not available"))
    }

    async fn eval(&self, script: &str) -> FetchResult<Value> {
        self.context()?.execute_js(script).await
    }
}

#[async_trait]
impl PageInspector for BrowserInspector {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> FetchResult<()> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| FetchError::browser("browser not available"))?;
        let nav = context.navigate(url, timeout_ms).await?;
        debug!("loaded {} in {}ms", nav.final_url, nav.load_time_ms);
        Ok(())
    }

    async fn title(&self) -> FetchResult<String> {
        let v = self.eval(TITLE_JS).await?;
        Ok(v.as_str().unwrap_or("").trim().to_string())
    }

    async fn discovered_image_urls(&self) -> FetchResult<Vec<String>> {
        let v = self.eval(IMAGES_JS).await?;
        Ok(v.as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|u| u.as_str())
                    .map(|u| u.to_string())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn click_labeled_tab(&mut self, label: &str, timeout_ms: u64) -> FetchResult<bool> {
        let script = call_with_str(CLICK_TAB_FN, label);
        let clicked = tokio::time::timeout(Duration::from_millis(timeout_ms), self.eval(&script))
            .await
            .map_err(|_| FetchError::Timeout(timeout_ms))??;
        Ok(clicked.as_bool().unwrap_or(false))
    }

    async fn section_text(&self, heading: &str) -> FetchResult<String> {
        let v = self.eval(&call_with_str(SECTION_TEXT_FN, heading)).await?;
        Ok(v.as_str().unwrap_or("").trim().to_string())
    }

    async fn close(self: Box<Self>) -> FetchResult<()> {
        if let Some(context) = self.context {
            if let Err(e) = context.close().await {
                warn!("closing tab failed: {e}");
            }
        }
        self.renderer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::chromium::ChromiumRenderer;
    use crate::renderer::{NavigationResult, NoopRenderer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counts {
        contexts_closed: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    struct CountingRenderer(Arc<Counts>);

    struct CountingContext(Arc<Counts>);

    #[async_trait]
    impl Renderer for CountingRenderer {
        async fn new_context(&self) -> FetchResult<Box<dyn RenderContext>> {
            Ok(Box::new(CountingContext(self.0.clone())))
        }
        async fn shutdown(&self) -> FetchResult<()> {
            self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl RenderContext for CountingContext {
        async fn navigate(
            &mut self,
            url: &str,
            _timeout_ms: u64,
        ) -> FetchResult<NavigationResult> {
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 0,
            })
        }
        async fn execute_js(&self, _script: &str) -> FetchResult<Value> {
            Ok(Value::String("Katana".into()))
        }
        async fn close(self: Box<Self>) -> FetchResult<()> {
            self.0.contexts_closed.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::browser("tab already gone"))
        }
    }

    #[test]
    fn test_call_with_str_escapes_label() {
        let script = call_with_str("((x) => x)", r#"Say "hi"\n"#);
        assert_eq!(script, r#"((x) => x)("Say \"hi\"\\n")"#);
    }

    #[tokio::test]
    async fn test_detached_inspector_fails_navigation() {
        let mut inspector = BrowserInspector::open(Arc::new(NoopRenderer)).await;
        let err = inspector
            .navigate("https://example.org", 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Browser(_)));
        assert!(inspector.title().await.is_err());
        Box::new(inspector).close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_shuts_down_renderer() {
        let counts = Arc::new(Counts::default());
        let renderer: Arc<dyn Renderer> = Arc::new(CountingRenderer(counts.clone()));
        let mut inspector = BrowserInspector::open(renderer).await;
        inspector.navigate("https://example.org", 1_000).await.unwrap();
        assert_eq!(inspector.title().await.unwrap(), "Katana");

        // A failing tab close still shuts the browser down.
        Box::new(inspector).close().await.unwrap();
        assert_eq!(counts.contexts_closed.load(Ordering::SeqCst), 1);
        assert_eq!(counts.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_click_tab_and_read_section() {
        let renderer = ChromiumRenderer::launch().await.expect("launch");
        let mut inspector = BrowserInspector::open(Arc::new(renderer)).await;
        let html = "data:text/html,<main><h1>Katana</h1>\
            <button onclick=\"document.getElementById('d').innerText='Signed'\">Provenance</button>\
            <section><h2>Artwork Details</h2><div id='d'>Overview text</div></section></main>";
        inspector.navigate(html, 10_000).await.expect("navigate");

        assert_eq!(inspector.title().await.unwrap(), "Katana");
        assert!(inspector.click_labeled_tab("Provenance", 5_000).await.unwrap());
        assert!(!inspector.click_labeled_tab("References", 5_000).await.unwrap());
        let text = inspector.section_text("Artwork Details").await.unwrap();
        assert!(text.contains("Signed"));
        Box::new(inspector).close().await.expect("close");
    }
}

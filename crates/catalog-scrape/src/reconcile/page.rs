//! Rendered-page scraping: title, images and the four text panels.

use crate::config::ScrapeConfig;
use crate::error::FetchResult;
use crate::model::{ObjectId, PageData};
use crate::renderer::PageInspector;
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

/// Scrape one object page through `inspector`.
///
/// Only a failed navigation is returned as an error; callers turn it into
/// `PageData::empty`. Title, image and tab failures are logged and leave
/// the corresponding field empty.
pub async fn scrape_page(
    inspector: &mut dyn PageInspector,
    config: &ScrapeConfig,
    object_id: ObjectId,
) -> FetchResult<PageData> {
    let url = config.endpoints.object_page_url(object_id);
    inspector
        .navigate(&url, config.timeouts.navigation_ms)
        .await?;
    settle(config.load_settle).await;

    let mut page = PageData::empty(url);

    page.title = inspector.title().await.unwrap_or_else(|e| {
        warn!(object_id, "page title unavailable: {e}");
        String::new()
    });
    page.image_urls = dedupe_preserving_order(inspector.discovered_image_urls().await.unwrap_or_else(
        |e| {
            warn!(object_id, "page images unavailable: {e}");
            Vec::new()
        },
    ));

    let noise = config.panel_noise();
    for tab in &config.tabs {
        match inspector
            .click_labeled_tab(&tab.label, config.timeouts.tab_click_ms)
            .await
        {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(object_id, "tab '{}' failed: {e}", tab.label);
                continue;
            }
        }
        settle(config.tab_settle).await;

        let raw = inspector
            .section_text(&config.section_heading)
            .await
            .unwrap_or_else(|e| {
                warn!(object_id, "section text for '{}' unavailable: {e}", tab.label);
                String::new()
            });
        page.panels.set(tab.panel, clean_panel_text(&raw, &noise));
    }

    page.panels.drop_cloned_tabs();
    Ok(page)
}

async fn settle(wait: Duration) {
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}

/// Trim every line and drop blanks and lines equal to any `noise` entry.
pub fn clean_panel_text(raw: &str, noise: &[&str]) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !noise.contains(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove repeated URLs, keeping the first occurrence of each.
pub fn dedupe_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// A page whose tabs swap the text under the details heading.
    #[derive(Default)]
    struct TabbedPage {
        title: String,
        images: Vec<String>,
        tabs: HashMap<String, String>,
        broken_tabs: Vec<String>,
        current: String,
        fail_navigation: bool,
        clicks: Vec<String>,
    }

    #[async_trait]
    impl PageInspector for TabbedPage {
        async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> FetchResult<()> {
            if self.fail_navigation {
                return Err(FetchError::Timeout(90_000));
            }
            Ok(())
        }
        async fn title(&self) -> FetchResult<String> {
            Ok(self.title.clone())
        }
        async fn discovered_image_urls(&self) -> FetchResult<Vec<String>> {
            Ok(self.images.clone())
        }
        async fn click_labeled_tab(&mut self, label: &str, timeout_ms: u64) -> FetchResult<bool> {
            self.clicks.push(label.to_string());
            if self.broken_tabs.iter().any(|t| t == label) {
                return Err(FetchError::Timeout(timeout_ms));
            }
            match self.tabs.get(label) {
                Some(text) => {
                    self.current = text.clone();
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        async fn section_text(&self, heading: &str) -> FetchResult<String> {
            if self.current.is_empty() {
                return Ok(String::new());
            }
            Ok(format!("{heading}\n{}", self.current))
        }
        async fn close(self: Box<Self>) -> FetchResult<()> {
            Ok(())
        }
    }

    fn config() -> ScrapeConfig {
        ScrapeConfig::default().without_delays()
    }

    #[test]
    fn test_clean_panel_text() {
        let raw = "  Artwork Details \n\nOverview\nTitle: Sword\n  Object Information\nDate: 1400  \n";
        let noise = ["Artwork Details", "Object Information", "Overview"];
        assert_eq!(clean_panel_text(raw, &noise), "Title: Sword\nDate: 1400");
    }

    #[test]
    fn test_dedupe_preserving_order() {
        let urls = vec!["b".to_string(), "a".into(), "b".into(), "c".into(), "a".into()];
        assert_eq!(dedupe_preserving_order(urls), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_scrape_page_collects_panels() {
        let mut page = TabbedPage {
            title: "Katana".into(),
            images: vec!["https://i/1.jpg".into(), "https://i/2.jpg".into(), "https://i/1.jpg".into()],
            ..Default::default()
        };
        page.tabs.insert("Overview".into(), "Blade\nOverview".into());
        page.tabs.insert("Provenance".into(), "Ex coll. Smith".into());
        page.tabs.insert("References".into(), "Ex coll. Smith".into());

        let data = scrape_page(&mut page, &config(), 22506).await.unwrap();
        assert_eq!(data.page_url, "https://www.metmuseum.org/art/collection/search/22506");
        assert_eq!(data.title, "Katana");
        assert_eq!(data.image_urls, vec!["https://i/1.jpg", "https://i/2.jpg"]);
        assert_eq!(data.panels.overview, "Blade");
        assert_eq!(data.panels.signatures, "");
        assert_eq!(data.panels.provenance, "Ex coll. Smith");
        assert_eq!(data.panels.references, "", "clone of provenance is cleared");
        assert_eq!(page.clicks.len(), 4);
    }

    #[tokio::test]
    async fn test_broken_tab_is_skipped() {
        let mut page = TabbedPage::default();
        page.tabs.insert("Overview".into(), "Blade".into());
        page.tabs.insert("Provenance".into(), "Ex coll. Smith".into());
        page.broken_tabs.push("Provenance".into());

        let data = scrape_page(&mut page, &config(), 1).await.unwrap();
        assert_eq!(data.panels.overview, "Blade");
        assert_eq!(data.panels.provenance, "");
    }

    #[tokio::test]
    async fn test_navigation_failure_is_error() {
        let mut page = TabbedPage {
            fail_navigation: true,
            ..Default::default()
        };
        let result = scrape_page(&mut page, &config(), 5).await;
        assert!(matches!(result, Err(FetchError::Timeout(_))));
        assert!(page.clicks.is_empty());
    }
}

use crate::error::SourceError;
use crate::sources::traits::ElementSource;
use anyhow::{anyhow, Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::Rng;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The scrollable results panel on a Maps search page.
pub const MAPS_FEED_SELECTOR: &str = r#"div[role="feed"]"#;
/// One result card inside the panel.
pub const MAPS_CARD_SELECTOR: &str = "div.Nv2PK";

/// Element source backed by a headless-Chrome tab showing a lazily-loaded
/// results feed.
///
/// `current_elements` snapshots the rendered page and slices out the result
/// cards as HTML fragments; `advance` scrolls the feed container by a
/// randomized step. Each worker owns its own instance; the tab is never
/// shared.
pub struct FeedSource {
    tab: Arc<Tab>,
    feed_selector: String,
    card_selector: Selector,
    scroll_step_px: (u32, u32),
}

impl FeedSource {
    pub fn launch_browser(headless: bool) -> Result<Browser> {
        info!(headless, "launching Chrome");
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .build()
            .context("Failed to build launch options")?;
        Browser::new(options).context("Failed to launch Chrome browser")
    }

    /// Open `url` in a new tab and wait for the feed container to render.
    ///
    /// The container never appearing is fatal for this run and is reported,
    /// not retried.
    pub fn open(
        browser: &Browser,
        url: &str,
        feed_selector: &str,
        card_selector: &str,
        feed_wait: Duration,
        scroll_step_px: (u32, u32),
    ) -> Result<Self, SourceError> {
        let card_selector = Selector::parse(card_selector)
            .map_err(|e| SourceError::Browser(anyhow!("invalid card selector `{card_selector}`: {e}")))?;

        let tab = browser.new_tab()?;
        info!(url, "opening listing page");
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;

        if tab
            .wait_for_element_with_custom_timeout(feed_selector, feed_wait)
            .is_err()
        {
            return Err(SourceError::Unavailable(format!(
                "`{feed_selector}` did not appear within {feed_wait:?}"
            )));
        }

        Ok(Self {
            tab,
            feed_selector: feed_selector.to_string(),
            card_selector,
            scroll_step_px,
        })
    }

    /// Search URL for a query, optionally scoped to a region.
    pub fn maps_search_url(query: &str, region: &str) -> String {
        let terms = format!("{query} {region}");
        let encoded = terms.trim().replace(' ', "+");
        format!("https://www.google.com/maps/search/{encoded}")
    }
}

impl ElementSource for FeedSource {
    type Element = String;

    fn current_elements(&mut self) -> Result<Vec<String>, SourceError> {
        let snapshot = self
            .tab
            .evaluate("document.documentElement.outerHTML", false)?;
        let html = snapshot
            .value
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        if html.is_empty() {
            debug!("page snapshot came back empty");
            return Ok(Vec::new());
        }

        let document = Html::parse_document(&html);
        let cards: Vec<String> = document
            .select(&self.card_selector)
            .map(|card| card.html())
            .collect();
        debug!(cards = cards.len(), "materialized result cards");
        Ok(cards)
    }

    fn advance(&mut self) -> Result<(), SourceError> {
        let (min_px, max_px) = self.scroll_step_px;
        let step = if max_px > min_px {
            rand::thread_rng().gen_range(min_px..=max_px)
        } else {
            min_px
        };
        debug!(step, "scrolling feed");
        let js = format!(
            "const panel = document.querySelector('{}'); if (panel) panel.scrollTop += {};",
            self.feed_selector, step
        );
        self.tab.evaluate(&js, false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_is_query_plus_region() {
        assert_eq!(
            FeedSource::maps_search_url("coffee shops", "Seattle, WA"),
            "https://www.google.com/maps/search/coffee+shops+Seattle,+WA"
        );
    }

    #[test]
    fn search_url_without_region_has_no_trailing_separator() {
        assert_eq!(
            FeedSource::maps_search_url("coffee shops", ""),
            "https://www.google.com/maps/search/coffee+shops"
        );
    }
}

//! Rendering-engine capability used by the scraper.
//!
//! Everything the pipeline does with a live page goes through
//! [`BrowserSession`], so the listing logic can run against a real Chrome
//! ([`chrome::ChromeLauncher`]) or an in-memory page in tests.

pub mod chrome;
#[cfg(test)]
pub mod fake;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::BrowserError;

/// CSS selector, resolved against the page or relative to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where things live on the listing template. Field locators are relative
/// to a card; `card` and `load_more` are page-level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListingLocators {
    pub card: Locator,
    pub title: Locator,
    pub rating: Locator,
    pub votes: Locator,
    pub duration: Locator,
    pub load_more: Locator,
}

impl Default for ListingLocators {
    fn default() -> Self {
        Self {
            card: Locator::css("ul.ipc-metadata-list > li.ipc-metadata-list-summary-item"),
            title: Locator::css("h3.ipc-title__text"),
            rating: Locator::css("span.ipc-rating-star--rating"),
            votes: Locator::css("span.ipc-rating-star--voteCount"),
            duration: Locator::css("span.dli-title-metadata-item:nth-of-type(2)"),
            load_more: Locator::css("button.ipc-see-more__button"),
        }
    }
}

/// One live page. Every wait is bounded by the timeout passed in.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Node: Send + Sync;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self::Node>, BrowserError>;

    /// `Ok(None)` when nothing under `node` matches.
    async fn find_relative(
        &self,
        node: &Self::Node,
        locator: &Locator,
    ) -> Result<Option<Self::Node>, BrowserError>;

    async fn text(&self, node: &Self::Node) -> Result<Option<String>, BrowserError>;

    /// Fails with [`BrowserError::Timeout`] if no visible, enabled match
    /// shows up within `timeout`.
    async fn wait_until_clickable(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Node, BrowserError>;

    async fn scroll_into_view(&self, node: &Self::Node) -> Result<(), BrowserError>;

    /// Pointer click. [`BrowserError::ClickIntercepted`] when another element
    /// covers the target.
    async fn click(&self, node: &Self::Node) -> Result<(), BrowserError>;

    /// Script-level click that ignores overlays.
    async fn force_click(&self, node: &Self::Node) -> Result<(), BrowserError>;

    async fn run_script(&self, script: &str) -> Result<(), BrowserError>;

    async fn close(self) -> Result<(), BrowserError>
    where
        Self: Sized;
}

/// Opens isolated sessions, one per genre run.
#[async_trait]
pub trait BrowserLauncher: Send + Sync + 'static {
    type Session: BrowserSession + 'static;

    async fn launch(&self) -> Result<Self::Session, BrowserError>;
}

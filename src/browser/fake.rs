//! In-memory listing page for exercising the scraper without Chrome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{BrowserLauncher, BrowserSession, ListingLocators, Locator};
use crate::error::BrowserError;

#[derive(Debug, Clone, Default)]
pub struct FakeCard {
    fields: HashMap<&'static str, String>,
}

impl FakeCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &'static str, text: &str) -> Self {
        self.fields.insert(field, text.to_string());
        self
    }

    /// Card with all four fields present.
    pub fn full(title: &str, rating: &str, votes: &str, duration: &str) -> Self {
        Self::new()
            .with("title", title)
            .with("rating", rating)
            .with("votes", votes)
            .with("duration", duration)
    }
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub cards: Vec<FakeCard>,
    /// Cards revealed initially and per "load more" click.
    pub page_size: usize,
    pub fail_navigation: bool,
    /// Pointer clicks on the control are always intercepted.
    pub intercept_clicks: bool,
}

impl FakePage {
    pub fn new(cards: Vec<FakeCard>, page_size: usize) -> Self {
        Self {
            cards,
            page_size,
            fail_navigation: false,
            intercept_clicks: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeLog {
    pub launches: usize,
    pub closes: usize,
    pub navigations: Vec<String>,
    pub clicks: usize,
    pub intercepted: usize,
    pub force_clicks: usize,
    pub scrolls_into_view: usize,
    pub scripts: Vec<String>,
}

/// Launcher serving a fixed page per URL.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    pages: HashMap<String, FakePage>,
    pub log: Arc<Mutex<FakeLog>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, FakeLog> {
        self.log.lock().unwrap()
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    type Session = FakeSession;

    async fn launch(&self) -> Result<FakeSession, BrowserError> {
        self.log().launches += 1;
        Ok(FakeSession {
            pages: self.pages.clone(),
            locators: ListingLocators::default(),
            state: Mutex::new(None),
            log: Arc::clone(&self.log),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakeNode {
    Card(usize),
    Field(usize, &'static str),
    LoadMore,
}

struct Loaded {
    page: FakePage,
    visible: usize,
}

pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    locators: ListingLocators,
    state: Mutex<Option<Loaded>>,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeSession {
    fn field_for(&self, locator: &Locator) -> Option<&'static str> {
        let l = &self.locators;
        if *locator == l.title {
            Some("title")
        } else if *locator == l.rating {
            Some("rating")
        } else if *locator == l.votes {
            Some("votes")
        } else if *locator == l.duration {
            Some("duration")
        } else {
            None
        }
    }

    fn reveal_more(&self) {
        if let Some(loaded) = self.state.lock().unwrap().as_mut() {
            loaded.visible = (loaded.visible + loaded.page.page_size).min(loaded.page.cards.len());
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    type Node = FakeNode;

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        let page = match self.pages.get(url) {
            Some(p) if !p.fail_navigation => p.clone(),
            _ => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".into(),
                })
            }
        };
        let visible = page.page_size.min(page.cards.len());
        *self.state.lock().unwrap() = Some(Loaded { page, visible });
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FakeNode>, BrowserError> {
        if *locator != self.locators.card {
            return Ok(Vec::new());
        }
        let state = self.state.lock().unwrap();
        let visible = state.as_ref().map_or(0, |l| l.visible);
        Ok((0..visible).map(FakeNode::Card).collect())
    }

    async fn find_relative(
        &self,
        node: &FakeNode,
        locator: &Locator,
    ) -> Result<Option<FakeNode>, BrowserError> {
        let (FakeNode::Card(i), Some(field)) = (node, self.field_for(locator)) else {
            return Ok(None);
        };
        let state = self.state.lock().unwrap();
        let present = state
            .as_ref()
            .and_then(|l| l.page.cards.get(*i))
            .is_some_and(|c| c.fields.contains_key(field));
        Ok(present.then_some(FakeNode::Field(*i, field)))
    }

    async fn text(&self, node: &FakeNode) -> Result<Option<String>, BrowserError> {
        let FakeNode::Field(i, field) = node else {
            return Ok(None);
        };
        let state = self.state.lock().unwrap();
        Ok(state
            .as_ref()
            .and_then(|l| l.page.cards.get(*i))
            .and_then(|c| c.fields.get(field).cloned()))
    }

    async fn wait_until_clickable(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<FakeNode, BrowserError> {
        let state = self.state.lock().unwrap();
        let more = state
            .as_ref()
            .is_some_and(|l| l.visible < l.page.cards.len());
        if *locator == self.locators.load_more && more {
            Ok(FakeNode::LoadMore)
        } else {
            Err(BrowserError::Timeout(timeout))
        }
    }

    async fn scroll_into_view(&self, _node: &FakeNode) -> Result<(), BrowserError> {
        self.log.lock().unwrap().scrolls_into_view += 1;
        Ok(())
    }

    async fn click(&self, node: &FakeNode) -> Result<(), BrowserError> {
        let intercept = self
            .state
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|l| l.page.intercept_clicks);
        if intercept {
            self.log.lock().unwrap().intercepted += 1;
            return Err(BrowserError::ClickIntercepted);
        }
        self.log.lock().unwrap().clicks += 1;
        if *node == FakeNode::LoadMore {
            self.reveal_more();
        }
        Ok(())
    }

    async fn force_click(&self, node: &FakeNode) -> Result<(), BrowserError> {
        self.log.lock().unwrap().force_clicks += 1;
        if *node == FakeNode::LoadMore {
            self.reveal_more();
        }
        Ok(())
    }

    async fn run_script(&self, script: &str) -> Result<(), BrowserError> {
        self.log.lock().unwrap().scripts.push(script.to_string());
        Ok(())
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

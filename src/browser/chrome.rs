use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BrowserLauncher, BrowserSession, Locator};
use crate::config::BrowserConfig;
use crate::error::BrowserError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

const CLICKABLE_JS: &str = "function() {
    const r = this.getBoundingClientRect();
    const s = window.getComputedStyle(this);
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden'
        && s.display !== 'none' && !this.disabled;
}";

// True when the element (or a child) is what a pointer at its center would hit.
const HIT_TEST_JS: &str = "function() {
    const r = this.getBoundingClientRect();
    const top = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2);
    return top === null || top === this || this.contains(top);
}";

const FORCE_CLICK_JS: &str = "function() { this.click(); }";

/// Launches a local Chrome/Chromium per session.
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

pub struct ChromeSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self) -> Result<ChromeSession, BrowserError> {
        let mut builder = chromiumoxide::BrowserConfig::builder();
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let cfg = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(cfg)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The CDP connection only makes progress while the handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        Ok(ChromeSession {
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }
}

impl ChromeSession {
    async fn js_bool(&self, node: &Element, function: &str) -> Result<bool, BrowserError> {
        let ret = node.call_js_fn(function, false).await?;
        Ok(ret
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    type Node = Element;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("no load event within {:?}", timeout),
            }),
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>, BrowserError> {
        Ok(self.page.find_elements(locator.as_str()).await?)
    }

    async fn find_relative(
        &self,
        node: &Element,
        locator: &Locator,
    ) -> Result<Option<Element>, BrowserError> {
        // CDP reports "no match" as an error, so a miss and a failed lookup look the same.
        match node.find_element(locator.as_str()).await {
            Ok(el) => Ok(Some(el)),
            Err(e) => {
                debug!("no match for {}: {}", locator, e);
                Ok(None)
            }
        }
    }

    async fn text(&self, node: &Element) -> Result<Option<String>, BrowserError> {
        Ok(node.inner_text().await?)
    }

    async fn wait_until_clickable(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Element, BrowserError> {
        let poll = async {
            loop {
                if let Ok(el) = self.page.find_element(locator.as_str()).await {
                    if self.js_bool(&el, CLICKABLE_JS).await.unwrap_or(false) {
                        return el;
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::Timeout(timeout))
    }

    async fn scroll_into_view(&self, node: &Element) -> Result<(), BrowserError> {
        node.scroll_into_view().await?;
        Ok(())
    }

    async fn click(&self, node: &Element) -> Result<(), BrowserError> {
        if !self.js_bool(node, HIT_TEST_JS).await? {
            return Err(BrowserError::ClickIntercepted);
        }
        node.click().await?;
        Ok(())
    }

    async fn force_click(&self, node: &Element) -> Result<(), BrowserError> {
        node.call_js_fn(FORCE_CLICK_JS, false).await?;
        Ok(())
    }

    async fn run_script(&self, script: &str) -> Result<(), BrowserError> {
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn close(self) -> Result<(), BrowserError> {
        let mut browser = self.browser.into_inner();
        let closed = browser.close().await;
        if !await_exit(browser.wait(), EXIT_TIMEOUT).await {
            if let Some(Err(e)) = browser.kill().await {
                warn!("could not kill browser process: {}", e);
            }
        }
        self.handler.abort();
        closed?;
        Ok(())
    }
}

/// Wait for the browser process to exit. Returns false if it is still
/// running after `limit` and has to be killed.
async fn await_exit<F, T, E>(exit: F, limit: Duration) -> bool
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, exit).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!("browser process did not exit cleanly: {}", e);
            true
        }
        Err(_) => {
            warn!("browser process still running after {:?}", limit);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hung_browser_exit_gives_up() {
        let hung = std::future::pending::<Result<(), std::io::Error>>();
        assert!(!await_exit(hung, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn exited_browser_is_not_killed() {
        assert!(await_exit(async { Ok::<_, std::io::Error>(()) }, EXIT_TIMEOUT).await);
        let failed = async { Err::<(), _>(std::io::Error::other("no such process")) };
        assert!(await_exit(failed, EXIT_TIMEOUT).await);
    }
}

//! Browser automation seam
//!
//! [`BrowserDriver`] is everything the harness needs from a browser: tab
//! enumeration, URL inspection, element queries by [`Locator`], and a few
//! page-level actions. [`PageHandle`] pins a driver to one tab and adds the
//! bounded element waits used by the choreography.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::poller::PollCondition;
use crate::selectors::Locator;

/// Interval for element-state waits
pub const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Opaque identifier of a browser tab (a CDP target id for Chromium)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub String);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
        };
        f.write_str(s)
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Tabs currently open in the shared context, in context order
    async fn tabs(&self) -> E2eResult<Vec<TabId>>;

    async fn tab_url(&self, tab: &TabId) -> E2eResult<String>;

    /// Open a new tab. Only the bootstrapper calls this.
    async fn open_tab(&self, url: &str) -> E2eResult<TabId>;

    async fn bring_to_front(&self, tab: &TabId) -> E2eResult<()>;

    async fn goto(&self, tab: &TabId, url: &str) -> E2eResult<()>;

    async fn reload(&self, tab: &TabId) -> E2eResult<()>;

    /// Evaluate a script in the page, awaiting a returned promise
    async fn evaluate(&self, tab: &TabId, script: &str) -> E2eResult<serde_json::Value>;

    async fn count(&self, tab: &TabId, locator: &Locator) -> E2eResult<usize>;

    /// `false` when nothing matches
    async fn is_visible(&self, tab: &TabId, locator: &Locator) -> E2eResult<bool>;

    /// Errors when nothing matches
    async fn is_enabled(&self, tab: &TabId, locator: &Locator) -> E2eResult<bool>;

    /// Rendered text of the first match, `None` when nothing matches
    async fn inner_text(&self, tab: &TabId, locator: &Locator) -> E2eResult<Option<String>>;

    async fn click(&self, tab: &TabId, locator: &Locator) -> E2eResult<()>;

    /// Replace the value of an input and fire input/change events
    async fn fill(&self, tab: &TabId, locator: &Locator, value: &str) -> E2eResult<()>;

    /// PNG bytes of the tab
    async fn screenshot(&self, tab: &TabId) -> E2eResult<Vec<u8>>;

    async fn close(&self) -> E2eResult<()>;
}

/// A driver bound to one tab
#[derive(Clone)]
pub struct PageHandle {
    driver: Arc<dyn BrowserDriver>,
    tab: TabId,
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle").field("tab", &self.tab).finish()
    }
}

impl PageHandle {
    pub fn new(driver: Arc<dyn BrowserDriver>, tab: TabId) -> Self {
        Self { driver, tab }
    }

    pub fn tab(&self) -> &TabId {
        &self.tab
    }

    pub async fn bring_to_front(&self) -> E2eResult<()> {
        self.driver.bring_to_front(&self.tab).await
    }

    pub async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("goto {} on tab {}", url, self.tab);
        self.driver.goto(&self.tab, url).await
    }

    pub async fn reload(&self) -> E2eResult<()> {
        debug!("reload tab {}", self.tab);
        self.driver.reload(&self.tab).await
    }

    pub async fn evaluate(&self, script: &str) -> E2eResult<serde_json::Value> {
        self.driver.evaluate(&self.tab, script).await
    }

    pub async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        self.driver.count(&self.tab, locator).await
    }

    pub async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        self.driver.is_visible(&self.tab, locator).await
    }

    pub async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        self.driver.is_enabled(&self.tab, locator).await
    }

    /// Rendered text of the first match; a missing element is an error.
    pub async fn text(&self, locator: &Locator) -> E2eResult<String> {
        self.driver
            .inner_text(&self.tab, locator)
            .await?
            .ok_or_else(|| E2eError::Browser(format!("element not found: {locator}")))
    }

    pub async fn click(&self, locator: &Locator) -> E2eResult<()> {
        debug!("click {}", locator);
        self.driver.click(&self.tab, locator).await
    }

    pub async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        debug!("fill {}", locator);
        self.driver.fill(&self.tab, locator, value).await
    }

    pub async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        self.driver.screenshot(&self.tab).await
    }

    /// Wait for an element to reach `state`, bounded by `timeout`.
    pub async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        let poll = PollCondition::within(format!("{locator} to be {state}"), timeout, ELEMENT_POLL_INTERVAL);
        poll.wait_until(move || async move {
            match state {
                WaitState::Visible => self.is_visible(locator).await,
                WaitState::Hidden => Ok(!self.is_visible(locator).await?),
            }
        })
        .await
        .map(|_| ())
    }

    pub async fn click_when_visible(&self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        self.wait_for(locator, WaitState::Visible, timeout).await?;
        self.click(locator).await
    }

    pub async fn text_when_visible(&self, locator: &Locator, timeout: Duration) -> E2eResult<String> {
        self.wait_for(locator, WaitState::Visible, timeout).await?;
        self.text(locator).await
    }

    pub async fn fill_when_visible(&self, locator: &Locator, value: &str, timeout: Duration) -> E2eResult<()> {
        self.wait_for(locator, WaitState::Visible, timeout).await?;
        self.fill(locator, value).await
    }

    /// Whether the element is hidden, or becomes hidden within `timeout`.
    /// Returns promptly when the element is already absent.
    pub async fn is_hidden_within(&self, locator: &Locator, timeout: Duration) -> E2eResult<bool> {
        match self.wait_for(locator, WaitState::Hidden, timeout).await {
            Ok(()) => Ok(true),
            Err(E2eError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

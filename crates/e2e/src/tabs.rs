//! Tab discovery and focus
//!
//! Tabs are owned by the browser context; the registry only looks them up by
//! URL and brings them to the front. Lookups scan the live tab list on every
//! call because the extension opens and closes popups on its own.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::driver::{BrowserDriver, PageHandle, TabId};
use crate::error::{E2eError, E2eResult};
use crate::poller::PollCondition;

/// URL prefix of extension pages in Chromium
pub const EXTENSION_SCHEME: &str = "chrome-extension://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabPattern {
    /// Any tab whose URL contains the application host
    ApplicationHost(String),
    /// Any extension page (wallet home, popup, notification)
    ExtensionScheme,
}

impl TabPattern {
    pub fn marker(&self) -> &str {
        match self {
            TabPattern::ApplicationHost(host) => host,
            TabPattern::ExtensionScheme => EXTENSION_SCHEME,
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        url.contains(self.marker())
    }
}

impl fmt::Display for TabPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabPattern::ApplicationHost(host) => write!(f, "application tab ({host})"),
            TabPattern::ExtensionScheme => write!(f, "extension tab"),
        }
    }
}

#[derive(Clone)]
pub struct TabRegistry {
    driver: Arc<dyn BrowserDriver>,
    app_host: String,
    focused: Arc<Mutex<Option<TabId>>>,
}

impl TabRegistry {
    pub fn new(driver: Arc<dyn BrowserDriver>, app_host: impl Into<String>) -> Self {
        Self {
            driver,
            app_host: app_host.into(),
            focused: Arc::new(Mutex::new(None)),
        }
    }

    pub fn application_pattern(&self) -> TabPattern {
        TabPattern::ApplicationHost(self.app_host.clone())
    }

    /// First tab in context order whose URL matches `pattern`.
    pub async fn find(&self, pattern: &TabPattern) -> E2eResult<TabId> {
        for tab in self.driver.tabs().await? {
            // A tab closing mid-scan is not a match, not an error.
            let url = match self.driver.tab_url(&tab).await {
                Ok(url) => url,
                Err(e) => {
                    debug!("Skipping tab {}: {}", tab, e);
                    continue;
                }
            };
            if pattern.matches(&url) {
                debug!("Found {} at {}", pattern, url);
                return Ok(tab);
            }
        }
        Err(E2eError::TabNotFound(pattern.to_string()))
    }

    /// Wait for a tab to appear, e.g. a popup opened by the extension.
    pub async fn wait_for(&self, pattern: &TabPattern, poll: &PollCondition) -> E2eResult<TabId> {
        let found = Mutex::new(None);
        let slot = &found;
        poll.wait_until(move || async move {
            let tab = self.find(pattern).await?;
            *slot.lock() = Some(tab);
            Ok(true)
        })
        .await?;
        found
            .into_inner()
            .ok_or_else(|| E2eError::TabNotFound(pattern.to_string()))
    }

    /// Bring `tab` to the front; it becomes the implicit target of
    /// subsequent UI operations.
    pub async fn focus(&self, tab: &TabId) -> E2eResult<()> {
        self.driver.bring_to_front(tab).await?;
        *self.focused.lock() = Some(tab.clone());
        Ok(())
    }

    pub fn focused(&self) -> Option<TabId> {
        self.focused.lock().clone()
    }

    pub async fn application_tab(&self) -> E2eResult<TabId> {
        self.find(&self.application_pattern()).await
    }

    pub async fn extension_tab(&self) -> E2eResult<TabId> {
        self.find(&TabPattern::ExtensionScheme).await
    }

    pub async fn focus_application(&self) -> E2eResult<PageHandle> {
        let tab = self.application_tab().await?;
        self.focus(&tab).await?;
        info!("dApp tab is now in focus");
        Ok(PageHandle::new(self.driver.clone(), tab))
    }

    pub async fn focus_extension(&self) -> E2eResult<PageHandle> {
        let tab = self.extension_tab().await?;
        self.focus(&tab).await?;
        info!("Wallet extension tab is now in focus");
        Ok(PageHandle::new(self.driver.clone(), tab))
    }
}

//! Session bootstrap and the per-scenario session
//!
//! A [`Session`] is created once per scenario by the [`Bootstrapper`] and
//! passed by `&mut` to every step handler; nothing about the browser lives
//! in globals.

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::DappPage;
use crate::config::HarnessConfig;
use crate::driver::{BrowserDriver, PageHandle, TabId};
use crate::error::{E2eError, E2eResult};
use crate::tabs::{TabPattern, TabRegistry};
use crate::wallet::{WalletBridge, WalletDriver};

/// A browser started with the wallet extension installed
#[derive(Clone)]
pub struct LaunchedBrowser {
    pub driver: Arc<dyn BrowserDriver>,
    pub wallet: Arc<dyn WalletDriver>,
}

/// Starts a browser with the wallet extension and no account configured
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, config: &HarnessConfig) -> E2eResult<LaunchedBrowser>;
}

pub struct Session {
    driver: Arc<dyn BrowserDriver>,
    config: Arc<HarnessConfig>,
    pub tabs: TabRegistry,
    pub wallet: WalletBridge,
    /// The application tab steps act on
    pub app: DappPage,
    /// Network the wallet was switched to at bootstrap
    pub network: String,
    /// Balance read before a deposit, for the post-deposit comparison
    pub recorded_balance: Option<String>,
}

impl Session {
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Re-find the application tab by host, focus it, and make it the tab
    /// subsequent app steps act on.
    pub async fn focus_application(&mut self) -> E2eResult<()> {
        let page = self.tabs.focus_application().await?;
        self.app = DappPage::new(
            page,
            self.config.selectors.app.clone(),
            self.config.timings.clone(),
        );
        Ok(())
    }

    /// Flat wait for asynchronous on-chain confirmation to reach the UI
    pub async fn settle(&self) {
        let settle = self.config.timings.settle();
        info!("Waiting {:?} for transaction confirmation", settle);
        tokio::time::sleep(settle).await;
    }

    /// Screenshot of whichever tab was last focused (the app tab otherwise)
    pub async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        let tab = self
            .tabs
            .focused()
            .unwrap_or_else(|| self.app.page().tab().clone());
        self.driver.screenshot(&tab).await
    }

    pub async fn teardown(self) -> E2eResult<()> {
        info!("Closing browser");
        self.driver.close().await
    }
}

pub struct Bootstrapper {
    launcher: Arc<dyn Launcher>,
    config: Arc<HarnessConfig>,
}

impl Bootstrapper {
    pub fn new(launcher: Arc<dyn Launcher>, config: Arc<HarnessConfig>) -> Self {
        Self { launcher, config }
    }

    /// Launch the browser, import the wallet from `seed`, and switch it to
    /// `network`. Any failure closes the browser; no partial session is
    /// returned.
    pub async fn launch(&self, network: &str, seed: Option<&SecretString>) -> E2eResult<Session> {
        let seed = seed.ok_or_else(|| {
            E2eError::Setup("wallet seed is missing; set WALLET_SEED in .env.local".to_string())
        })?;
        let app_host = self.config.app_host()?;

        info!("Launching browser with wallet, connecting to {}", network);
        let launched = self.launcher.launch(&self.config).await?;
        let driver = launched.driver.clone();

        match self.prepare(launched, seed, network, app_host).await {
            Ok(session) => Ok(session),
            Err(e) => {
                if let Err(close_err) = driver.close().await {
                    warn!("Failed to close browser after bootstrap error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn prepare(
        &self,
        launched: LaunchedBrowser,
        seed: &SecretString,
        network: &str,
        app_host: String,
    ) -> E2eResult<Session> {
        let LaunchedBrowser { driver, wallet } = launched;

        wallet
            .setup(seed)
            .await
            .map_err(|e| E2eError::Setup(format!("wallet import failed: {e}")))?;

        wallet
            .switch_network(network)
            .await
            .map_err(|e| E2eError::Setup(format!("could not switch wallet to {network}: {e}")))?;
        info!("Wallet switched to {}", network);

        let tabs = TabRegistry::new(driver.clone(), app_host);
        let app_tab = initial_app_tab(driver.as_ref()).await?;
        // Onboarding leaves the extension in front.
        tabs.focus(&app_tab).await?;
        let app = DappPage::new(
            PageHandle::new(driver.clone(), app_tab),
            self.config.selectors.app.clone(),
            self.config.timings.clone(),
        );
        let bridge = WalletBridge::new(
            wallet,
            tabs.clone(),
            self.config.selectors.wallet.clone(),
            self.config.timings.clone(),
        );

        Ok(Session {
            driver,
            config: self.config.clone(),
            tabs,
            wallet: bridge,
            app,
            network: network.to_string(),
            recorded_balance: None,
        })
    }
}

/// First non-extension tab in the context, opening one if the extension
/// left none behind.
async fn initial_app_tab(driver: &dyn BrowserDriver) -> E2eResult<TabId> {
    for tab in driver.tabs().await? {
        let url = driver.tab_url(&tab).await.unwrap_or_default();
        if !TabPattern::ExtensionScheme.matches(&url) {
            return Ok(tab);
        }
    }
    driver.open_tab("about:blank").await
}

//! MetaMask implementation of [`WalletDriver`], driven through the
//! extension's own tab.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Timings;
use crate::driver::{PageHandle, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::poller::PollCondition;
use crate::selectors::WalletSelectors;
use crate::wallet::WalletDriver;

/// Interval for watching the network indicator after a switch
const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct MetaMaskWallet {
    page: PageHandle,
    selectors: WalletSelectors,
    timings: Timings,
    password: SecretString,
}

impl MetaMaskWallet {
    pub fn new(page: PageHandle, selectors: WalletSelectors, timings: Timings, password: SecretString) -> Self {
        Self {
            page,
            selectors,
            timings,
            password,
        }
    }

    /// Close a "what's new" style popover if one is covering the home view
    async fn dismiss_popover(&self) -> E2eResult<()> {
        if self.page.is_visible(&self.selectors.popover_close).await? {
            self.page.click(&self.selectors.popover_close).await?;
            debug!("Dismissed wallet popover");
        }
        Ok(())
    }
}

#[async_trait]
impl WalletDriver for MetaMaskWallet {
    async fn setup(&self, seed: &SecretString) -> E2eResult<()> {
        let s = &self.selectors;
        let wait = self.timings.element_timeout();
        let page = &self.page;

        let words: Vec<&str> = seed.expose_secret().split_whitespace().collect();
        if !matches!(words.len(), 12 | 15 | 18 | 21 | 24) {
            return Err(E2eError::Setup(format!(
                "seed phrase has {} words; expected 12, 15, 18, 21 or 24",
                words.len()
            )));
        }

        page.bring_to_front().await?;
        page.click_when_visible(&s.onboarding_terms, wait).await?;
        page.click_when_visible(&s.onboarding_import, wait).await?;
        page.click_when_visible(&s.metametrics_decline, wait).await?;

        for (index, word) in words.iter().enumerate() {
            page.fill_when_visible(&s.srp_word(index), word, wait).await?;
        }
        page.click_when_visible(&s.srp_confirm, wait).await?;
        debug!("Secret recovery phrase entered");

        let password = self.password.expose_secret();
        page.fill_when_visible(&s.password_new, password, wait).await?;
        page.fill(&s.password_confirm, password).await?;
        page.click(&s.password_terms).await?;
        page.click(&s.password_import).await?;

        page.click_when_visible(&s.onboarding_done, wait).await?;
        page.click_when_visible(&s.pin_extension_next, wait).await?;
        page.click_when_visible(&s.pin_extension_done, wait).await?;
        self.dismiss_popover().await?;

        info!("Wallet imported successfully");
        Ok(())
    }

    async fn switch_network(&self, network: &str) -> E2eResult<()> {
        let s = &self.selectors;
        let wait = self.timings.element_timeout();
        let page = &self.page;

        page.bring_to_front().await?;
        self.dismiss_popover().await?;
        page.click_when_visible(&s.network_display, wait).await?;

        let item = s.network_list_item.clone().with_text(network);
        if !page.is_visible(&item).await? {
            // Test networks are hidden until the toggle is switched on.
            page.click_when_visible(&s.show_test_networks, wait).await?;
        }
        page.click_when_visible(&item, wait).await?;

        let display = &s.network_display;
        let poll = PollCondition::within(format!("wallet network to be {network}"), wait, NETWORK_POLL_INTERVAL);
        poll.wait_until(move || async move {
            let shown = page.text(display).await?;
            Ok(shown.contains(network))
        })
        .await
        .map_err(|e| E2eError::Wallet(format!("switch to {network} not confirmed: {e}")))?;

        info!("Wallet switched to {}", network);
        Ok(())
    }

    async fn confirm_transaction(&self) -> E2eResult<()> {
        self.page.bring_to_front().await?;
        self.page
            .wait_for(&self.selectors.confirm_footer, WaitState::Visible, self.timings.confirm_footer_timeout())
            .await?;
        self.page.click(&self.selectors.confirm_footer).await
    }

    async fn reject(&self) -> E2eResult<()> {
        self.page.bring_to_front().await?;
        self.page
            .click_when_visible(&self.selectors.cancel_footer, self.timings.confirm_footer_timeout())
            .await?;
        info!("Transaction rejected in wallet");
        Ok(())
    }

    fn page(&self) -> &PageHandle {
        &self.page
    }
}

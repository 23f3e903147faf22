//! The application actor: every interaction with the dApp tab, by semantic
//! element name.

use tracing::info;

use crate::config::Timings;
use crate::driver::{PageHandle, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::selectors::AppSelectors;

/// Prefix the dApp renders in front of the connected account
pub const CONNECTED_PREFIX: &str = "Connected as: ";

const REQUEST_ACCOUNTS_JS: &str = r#"(async () => {
  const accounts = await window.ethereum.request({ method: "eth_requestAccounts" });
  return accounts[0];
})()"#;

#[derive(Debug, Clone)]
pub struct DappPage {
    page: PageHandle,
    selectors: AppSelectors,
    timings: Timings,
}

impl DappPage {
    pub fn new(page: PageHandle, selectors: AppSelectors, timings: Timings) -> Self {
        Self {
            page,
            selectors,
            timings,
        }
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    pub fn selectors(&self) -> &AppSelectors {
        &self.selectors
    }

    pub async fn open(&self, url: &str) -> E2eResult<()> {
        self.page.goto(url).await?;
        info!("App page loaded: {}", url);
        Ok(())
    }

    pub async fn reload(&self) -> E2eResult<()> {
        self.page.reload().await
    }

    /// Primary account as reported by the injected provider
    pub async fn provider_account(&self) -> E2eResult<String> {
        let value = self.page.evaluate(REQUEST_ACCOUNTS_JS).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| E2eError::Wallet(format!("eth_requestAccounts returned {value}")))
    }

    /// Connected address as displayed, without its label
    pub async fn connected_address(&self) -> E2eResult<String> {
        let text = self
            .page
            .text_when_visible(&self.selectors.connected_address, self.timings.element_timeout())
            .await?;
        Ok(text.replace(CONNECTED_PREFIX, "").trim().to_string())
    }

    pub async fn address_input_visible(&self) -> E2eResult<bool> {
        self.page.is_visible(&self.selectors.address_input).await
    }

    /// `true` once the address field is gone, within the element timeout
    pub async fn address_input_hidden(&self) -> E2eResult<bool> {
        self.page
            .is_hidden_within(&self.selectors.address_input, self.timings.element_timeout())
            .await
    }

    pub async fn wait_for_address_input(&self) -> E2eResult<()> {
        self.page
            .wait_for(&self.selectors.address_input, WaitState::Visible, self.timings.element_timeout())
            .await
    }

    /// `true` once the network banner is gone, checked within the short
    /// absence bound.
    pub async fn network_error_absent(&self) -> E2eResult<bool> {
        self.page
            .is_hidden_within(&self.selectors.network_error, self.timings.absence_timeout())
            .await
    }

    pub async fn network_error_text(&self) -> E2eResult<String> {
        self.page
            .text_when_visible(&self.selectors.network_error, self.timings.element_timeout())
            .await
    }

    pub async fn switch_network_label(&self) -> E2eResult<String> {
        self.page
            .text_when_visible(&self.selectors.switch_network_button, self.timings.element_timeout())
            .await
    }

    pub async fn click_switch_network(&self) -> E2eResult<()> {
        self.page
            .click_when_visible(&self.selectors.switch_network_button, self.timings.element_timeout())
            .await?;
        info!("Switch network button clicked");
        Ok(())
    }

    /// Clear the token address field and type `address`
    pub async fn enter_token_address(&self, address: &str) -> E2eResult<()> {
        let input = &self.selectors.address_input;
        self.page
            .fill_when_visible(input, "", self.timings.element_timeout())
            .await?;
        self.page.fill(input, address).await?;
        info!("Token address entered: {}", address);
        Ok(())
    }

    pub async fn submit_address(&self) -> E2eResult<()> {
        self.page.click(&self.selectors.submit_button).await?;
        info!("Token address submitted");
        Ok(())
    }

    pub async fn submit_enabled(&self) -> E2eResult<bool> {
        self.page
            .wait_for(&self.selectors.submit_button, WaitState::Visible, self.timings.element_timeout())
            .await?;
        self.page.is_enabled(&self.selectors.submit_button).await
    }

    pub async fn click_example_token(&self) -> E2eResult<()> {
        self.page
            .click_when_visible(&self.selectors.example_token_link, self.timings.element_timeout())
            .await
    }

    pub async fn balance_info(&self) -> E2eResult<String> {
        self.page
            .text_when_visible(&self.selectors.balance_info, self.timings.element_timeout())
            .await
    }

    /// Exact token amount as displayed
    pub async fn balance_amount(&self) -> E2eResult<String> {
        self.page
            .text_when_visible(&self.selectors.balance_amount, self.timings.element_timeout())
            .await
    }

    pub async fn deposit_history_rows(&self) -> E2eResult<usize> {
        self.page
            .wait_for(&self.selectors.deposit_history, WaitState::Visible, self.timings.element_timeout())
            .await?;
        self.page.count(&self.selectors.deposit_history_row).await
    }

    pub async fn deposit_error(&self) -> E2eResult<String> {
        self.page
            .text_when_visible(&self.selectors.deposit_error, self.timings.element_timeout())
            .await
    }

    pub async fn deposit_button_visible(&self) -> E2eResult<bool> {
        self.page.is_visible(&self.selectors.deposit_button).await
    }

    pub async fn wait_for_deposit_button(&self) -> E2eResult<()> {
        self.page
            .wait_for(&self.selectors.deposit_button, WaitState::Visible, self.timings.element_timeout())
            .await
    }

    pub async fn click_get_more_tokens(&self) -> E2eResult<()> {
        self.page
            .click_when_visible(&self.selectors.get_more_tokens, self.timings.element_timeout())
            .await?;
        info!("Get more tokens link clicked");
        Ok(())
    }

    pub async fn enter_deposit_amount(&self, amount: &str) -> E2eResult<()> {
        self.page
            .fill_when_visible(&self.selectors.deposit_amount_input, amount, self.timings.element_timeout())
            .await
    }

    /// Click deposit; a disabled button fails the step instead of silently
    /// doing nothing.
    pub async fn click_deposit(&self) -> E2eResult<()> {
        let button = &self.selectors.deposit_button;
        self.page
            .wait_for(button, WaitState::Visible, self.timings.element_timeout())
            .await?;
        if !self.page.is_enabled(button).await? {
            return Err(E2eError::assertion("deposit button state", "enabled", "disabled"));
        }
        self.page.click(button).await?;
        info!("Deposit button clicked");
        Ok(())
    }
}

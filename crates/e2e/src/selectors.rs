//! Page-object selector map
//!
//! Choreography code names elements semantically (`app.deposit_button`,
//! `wallet.confirm_footer`); the raw CSS lives only here, and can be
//! overridden from the `[selectors]` table of the harness config.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How to find an element on a page.
///
/// Mirrors the small subset of Playwright locator semantics the harness
/// needs: a CSS query, an optional text filter, optional descendant
/// requirements (all must match inside the same element), an optional
/// scoping parent and an optional index into the matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LocatorRepr")]
pub struct Locator {
    pub css: String,
    pub has_text: Option<String>,
    pub has: Vec<Locator>,
    pub within: Option<Box<Locator>>,
    pub nth: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorRepr {
    Css(String),
    Full {
        css: String,
        #[serde(default)]
        has_text: Option<String>,
        #[serde(default)]
        has: Vec<Locator>,
        #[serde(default)]
        within: Option<Box<Locator>>,
        #[serde(default)]
        nth: Option<usize>,
    },
}

impl From<LocatorRepr> for Locator {
    fn from(repr: LocatorRepr) -> Self {
        match repr {
            LocatorRepr::Css(css) => Locator::css(css),
            LocatorRepr::Full { css, has_text, has, within, nth } => Locator {
                css,
                has_text,
                has,
                within,
                nth,
            },
        }
    }
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            has_text: None,
            has: Vec::new(),
            within: None,
            nth: None,
        }
    }

    /// Keep only matches whose rendered text contains `text`.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    /// Keep only matches containing a descendant matched by `inner`.
    pub fn has(mut self, inner: Locator) -> Self {
        self.has.push(inner);
        self
    }

    /// Search only inside the first element matched by `parent`.
    pub fn within(mut self, parent: Locator) -> Self {
        self.within = Some(Box::new(parent));
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.within {
            write!(f, "{parent} >> ")?;
        }
        write!(f, "{}", self.css)?;
        if let Some(text) = &self.has_text {
            write!(f, " :has-text({text:?})")?;
        }
        for inner in &self.has {
            write!(f, " :has({inner})")?;
        }
        if let Some(n) = self.nth {
            write!(f, " >> nth={n}")?;
        }
        Ok(())
    }
}

fn data_test(id: &str) -> Locator {
    Locator::css(format!("[data-test='{id}']"))
}

fn data_testid(id: &str) -> Locator {
    Locator::css(format!("[data-testid='{id}']"))
}

/// Elements of the dApp under test. Renaming any of these attributes in the
/// application breaks the harness; they are its compatibility surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSelectors {
    pub connected_address: Locator,
    pub network_error: Locator,
    pub switch_network_button: Locator,
    pub address_input: Locator,
    pub submit_button: Locator,
    pub example_token_link: Locator,
    pub balance_info: Locator,
    pub balance_amount: Locator,
    pub get_more_tokens: Locator,
    pub deposit_history: Locator,
    pub deposit_history_row: Locator,
    pub deposit_error: Locator,
    pub deposit_amount_input: Locator,
    pub deposit_button: Locator,
}

impl Default for AppSelectors {
    fn default() -> Self {
        Self {
            connected_address: data_test("MetaMaskConnector__Div__connect"),
            network_error: data_test("MetaMaskConnector__Div__error"),
            switch_network_button: data_test("MetaMaskConnector__Button__connect"),
            address_input: data_test("InputAddress__Input__addressValue"),
            submit_button: data_test("InputAddress__Button__submit"),
            example_token_link: data_test("InputAddress__Span__exampleTokenLink"),
            balance_info: data_test("TokenBalance__Div__balanceInfo"),
            balance_amount: data_test("TokenBalance__Div__balanceAmount"),
            get_more_tokens: data_test("TokenBalance__Div__getMoreExampleTokensAction"),
            deposit_history: data_test("DepositHistory__Table__history"),
            deposit_history_row: Locator::css("tr").within(data_test("DepositHistory__Table__history")),
            deposit_error: data_test("DepositToken__Div__error"),
            deposit_amount_input: data_test("DepositToken__Input__depositAmount"),
            deposit_button: data_test("DepositToken__Button__deposit"),
        }
    }
}

/// Elements of the MetaMask extension UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSelectors {
    // Connection / permissions
    pub account_options_menu: Locator,
    pub connected_sites: Locator,
    pub product_tour_dismiss: Locator,
    pub back_button: Locator,
    pub connect_confirm: Locator,

    // Network
    pub network_display: Locator,
    pub network_list_item: Locator,
    pub show_test_networks: Locator,
    pub network_switch_confirm: Locator,

    // Transactions
    pub activity_tab: Locator,
    pub transaction_list_first: Locator,
    pub activity_item: Locator,
    pub activity_item_action: Locator,
    pub activity_item_status: Locator,
    /// Class suffix appended to `transaction-status-label--` per status
    pub status_class_prefix: String,
    pub confirm_footer: Locator,
    pub cancel_footer: Locator,

    // Onboarding
    pub onboarding_terms: Locator,
    pub onboarding_import: Locator,
    pub metametrics_decline: Locator,
    /// `{index}` is replaced with the zero-based word position
    pub srp_word_template: String,
    pub srp_confirm: Locator,
    pub password_new: Locator,
    pub password_confirm: Locator,
    pub password_terms: Locator,
    pub password_import: Locator,
    pub onboarding_done: Locator,
    pub pin_extension_next: Locator,
    pub pin_extension_done: Locator,
    pub popover_close: Locator,
}

impl Default for WalletSelectors {
    fn default() -> Self {
        Self {
            account_options_menu: data_testid("account-options-menu-button"),
            connected_sites: data_testid("global-menu-connected-sites"),
            product_tour_dismiss: Locator::css(".multichain-product-tour-menu__button"),
            back_button: Locator::css("[aria-label='Back']"),
            connect_confirm: data_testid("confirm-btn"),

            network_display: data_testid("network-display"),
            network_list_item: Locator::css(".multichain-network-list-item"),
            show_test_networks: Locator::css(".multichain-network-list-menu-content-wrapper .toggle-button"),
            network_switch_confirm: Locator::css("button").with_text("Confirm"),

            activity_tab: data_testid("account-overview__activity-tab"),
            transaction_list_first: Locator::css(
                "[class='mm-box transaction-list__transactions'] > div:first-child",
            ),
            activity_item: data_testid("activity-list-item"),
            activity_item_action: data_testid("activity-list-item-action"),
            activity_item_status: Locator::css(".transaction-status-label"),
            status_class_prefix: ".transaction-status-label--".to_string(),
            confirm_footer: data_testid("confirm-footer-button"),
            cancel_footer: data_testid("confirm-footer-cancel-button"),

            onboarding_terms: data_testid("onboarding-terms-checkbox"),
            onboarding_import: data_testid("onboarding-import-wallet"),
            metametrics_decline: data_testid("metametrics-no-thanks"),
            srp_word_template: "[data-testid='import-srp__srp-word-{index}']".to_string(),
            srp_confirm: data_testid("import-srp-confirm"),
            password_new: data_testid("create-password-new"),
            password_confirm: data_testid("create-password-confirm"),
            password_terms: data_testid("create-password-terms"),
            password_import: data_testid("create-password-import"),
            onboarding_done: data_testid("onboarding-complete-done"),
            pin_extension_next: data_testid("pin-extension-next"),
            pin_extension_done: data_testid("pin-extension-done"),
            popover_close: data_testid("popover-close"),
        }
    }
}

impl WalletSelectors {
    pub fn srp_word(&self, index: usize) -> Locator {
        Locator::css(self.srp_word_template.replace("{index}", &index.to_string()))
    }

    /// Status marker for a transaction in the given state, e.g.
    /// `.transaction-status-label--unapproved`.
    pub fn status_marker(&self, status_class: &str) -> Locator {
        Locator::css(format!("{}{}", self.status_class_prefix, status_class))
    }
}

/// Both halves of the page-object model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorMap {
    pub app: AppSelectors,
    pub wallet: WalletSelectors,
}

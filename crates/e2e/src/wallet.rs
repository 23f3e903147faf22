//! Wallet action bridge
//!
//! Domain-level wallet operations, each a fixed choreography across the two
//! surfaces. Every operation ends at a named [`SyncPoint`] so the log shows
//! where the application actor and the wallet actor met.
//!
//! ```text
//!   dApp tab                          extension tab
//!   ────────                          ─────────────
//!   request accounts ───────────────▶ menu → permissions → (tour?) → back → confirm
//!                    ◀─────────────── ConnectionGranted
//!   click "switch network" ─────────▶ confirm
//!   banner absent?   ◀─────────────── NetworkSwitched
//!   click deposit ──────────────────▶ spending cap confirm
//!                                     activity → poll "Deposit"+"Unapproved" → open → confirm
//!                    ◀─────────────── TransactionApproved
//! ```

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::DappPage;
use crate::config::Timings;
use crate::driver::{PageHandle, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::poller::PollCondition;
use crate::selectors::{Locator, WalletSelectors};
use crate::tabs::TabRegistry;

/// The wallet collaborator: seed import, network switching and the
/// extension's own approve/reject controls.
#[async_trait]
pub trait WalletDriver: Send + Sync {
    async fn setup(&self, seed: &SecretString) -> E2eResult<()>;

    async fn switch_network(&self, network: &str) -> E2eResult<()>;

    async fn confirm_transaction(&self) -> E2eResult<()>;

    async fn reject(&self) -> E2eResult<()>;

    /// The extension's own page, for direct DOM interaction
    fn page(&self) -> &PageHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Unapproved,
    Approved,
    Rejected,
    Confirmed,
}

impl TransactionStatus {
    /// Text the activity list shows for this status
    pub fn label(&self) -> &'static str {
        match self {
            TransactionStatus::Unapproved => "Unapproved",
            TransactionStatus::Approved => "Approved",
            TransactionStatus::Rejected => "Rejected",
            TransactionStatus::Confirmed => "Confirmed",
        }
    }

    /// Suffix of the status label's CSS modifier class
    pub fn css_class(&self) -> &'static str {
        match self {
            TransactionStatus::Unapproved => "unapproved",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the two actors synchronise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPoint {
    ConnectionGranted,
    NetworkSwitched,
    TransactionApproved,
    TransactionRejected,
}

impl fmt::Display for SyncPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPoint::ConnectionGranted => "connection granted",
            SyncPoint::NetworkSwitched => "network switched",
            SyncPoint::TransactionApproved => "transaction approved",
            SyncPoint::TransactionRejected => "transaction rejected",
        };
        f.write_str(s)
    }
}

/// An activity-list entry matched by kind and status on the same element
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    pub kind: String,
    pub status: TransactionStatus,
    /// Locates exactly the matched entry
    pub entry: Locator,
    /// Attempt of the poll that found it
    pub found_on_attempt: u32,
}

pub struct WalletBridge {
    wallet: Arc<dyn WalletDriver>,
    tabs: TabRegistry,
    selectors: WalletSelectors,
    timings: Timings,
}

impl WalletBridge {
    pub fn new(
        wallet: Arc<dyn WalletDriver>,
        tabs: TabRegistry,
        selectors: WalletSelectors,
        timings: Timings,
    ) -> Self {
        Self {
            wallet,
            tabs,
            selectors,
            timings,
        }
    }

    fn reached(&self, point: SyncPoint) -> SyncPoint {
        info!("Sync point reached: {}", point);
        point
    }

    /// Approve the dApp's pending connection request, then return focus to
    /// the application tab.
    pub async fn grant_connection(&self) -> E2eResult<SyncPoint> {
        let ext = self.tabs.focus_extension().await?;
        let wait = self.timings.element_timeout();
        let s = &self.selectors;

        ext.click_when_visible(&s.account_options_menu, wait).await?;
        info!("Opened wallet menu");

        ext.click_when_visible(&s.connected_sites, wait).await?;
        info!("Navigated to permissions");

        if ext.is_visible(&s.product_tour_dismiss).await? {
            ext.click(&s.product_tour_dismiss).await?;
            info!("Dismissed product tour");
        } else {
            warn!("No product tour shown; continuing");
        }

        ext.click_when_visible(&s.back_button, wait).await?;
        info!("Navigated back to connection prompt");

        ext.click_when_visible(&s.connect_confirm, wait).await?;
        info!("Connection confirmed in wallet");

        self.tabs.focus_application().await?;
        Ok(self.reached(SyncPoint::ConnectionGranted))
    }

    /// Confirm a network switch the dApp requested and verify the dApp's
    /// network banner is gone.
    ///
    /// Success is the *absence* of the error banner; no positive signal
    /// exists, so a dApp that never rendered the banner also passes here.
    pub async fn confirm_network_switch(&self, app: &DappPage) -> E2eResult<SyncPoint> {
        let ext = self.tabs.focus_extension().await?;
        ext.click_when_visible(&self.selectors.network_switch_confirm, self.timings.element_timeout())
            .await?;
        info!("Network switch confirmed in wallet");

        if !app.network_error_absent().await? {
            return Err(E2eError::assertion(
                "network error banner after switch",
                "not visible",
                "visible",
            ));
        }
        Ok(self.reached(SyncPoint::NetworkSwitched))
    }

    /// Trigger the switch from the dApp, then confirm it in the wallet.
    pub async fn switch_network(&self, app: &DappPage, target: &str) -> E2eResult<SyncPoint> {
        info!("Switching dApp to {}", target);
        app.click_switch_network().await?;
        self.confirm_network_switch(app).await
    }

    pub async fn confirm_transaction(&self) -> E2eResult<()> {
        self.wallet.confirm_transaction().await?;
        info!("Transaction confirmed in wallet");
        Ok(())
    }

    pub async fn reject(&self) -> E2eResult<SyncPoint> {
        self.wallet.reject().await?;
        Ok(self.reached(SyncPoint::TransactionRejected))
    }

    /// Locator for an activity entry carrying both the `kind` action label
    /// and the `status` marker.
    pub fn entry_locator(&self, kind: &str, status: TransactionStatus) -> Locator {
        let s = &self.selectors;
        s.activity_item
            .clone()
            .has(s.activity_item_action.clone().with_text(kind))
            .has(s.status_marker(status.css_class()))
            .first()
    }

    /// Poll the activity list until one entry is both `kind` and
    /// unapproved. Label and status are checked on the same element in the
    /// same attempt.
    pub async fn find_unapproved_transaction(
        &self,
        ext: &PageHandle,
        kind: &str,
    ) -> E2eResult<TransactionHandle> {
        let status = TransactionStatus::Unapproved;
        let entry = self.entry_locator(kind, status);
        let poll = PollCondition::new(
            format!("'{kind} - {status}' transaction"),
            self.timings.tx_poll_interval(),
            self.timings.tx_poll_attempts,
        );

        let locator = &entry;
        let attempt = poll
            .wait_until(move || async move { ext.is_visible(locator).await })
            .await?;

        info!("{} transaction found on attempt {}", kind, attempt);
        Ok(TransactionHandle {
            kind: kind.to_string(),
            status,
            entry,
            found_on_attempt: attempt,
        })
    }

    /// Re-read the matched entry and require its action and status text to
    /// be exactly the expected literals.
    pub async fn validate(&self, ext: &PageHandle, handle: &TransactionHandle) -> E2eResult<()> {
        let s = &self.selectors;
        let action = ext
            .text(&s.activity_item_action.clone().within(handle.entry.clone()))
            .await?;
        let status = ext
            .text(&s.activity_item_status.clone().within(handle.entry.clone()))
            .await?;

        if action.trim() != handle.kind || status.trim() != handle.status.label() {
            return Err(E2eError::Mismatch {
                expected: format!("'{}' - '{}'", handle.kind, handle.status),
                actual: format!("'{}' - '{}'", action.trim(), status.trim()),
            });
        }
        Ok(())
    }

    /// Open the matched entry and click the detail view's confirm control.
    pub async fn approve(&self, ext: &PageHandle, handle: &TransactionHandle) -> E2eResult<SyncPoint> {
        ext.click(&handle.entry).await?;
        info!("Opened {} transaction details", handle.kind);

        ext.click_when_visible(&self.selectors.confirm_footer, self.timings.confirm_footer_timeout())
            .await?;
        Ok(self.reached(SyncPoint::TransactionApproved))
    }

    /// Full activity-tab approval of the pending `kind` transaction.
    ///
    /// The activity list lives on the wallet's home page, so that tab is
    /// focused rather than whichever extension popup happens to be open.
    pub async fn approve_pending(&self, kind: &str) -> E2eResult<SyncPoint> {
        let ext = self.wallet.page().clone();
        self.tabs.focus(ext.tab()).await?;
        let s = &self.selectors;

        ext.click_when_visible(&s.activity_tab, self.timings.element_timeout())
            .await?;
        ext.wait_for(&s.transaction_list_first, WaitState::Visible, self.timings.activity_list_timeout())
            .await?;

        let handle = self.find_unapproved_transaction(&ext, kind).await?;
        self.validate(&ext, &handle).await?;
        self.approve(&ext, &handle).await
    }
}

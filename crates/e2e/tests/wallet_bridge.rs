//! Wallet choreography over a scripted browser

mod support;

use std::sync::Arc;
use std::time::Duration;

use support::*;
use walletflow_e2e::app::DappPage;
use walletflow_e2e::config::Timings;
use walletflow_e2e::driver::TabId;
use walletflow_e2e::error::E2eError;
use walletflow_e2e::selectors::{AppSelectors, WalletSelectors};
use walletflow_e2e::wallet::{SyncPoint, TransactionStatus, WalletBridge};

fn activity_entry(kind: &str, status: TransactionStatus) -> FakeElement {
    let s = WalletSelectors::default();
    FakeElement::of(&s.activity_item)
        .child(FakeElement::of(&s.activity_item_action).text(kind))
        .child(
            FakeElement::of(&s.activity_item_status)
                .also(s.status_marker(status.css_class()).css)
                .text(status.label()),
        )
}

struct Fixture {
    browser: Arc<FakeBrowser>,
    app: TabId,
    ext: TabId,
    bridge: WalletBridge,
}

fn fixture(ext_dom: Vec<FakeElement>, app_dom: Vec<FakeElement>) -> Fixture {
    let browser = FakeBrowser::new();
    let ext = browser.add_tab(EXTENSION_URL, ext_dom);
    let app = browser.add_tab(APP_URL, app_dom);
    let bridge = WalletBridge::new(
        Arc::new(FakeWallet::new(page(&browser, &ext))),
        registry(&browser),
        WalletSelectors::default(),
        Timings::default(),
    );
    Fixture {
        browser,
        app,
        ext,
        bridge,
    }
}

fn connection_prompt(with_tour: bool) -> Vec<FakeElement> {
    let s = WalletSelectors::default();
    let mut dom = vec![
        FakeElement::of(&s.account_options_menu),
        FakeElement::of(&s.connected_sites),
        FakeElement::of(&s.back_button),
        FakeElement::of(&s.connect_confirm),
    ];
    if with_tour {
        dom.push(FakeElement::of(&s.product_tour_dismiss).text("Got it"));
    }
    dom
}

#[tokio::test(start_paused = true)]
async fn test_unapproved_deposit_is_found_once_it_appears() {
    let f = fixture(
        vec![
            activity_entry("Approve spending cap", TransactionStatus::Unapproved),
            activity_entry("Deposit", TransactionStatus::Confirmed),
        ],
        vec![],
    );
    let ext = f.ext.clone();
    f.browser.after_queries(3, move |state| {
        state.insert(&ext, activity_entry("Deposit", TransactionStatus::Unapproved));
    });

    let started = tokio::time::Instant::now();
    let handle = f
        .bridge
        .find_unapproved_transaction(&page(&f.browser, &f.ext), "Deposit")
        .await
        .unwrap();

    assert_eq!(handle.found_on_attempt, 4);
    assert_eq!(handle.status, TransactionStatus::Unapproved);
    assert_eq!(started.elapsed(), Duration::from_secs(6));

    f.bridge
        .validate(&page(&f.browser, &f.ext), &handle)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_label_and_status_must_belong_to_the_same_entry() {
    // "Deposit" is visible and an "Unapproved" marker is visible, but never
    // on the same entry.
    let f = fixture(
        vec![
            activity_entry("Approve spending cap", TransactionStatus::Unapproved),
            activity_entry("Deposit", TransactionStatus::Confirmed),
        ],
        vec![],
    );

    let started = tokio::time::Instant::now();
    let err = f
        .bridge
        .find_unapproved_transaction(&page(&f.browser, &f.ext), "Deposit")
        .await
        .unwrap_err();

    match err {
        E2eError::Timeout {
            description,
            attempts,
        } => {
            assert_eq!(attempts, 15);
            assert!(description.contains("Deposit"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(started.elapsed(), Duration::from_secs(28));
}

#[tokio::test]
async fn test_validate_reports_mismatch_for_inexact_label() {
    let f = fixture(
        vec![activity_entry("Deposit to vault", TransactionStatus::Unapproved)],
        vec![],
    );
    let ext = page(&f.browser, &f.ext);

    let handle = f.bridge.find_unapproved_transaction(&ext, "Deposit").await.unwrap();
    let err = f.bridge.validate(&ext, &handle).await.unwrap_err();

    match err {
        E2eError::Mismatch { expected, actual } => {
            assert_eq!(expected, "'Deposit' - 'Unapproved'");
            assert_eq!(actual, "'Deposit to vault' - 'Unapproved'");
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_approve_pending_opens_entry_and_confirms() {
    let s = WalletSelectors::default();
    let f = fixture(
        vec![
            FakeElement::of(&s.activity_tab),
            FakeElement::of(&s.transaction_list_first),
            activity_entry("Approve spending cap", TransactionStatus::Confirmed),
            activity_entry("Deposit", TransactionStatus::Unapproved),
        ],
        vec![],
    );
    let ext = f.ext.clone();
    let footer = FakeElement::of(&s.confirm_footer).text("Confirm");
    f.browser.on_click(&f.ext, &s.activity_item.css, move |state| {
        state.insert(&ext, footer);
    });

    let point = f.bridge.approve_pending("Deposit").await.unwrap();

    assert_eq!(point, SyncPoint::TransactionApproved);
    assert_eq!(f.browser.front(), Some(f.ext.clone()));
    let actions = f.browser.actions();
    let tab_click = actions.iter().position(|a| a.ends_with(&s.activity_tab.css)).unwrap();
    let entry_click = actions.iter().position(|a| a.ends_with(&s.activity_item.css)).unwrap();
    let confirm_click = actions.iter().position(|a| a.ends_with(&s.confirm_footer.css)).unwrap();
    assert!(tab_click < entry_click && entry_click < confirm_click);
}

#[tokio::test]
async fn test_grant_connection_dismisses_tour_and_returns_to_app() {
    let f = fixture(connection_prompt(true), vec![]);
    let s = WalletSelectors::default();

    let point = f.bridge.grant_connection().await.unwrap();

    assert_eq!(point, SyncPoint::ConnectionGranted);
    assert!(f.browser.clicked(&s.product_tour_dismiss.css));
    assert!(f.browser.clicked(&s.connect_confirm.css));
    assert_eq!(f.browser.front(), Some(f.app.clone()));
}

#[tokio::test]
async fn test_grant_connection_without_tour_still_succeeds() {
    let f = fixture(connection_prompt(false), vec![]);
    let s = WalletSelectors::default();

    f.bridge.grant_connection().await.unwrap();

    assert!(!f.browser.clicked(&s.product_tour_dismiss.css));
    assert!(f.browser.clicked(&s.back_button.css));
    assert!(f.browser.clicked(&s.connect_confirm.css));
    assert_eq!(f.browser.front(), Some(f.app.clone()));
}

#[tokio::test(start_paused = true)]
async fn test_network_switch_succeeds_when_banner_disappears() {
    let a = AppSelectors::default();
    let s = WalletSelectors::default();
    let f = fixture(
        vec![FakeElement::new("button").text("Confirm")],
        vec![
            FakeElement::of(&a.network_error).text("wrong network"),
            FakeElement::of(&a.switch_network_button).text("Connect Metamask to Sepolia"),
        ],
    );
    let app_tab = f.app.clone();
    let banner = a.network_error.css.clone();
    f.browser.on_click(&f.ext, &s.network_switch_confirm.css, move |state| {
        state.remove(&app_tab, &banner);
    });
    let app = DappPage::new(page(&f.browser, &f.app), a, Timings::default());

    let point = f.bridge.switch_network(&app, "Sepolia").await.unwrap();

    assert_eq!(point, SyncPoint::NetworkSwitched);
    assert!(f.browser.clicked(&app.selectors().switch_network_button.css));
}

#[tokio::test(start_paused = true)]
async fn test_network_switch_fails_while_banner_stays() {
    let a = AppSelectors::default();
    let f = fixture(
        vec![FakeElement::new("button").text("Confirm")],
        vec![FakeElement::of(&a.network_error).text("wrong network")],
    );
    let app = DappPage::new(page(&f.browser, &f.app), a, Timings::default());

    let started = tokio::time::Instant::now();
    let err = f.bridge.confirm_network_switch(&app).await.unwrap_err();

    assert!(matches!(err, E2eError::AssertionFailed { ref actual, .. } if actual == "visible"));
    // Bounded by the short absence check, not the element timeout.
    assert!(started.elapsed() <= Duration::from_secs(3));
}

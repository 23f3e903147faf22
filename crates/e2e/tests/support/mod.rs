//! Scripted in-memory browser for driving the choreography without Chromium.
//!
//! Each tab holds a small element tree. Elements answer to one or more CSS
//! strings by exact comparison, so a test states which selectors an element
//! satisfies instead of relying on a CSS engine. Triggers mutate the state
//! when an element is clicked or after a number of element queries, which
//! stands in for the extension and the dApp reacting over time.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;

use walletflow_e2e::config::HarnessConfig;
use walletflow_e2e::driver::{BrowserDriver, PageHandle, TabId};
use walletflow_e2e::error::{E2eError, E2eResult};
use walletflow_e2e::selectors::Locator;
use walletflow_e2e::session::{LaunchedBrowser, Launcher};
use walletflow_e2e::wallet::WalletDriver;

pub const APP_URL: &str = "https://localhost:3000";
pub const EXTENSION_URL: &str = "chrome-extension://abcdef/home.html";
pub const SEED: &str = "test test test test test test test test test test test junk";

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub selectors: Vec<String>,
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    pub value: String,
    pub children: Vec<FakeElement>,
}

impl FakeElement {
    pub fn new(css: impl Into<String>) -> Self {
        Self {
            selectors: vec![css.into()],
            text: String::new(),
            visible: true,
            enabled: true,
            value: String::new(),
            children: Vec::new(),
        }
    }

    /// Element matched by `locator`'s CSS
    pub fn of(locator: &Locator) -> Self {
        Self::new(locator.css.clone())
    }

    /// Also answer to `css`
    pub fn also(mut self, css: impl Into<String>) -> Self {
        self.selectors.push(css.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn child(mut self, child: FakeElement) -> Self {
        self.children.push(child);
        self
    }

    fn inner_text(&self) -> String {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(self.text.clone());
        }
        parts.extend(self.children.iter().map(FakeElement::inner_text).filter(|t| !t.is_empty()));
        parts.join("\n")
    }
}

fn collect<'a>(nodes: &'a [FakeElement], out: &mut Vec<&'a FakeElement>) {
    for node in nodes {
        out.push(node);
        collect(&node.children, out);
    }
}

/// Same resolution rules as the in-page resolver of the Chromium driver.
fn resolve<'a>(locator: &Locator, scope: &'a [FakeElement]) -> Vec<&'a FakeElement> {
    let roots: Vec<&'a [FakeElement]> = match &locator.within {
        Some(parent) => resolve(parent, scope)
            .into_iter()
            .take(1)
            .map(|e| e.children.as_slice())
            .collect(),
        None => vec![scope],
    };

    let mut all = Vec::new();
    for root in roots {
        collect(root, &mut all);
    }

    let mut matches: Vec<&FakeElement> = all
        .into_iter()
        .filter(|e| e.selectors.iter().any(|s| s == &locator.css))
        .collect();
    if let Some(text) = &locator.has_text {
        matches.retain(|e| e.inner_text().contains(text.as_str()));
    }
    for inner in &locator.has {
        matches.retain(|e| !resolve(inner, &e.children).is_empty());
    }
    if let Some(n) = locator.nth {
        matches = matches.into_iter().nth(n).into_iter().collect();
    }
    matches
}

fn find_mut<'a>(nodes: &'a mut [FakeElement], css: &str) -> Option<&'a mut FakeElement> {
    for node in nodes {
        if node.selectors.iter().any(|s| s == css) {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, css) {
            return Some(found);
        }
    }
    None
}

fn remove(nodes: &mut Vec<FakeElement>, css: &str) -> bool {
    if let Some(i) = nodes.iter().position(|n| n.selectors.iter().any(|s| s == css)) {
        nodes.remove(i);
        return true;
    }
    nodes.iter_mut().any(|n| remove(&mut n.children, css))
}

#[derive(Debug, Clone)]
pub struct FakeTab {
    pub id: TabId,
    pub url: String,
    pub dom: Vec<FakeElement>,
    pub eval_result: Value,
}

type Mutation = Box<dyn FnOnce(&mut FakeState) + Send>;

enum Trigger {
    Click { tab: TabId, css: String },
    Queries(u32),
}

#[derive(Default)]
pub struct FakeState {
    pub tabs: Vec<FakeTab>,
    pub front: Option<TabId>,
    /// `front <tab>`, `click <tab> <css>`, `fill <tab> <css>=<value>`, ...
    pub actions: Vec<String>,
    pub closed: bool,
    pub fail_screenshots: bool,
    queries: u32,
    triggers: Vec<(Trigger, Mutation)>,
    next_tab: u32,
}

impl FakeState {
    pub fn tab_mut(&mut self, id: &TabId) -> Option<&mut FakeTab> {
        self.tabs.iter_mut().find(|t| &t.id == id)
    }

    /// Append `element` to the top level of `tab`
    pub fn insert(&mut self, tab: &TabId, element: FakeElement) {
        if let Some(t) = self.tab_mut(tab) {
            t.dom.push(element);
        }
    }

    /// Append `element` under the first element answering to `parent`
    pub fn insert_into(&mut self, tab: &TabId, parent: &str, element: FakeElement) {
        if let Some(t) = self.tab_mut(tab) {
            if let Some(p) = find_mut(&mut t.dom, parent) {
                p.children.push(element);
            }
        }
    }

    pub fn remove(&mut self, tab: &TabId, css: &str) {
        if let Some(t) = self.tab_mut(tab) {
            remove(&mut t.dom, css);
        }
    }

    pub fn set_text(&mut self, tab: &TabId, css: &str, text: &str) {
        if let Some(t) = self.tab_mut(tab) {
            if let Some(e) = find_mut(&mut t.dom, css) {
                e.text = text.to_string();
            }
        }
    }

    pub fn value_of(&self, tab: &TabId, css: &str) -> Option<String> {
        let t = self.tabs.iter().find(|t| &t.id == tab)?;
        let mut all = Vec::new();
        collect(&t.dom, &mut all);
        all.into_iter()
            .find(|e| e.selectors.iter().any(|s| s == css))
            .map(|e| e.value.clone())
    }

    fn fire(&mut self, happened: impl Fn(&Trigger) -> bool) {
        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.triggers)
            .into_iter()
            .partition(|(t, _)| happened(t));
        self.triggers = pending;
        for (_, mutation) in ready {
            mutation(self);
        }
    }

    fn query(&mut self) {
        self.queries += 1;
        let n = self.queries;
        self.fire(|t| matches!(t, Trigger::Queries(q) if *q <= n));
    }
}

#[derive(Default)]
pub struct FakeBrowser {
    pub state: Mutex<FakeState>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_tab(&self, url: &str, dom: Vec<FakeElement>) -> TabId {
        let mut state = self.state.lock();
        state.next_tab += 1;
        let id = TabId(format!("tab-{}", state.next_tab));
        state.tabs.push(FakeTab {
            id: id.clone(),
            url: url.to_string(),
            dom,
            eval_result: Value::Null,
        });
        id
    }

    /// Run `mutation` the first time the element answering to `css` is
    /// clicked in `tab`
    pub fn on_click(&self, tab: &TabId, css: &str, mutation: impl FnOnce(&mut FakeState) + Send + 'static) {
        self.state.lock().triggers.push((
            Trigger::Click {
                tab: tab.clone(),
                css: css.to_string(),
            },
            Box::new(mutation),
        ));
    }

    /// Run `mutation` once `n` element queries have been made
    pub fn after_queries(&self, n: u32, mutation: impl FnOnce(&mut FakeState) + Send + 'static) {
        self.state
            .lock()
            .triggers
            .push((Trigger::Queries(n), Box::new(mutation)));
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn clicked(&self, css: &str) -> bool {
        self.state
            .lock()
            .actions
            .iter()
            .any(|a| a.starts_with("click ") && a.ends_with(css))
    }

    pub fn front(&self) -> Option<TabId> {
        self.state.lock().front.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn with_tab<R>(&self, tab: &TabId, f: impl FnOnce(&mut FakeState, usize) -> E2eResult<R>) -> E2eResult<R> {
        let mut state = self.state.lock();
        let index = state
            .tabs
            .iter()
            .position(|t| &t.id == tab)
            .ok_or_else(|| E2eError::TabNotFound(format!("tab {tab} is no longer open")))?;
        f(&mut state, index)
    }

    fn missing(locator: &Locator) -> E2eError {
        E2eError::Browser(format!("element not found: {locator}"))
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn tabs(&self) -> E2eResult<Vec<TabId>> {
        Ok(self.state.lock().tabs.iter().map(|t| t.id.clone()).collect())
    }

    async fn tab_url(&self, tab: &TabId) -> E2eResult<String> {
        self.with_tab(tab, |state, i| Ok(state.tabs[i].url.clone()))
    }

    async fn open_tab(&self, url: &str) -> E2eResult<TabId> {
        let id = self.add_tab(url, Vec::new());
        self.state.lock().actions.push(format!("open {id} {url}"));
        Ok(id)
    }

    async fn bring_to_front(&self, tab: &TabId) -> E2eResult<()> {
        self.with_tab(tab, |state, _| {
            state.front = Some(tab.clone());
            state.actions.push(format!("front {tab}"));
            Ok(())
        })
    }

    async fn goto(&self, tab: &TabId, url: &str) -> E2eResult<()> {
        self.with_tab(tab, |state, i| {
            state.tabs[i].url = url.to_string();
            state.actions.push(format!("goto {tab} {url}"));
            Ok(())
        })
    }

    async fn reload(&self, tab: &TabId) -> E2eResult<()> {
        self.with_tab(tab, |state, _| {
            state.actions.push(format!("reload {tab}"));
            Ok(())
        })
    }

    async fn evaluate(&self, tab: &TabId, _script: &str) -> E2eResult<Value> {
        self.with_tab(tab, |state, i| Ok(state.tabs[i].eval_result.clone()))
    }

    async fn count(&self, tab: &TabId, locator: &Locator) -> E2eResult<usize> {
        self.with_tab(tab, |state, i| {
            let n = resolve(locator, &state.tabs[i].dom).len();
            state.query();
            Ok(n)
        })
    }

    async fn is_visible(&self, tab: &TabId, locator: &Locator) -> E2eResult<bool> {
        self.with_tab(tab, |state, i| {
            let visible = resolve(locator, &state.tabs[i].dom)
                .first()
                .map(|e| e.visible)
                .unwrap_or(false);
            state.query();
            Ok(visible)
        })
    }

    async fn is_enabled(&self, tab: &TabId, locator: &Locator) -> E2eResult<bool> {
        self.with_tab(tab, |state, i| {
            resolve(locator, &state.tabs[i].dom)
                .first()
                .map(|e| e.enabled)
                .ok_or_else(|| Self::missing(locator))
        })
    }

    async fn inner_text(&self, tab: &TabId, locator: &Locator) -> E2eResult<Option<String>> {
        self.with_tab(tab, |state, i| {
            Ok(resolve(locator, &state.tabs[i].dom)
                .first()
                .map(|e| e.inner_text()))
        })
    }

    async fn click(&self, tab: &TabId, locator: &Locator) -> E2eResult<()> {
        self.with_tab(tab, |state, i| {
            let css = {
                let found = resolve(locator, &state.tabs[i].dom);
                let element = found.first().ok_or_else(|| Self::missing(locator))?;
                element.selectors[0].clone()
            };
            state.actions.push(format!("click {tab} {}", locator.css));
            state.fire(|t| matches!(t, Trigger::Click { tab: t_tab, css: c } if t_tab == tab && (c == &css || c == &locator.css)));
            Ok(())
        })
    }

    async fn fill(&self, tab: &TabId, locator: &Locator, value: &str) -> E2eResult<()> {
        self.with_tab(tab, |state, i| {
            if resolve(locator, &state.tabs[i].dom).is_empty() {
                return Err(Self::missing(locator));
            }
            if let Some(e) = find_mut(&mut state.tabs[i].dom, &locator.css) {
                e.value = value.to_string();
            }
            state.actions.push(format!("fill {tab} {}={}", locator.css, value));
            Ok(())
        })
    }

    async fn screenshot(&self, tab: &TabId) -> E2eResult<Vec<u8>> {
        self.with_tab(tab, |state, _| {
            if state.fail_screenshots {
                return Err(E2eError::Browser("screenshot failed".to_string()));
            }
            Ok(b"\x89PNG fake".to_vec())
        })
    }

    async fn close(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.closed = true;
        state.actions.push("close".to_string());
        Ok(())
    }
}

/// Wallet collaborator that records calls instead of clicking through
/// onboarding.
pub struct FakeWallet {
    page: PageHandle,
    pub calls: Mutex<Vec<String>>,
    pub fail_setup: bool,
}

impl FakeWallet {
    pub fn new(page: PageHandle) -> Self {
        Self {
            page,
            calls: Mutex::new(Vec::new()),
            fail_setup: false,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl WalletDriver for FakeWallet {
    async fn setup(&self, seed: &SecretString) -> E2eResult<()> {
        if self.fail_setup {
            return Err(E2eError::Wallet("onboarding screen changed".to_string()));
        }
        let words = seed.expose_secret().split_whitespace().count();
        self.calls.lock().push(format!("setup {words} words"));
        Ok(())
    }

    async fn switch_network(&self, network: &str) -> E2eResult<()> {
        self.calls.lock().push(format!("switch_network {network}"));
        Ok(())
    }

    async fn confirm_transaction(&self) -> E2eResult<()> {
        self.calls.lock().push("confirm_transaction".to_string());
        Ok(())
    }

    async fn reject(&self) -> E2eResult<()> {
        self.calls.lock().push("reject".to_string());
        Ok(())
    }

    fn page(&self) -> &PageHandle {
        &self.page
    }
}

/// Hands out the same fake browser and wallet on every launch
pub struct FakeLauncher {
    pub browser: Arc<FakeBrowser>,
    pub wallet: Arc<FakeWallet>,
    pub launches: Mutex<u32>,
}

impl FakeLauncher {
    pub fn new(browser: Arc<FakeBrowser>, wallet: FakeWallet) -> Arc<Self> {
        Arc::new(Self {
            browser,
            wallet: Arc::new(wallet),
            launches: Mutex::new(0),
        })
    }

    pub fn launches(&self) -> u32 {
        *self.launches.lock()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, _config: &HarnessConfig) -> E2eResult<LaunchedBrowser> {
        *self.launches.lock() += 1;
        Ok(LaunchedBrowser {
            driver: self.browser.clone(),
            wallet: self.wallet.clone(),
        })
    }
}

/// Browser with an extension tab and a blank tab, plus a wallet bound to the
/// extension tab. Returns `(browser, extension tab, blank tab, wallet)`.
pub fn browser_with_wallet() -> (Arc<FakeBrowser>, TabId, TabId, FakeWallet) {
    let browser = FakeBrowser::new();
    let ext = browser.add_tab(EXTENSION_URL, Vec::new());
    let blank = browser.add_tab("about:blank", Vec::new());
    let wallet = FakeWallet::new(page(&browser, &ext));
    (browser, ext, blank, wallet)
}

/// Default config with a seed, writing artifacts to the temp dir
pub fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.seed = Some(SecretString::from(SEED.to_string()));
    config.app_url = APP_URL.to_string();
    config.output_dir = std::env::temp_dir().join("walletflow-e2e-tests");
    config
}

pub fn page(browser: &Arc<FakeBrowser>, tab: &TabId) -> PageHandle {
    let driver: Arc<dyn BrowserDriver> = browser.clone();
    PageHandle::new(driver, tab.clone())
}

pub fn registry(browser: &Arc<FakeBrowser>) -> walletflow_e2e::tabs::TabRegistry {
    let driver: Arc<dyn BrowserDriver> = browser.clone();
    walletflow_e2e::tabs::TabRegistry::new(driver, "localhost")
}

//! Chromium implementation of [`BrowserDriver`] over the DevTools protocol
//!
//! Element queries run as small scripts in the page: the [`Locator`] is
//! serialized to JSON and resolved by `resolve()` below, so text filters,
//! descendant requirements and scoping behave identically for every
//! operation.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{BrowserSettings, HarnessConfig};
use crate::driver::{BrowserDriver, PageHandle, TabId};
use crate::error::{E2eError, E2eResult};
use crate::metamask::MetaMaskWallet;
use crate::poller::PollCondition;
use crate::selectors::Locator;
use crate::session::{LaunchedBrowser, Launcher};
use crate::tabs::{TabPattern, TabRegistry};

const EXTENSION_TAB_POLL: Duration = Duration::from_millis(500);

const LOCATOR_PRELUDE: &str = r#"
const textOf = (el) => (el.innerText ?? el.textContent ?? "");
const resolve = (loc, scope) => {
  const roots = loc.within ? resolve(loc.within, scope).slice(0, 1) : [scope];
  let els = roots.flatMap((root) => Array.from(root.querySelectorAll(loc.css)));
  if (loc.has_text != null) {
    els = els.filter((el) => textOf(el).includes(loc.has_text));
  }
  for (const inner of loc.has || []) {
    els = els.filter((el) => resolve(inner, el).length > 0);
  }
  if (loc.nth != null) {
    els = els.length > loc.nth ? [els[loc.nth]] : [];
  }
  return els;
};
const isVisible = (el) => {
  if (!el) return false;
  const style = window.getComputedStyle(el);
  if (style.visibility === "hidden" || style.display === "none") return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
};
const requireEl = (el, desc) => {
  if (!el) throw new Error("element not found: " + desc);
  return el;
};
"#;

/// Build a script resolving `locator` and running `op`, which sees `els`,
/// `el` (first match or null) and `desc`.
fn locator_script(locator: &Locator, op: &str) -> E2eResult<String> {
    let spec = serde_json::to_string(locator)?;
    let desc = serde_json::to_string(&locator.to_string())?;
    Ok(format!(
        "(() => {{\n{LOCATOR_PRELUDE}\nconst desc = {desc};\nconst els = resolve({spec}, document);\nconst el = els[0] ?? null;\n{op}\n}})()"
    ))
}

fn cdp(context: &str) -> impl Fn(chromiumoxide::error::CdpError) -> E2eError + '_ {
    move |e| E2eError::Browser(format!("{context}: {e}"))
}

pub struct ChromiumDriver {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    _profile: Option<tempfile::TempDir>,
}

impl ChromiumDriver {
    /// Launch Chromium with the unpacked extension at `extension` loaded.
    pub async fn launch(settings: &BrowserSettings, extension: &Path) -> E2eResult<Self> {
        let extension = extension.canonicalize().map_err(|e| {
            E2eError::Setup(format!("wallet extension not found at {}: {}", extension.display(), e))
        })?;
        let extension = extension.to_string_lossy().to_string();

        let (profile, profile_dir) = match &settings.user_data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                (None, dir.clone())
            }
            None => {
                let dir = tempfile::Builder::new().prefix("walletflow-profile").tempdir()?;
                let path = dir.path().to_path_buf();
                (Some(dir), path)
            }
        };

        let mut args = vec![
            "--disable-background-networking".to_string(),
            "--disable-background-timer-throttling".to_string(),
            "--disable-breakpad".to_string(),
            "--disable-client-side-phishing-detection".to_string(),
            "--disable-component-update".to_string(),
            "--disable-default-apps".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-hang-monitor".to_string(),
            "--disable-popup-blocking".to_string(),
            "--disable-prompt-on-repost".to_string(),
            "--disable-sync".to_string(),
            "--metrics-recording-only".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--password-store=basic".to_string(),
            "--use-mock-keychain".to_string(),
            format!("--disable-extensions-except={extension}"),
            format!("--load-extension={extension}"),
        ];
        if settings.ignore_https_errors {
            args.push("--ignore-certificate-errors".to_string());
        }

        let mut builder = BrowserConfig::builder()
            .disable_default_args()
            .args(args)
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(None)
            .user_data_dir(profile_dir)
            .launch_timeout(Duration::from_secs(20));

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| E2eError::Setup(format!("browser config error: {e}")))?;

        info!(headless = settings.headless, extension = %extension, "Launching Chromium");

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| E2eError::Setup(format!("failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            _profile: profile,
        })
    }

    async fn pages(&self) -> E2eResult<Vec<Page>> {
        let mut browser = self.browser.lock().await;
        // Pick up targets the extension opened before we attached.
        if let Err(e) = browser.fetch_targets().await {
            debug!("fetch_targets failed: {}", e);
        }
        browser.pages().await.map_err(cdp("listing tabs"))
    }

    async fn page(&self, tab: &TabId) -> E2eResult<Page> {
        self.pages()
            .await?
            .into_iter()
            .find(|page| page.target_id().inner() == &tab.0)
            .ok_or_else(|| E2eError::TabNotFound(format!("tab {tab} is no longer open")))
    }

    async fn evaluate_on(page: &Page, script: &str) -> E2eResult<Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(E2eError::Browser)?;
        let result = page
            .evaluate_expression(params)
            .await
            .map_err(cdp("evaluate"))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn run(&self, tab: &TabId, locator: &Locator, op: &str) -> E2eResult<Value> {
        let page = self.page(tab).await?;
        let script = locator_script(locator, op)?;
        Self::evaluate_on(&page, &script).await
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn tabs(&self) -> E2eResult<Vec<TabId>> {
        Ok(self
            .pages()
            .await?
            .iter()
            .map(|page| TabId(page.target_id().inner().clone()))
            .collect())
    }

    async fn tab_url(&self, tab: &TabId) -> E2eResult<String> {
        let page = self.page(tab).await?;
        let url = page.url().await.map_err(cdp("reading url"))?;
        Ok(url.unwrap_or_default())
    }

    async fn open_tab(&self, url: &str) -> E2eResult<TabId> {
        let browser = self.browser.lock().await;
        let page = browser.new_page(url).await.map_err(cdp("opening tab"))?;
        Ok(TabId(page.target_id().inner().clone()))
    }

    async fn bring_to_front(&self, tab: &TabId) -> E2eResult<()> {
        let page = self.page(tab).await?;
        page.bring_to_front().await.map_err(cdp("bringing tab to front"))?;
        Ok(())
    }

    async fn goto(&self, tab: &TabId, url: &str) -> E2eResult<()> {
        let page = self.page(tab).await?;
        page.goto(url).await.map_err(cdp("navigating"))?;
        Ok(())
    }

    async fn reload(&self, tab: &TabId) -> E2eResult<()> {
        let page = self.page(tab).await?;
        page.reload().await.map_err(cdp("reloading"))?;
        Ok(())
    }

    async fn evaluate(&self, tab: &TabId, script: &str) -> E2eResult<Value> {
        let page = self.page(tab).await?;
        Self::evaluate_on(&page, script).await
    }

    async fn count(&self, tab: &TabId, locator: &Locator) -> E2eResult<usize> {
        let value = self.run(tab, locator, "return els.length;").await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(&self, tab: &TabId, locator: &Locator) -> E2eResult<bool> {
        let value = self.run(tab, locator, "return isVisible(el);").await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, tab: &TabId, locator: &Locator) -> E2eResult<bool> {
        let value = self
            .run(
                tab,
                locator,
                r#"requireEl(el, desc);
return !el.disabled && el.getAttribute("aria-disabled") !== "true";"#,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn inner_text(&self, tab: &TabId, locator: &Locator) -> E2eResult<Option<String>> {
        let value = self.run(tab, locator, "return el ? textOf(el) : null;").await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self, tab: &TabId, locator: &Locator) -> E2eResult<()> {
        self.run(
            tab,
            locator,
            r#"requireEl(el, desc);
el.scrollIntoView({ block: "center" });
el.click();
return true;"#,
        )
        .await?;
        Ok(())
    }

    async fn fill(&self, tab: &TabId, locator: &Locator, value: &str) -> E2eResult<()> {
        let value = serde_json::to_string(value)?;
        let op = format!(
            r#"requireEl(el, desc);
const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
const setter = Object.getOwnPropertyDescriptor(proto, "value").set;
el.focus();
setter.call(el, {value});
el.dispatchEvent(new Event("input", {{ bubbles: true }}));
el.dispatchEvent(new Event("change", {{ bubbles: true }}));
return true;"#
        );
        self.run(tab, locator, &op).await?;
        Ok(())
    }

    async fn screenshot(&self, tab: &TabId) -> E2eResult<Vec<u8>> {
        let page = self.page(tab).await?;
        page.screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(cdp("screenshot"))
    }

    async fn close(&self) -> E2eResult<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("Browser close returned error: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Waiting for browser process failed: {}", e);
        }
        self.handler.abort();
        Ok(())
    }
}

/// Launches Chromium with the MetaMask extension and binds a
/// [`MetaMaskWallet`] to the extension's tab.
pub struct ChromiumLauncher;

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self, config: &HarnessConfig) -> E2eResult<LaunchedBrowser> {
        let extension = config.wallet.extension_path.as_ref().ok_or_else(|| {
            E2eError::Setup("WALLET_EXTENSION_PATH is not set".to_string())
        })?;

        let driver: Arc<dyn BrowserDriver> =
            Arc::new(ChromiumDriver::launch(&config.browser, extension).await?);

        let tabs = TabRegistry::new(driver.clone(), config.app_host()?);
        let poll = PollCondition::within(
            "wallet extension tab to open",
            config.timings.extension_tab_timeout(),
            EXTENSION_TAB_POLL,
        );
        let ext_tab = match tabs.wait_for(&TabPattern::ExtensionScheme, &poll).await {
            Ok(tab) => tab,
            Err(e) => {
                let _ = driver.close().await;
                return Err(E2eError::Setup(format!("extension tab not discoverable: {e}")));
            }
        };
        info!("Wallet extension loaded");

        let wallet = MetaMaskWallet::new(
            PageHandle::new(driver.clone(), ext_tab),
            config.selectors.wallet.clone(),
            config.timings.clone(),
            config.wallet.password.clone(),
        );

        Ok(LaunchedBrowser {
            driver,
            wallet: Arc::new(wallet),
        })
    }
}

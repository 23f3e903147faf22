//! Harness configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then the
//! environment (after `.env.local` / `.env` are loaded with dotenvy).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::selectors::SelectorMap;
use crate::server::ServerConfig;

pub const DEFAULT_APP_URL: &str = "https://localhost:3000";

/// Password the imported wallet is locked with. Only used inside the
/// throwaway browser profile.
pub const DEFAULT_WALLET_PASSWORD: &str = "password1234";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// URL of the dApp under test
    pub app_url: String,

    /// Wallet seed phrase; environment only, never serialized
    #[serde(skip)]
    pub seed: Option<SecretString>,

    pub wallet: WalletConfig,
    pub browser: BrowserSettings,
    pub timings: Timings,
    pub selectors: SelectorMap,
    pub server: ServerConfig,

    /// Where results and failure screenshots are written
    pub output_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            seed: None,
            wallet: WalletConfig::default(),
            browser: BrowserSettings::default(),
            timings: Timings::default(),
            selectors: SelectorMap::default(),
            server: ServerConfig::default(),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Unpacked MetaMask extension directory
    pub extension_path: Option<PathBuf>,

    #[serde(skip, default = "default_password")]
    pub password: SecretString,
}

fn default_password() -> SecretString {
    SecretString::from(DEFAULT_WALLET_PASSWORD)
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            extension_path: None,
            password: default_password(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub chrome_path: Option<PathBuf>,
    /// Extensions need a headed browser; headless is for smoke runs only
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Profile directory; a temporary one is created when unset
    pub user_data_dir: Option<PathBuf>,
    pub ignore_https_errors: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: false,
            viewport_width: 1280,
            viewport_height: 720,
            user_data_dir: None,
            ignore_https_errors: true,
        }
    }
}

/// Every wait bound in the harness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub element_timeout_ms: u64,
    pub absence_timeout_ms: u64,
    pub tx_poll_interval_ms: u64,
    pub tx_poll_attempts: u32,
    pub activity_list_timeout_ms: u64,
    pub confirm_footer_timeout_ms: u64,
    pub settle_ms: u64,
    pub extension_tab_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_timeout_ms: 5_000,
            absence_timeout_ms: 3_000,
            tx_poll_interval_ms: 2_000,
            tx_poll_attempts: 15,
            activity_list_timeout_ms: 20_000,
            confirm_footer_timeout_ms: 15_000,
            settle_ms: 12_000,
            extension_tab_timeout_ms: 30_000,
        }
    }
}

impl Timings {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn absence_timeout(&self) -> Duration {
        Duration::from_millis(self.absence_timeout_ms)
    }

    pub fn tx_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tx_poll_interval_ms)
    }

    pub fn activity_list_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_list_timeout_ms)
    }

    pub fn confirm_footer_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_footer_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn extension_tab_timeout(&self) -> Duration {
        Duration::from_millis(self.extension_tab_timeout_ms)
    }
}

impl HarnessConfig {
    /// Load configuration: defaults, then `path` (missing file is an error
    /// only when a path was given), then the process environment.
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        env_file(".env.local", dotenvy::from_filename(".env.local").map(|_| ()))?;
        env_file(".env", dotenvy::dotenv().map(|_| ()))?;

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        if !path.exists() {
            return Err(E2eError::Config(format!("config file not found: {}", path.display())));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment values looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(seed) = non_empty("WALLET_SEED").or_else(|| non_empty("METAMASK_SEED")) {
            self.seed = Some(SecretString::from(seed));
        }
        if let Some(password) = non_empty("WALLET_PASSWORD") {
            self.wallet.password = SecretString::from(password);
        }
        if let Some(url) = non_empty("APP_URL") {
            self.app_url = url;
        }
        if let Some(path) = non_empty("WALLET_EXTENSION_PATH") {
            self.wallet.extension_path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty("CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(headless) = non_empty("E2E_HEADLESS") {
            self.browser.headless = matches!(headless.trim(), "1" | "true" | "yes");
        }
    }

    /// Host part of the app URL, used to recognise the application tab.
    pub fn app_host(&self) -> E2eResult<String> {
        let url = reqwest::Url::parse(&self.app_url)
            .map_err(|e| E2eError::Config(format!("invalid APP_URL {}: {}", self.app_url, e)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| E2eError::Config(format!("APP_URL has no host: {}", self.app_url)))
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }
}

/// A missing dotenv file is fine; one that fails to parse is not.
fn env_file(name: &str, loaded: Result<(), dotenvy::Error>) -> E2eResult<()> {
    match loaded {
        Ok(()) => {
            debug!("Loaded environment from {}", name);
            Ok(())
        }
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(E2eError::Config(format!("could not load {name}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_documented_bounds() {
        let config = HarnessConfig::default();
        assert_eq!(config.app_url, DEFAULT_APP_URL);
        assert_eq!(config.timings.tx_poll_interval(), Duration::from_secs(2));
        assert_eq!(config.timings.tx_poll_attempts, 15);
        assert_eq!(config.timings.settle(), Duration::from_secs(12));
        assert!(!config.browser.headless);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_env_overrides_and_seed_alias() {
        let mut config = HarnessConfig::default();
        config.apply_env(env(&[
            ("METAMASK_SEED", "test test test"),
            ("APP_URL", "http://localhost:5173"),
            ("E2E_HEADLESS", "true"),
        ]));

        assert_eq!(config.seed.as_ref().unwrap().expose_secret(), "test test test");
        assert_eq!(config.app_url, "http://localhost:5173");
        assert!(config.browser.headless);
    }

    #[test]
    fn test_blank_seed_is_treated_as_missing() {
        let mut config = HarnessConfig::default();
        config.apply_env(env(&[("WALLET_SEED", "   ")]));
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_missing_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = dotenvy::from_path(dir.path().join(".env.local"));
        assert!(env_file(".env.local", loaded).is_ok());
    }

    #[test]
    fn test_malformed_env_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "!!not a dotenv line\n").unwrap();

        let err = env_file(".env", dotenvy::from_path(&path)).unwrap_err();
        assert!(matches!(&err, E2eError::Config(msg) if msg.contains(".env")));
    }

    #[test]
    fn test_app_host() {
        let mut config = HarnessConfig::default();
        assert_eq!(config.app_host().unwrap(), "localhost");

        config.app_url = "not a url".to_string();
        assert!(matches!(config.app_host(), Err(E2eError::Config(_))));
    }

    #[test]
    fn test_toml_file_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e2e.toml");
        std::fs::write(
            &path,
            r##"
app_url = "http://127.0.0.1:3000"

[timings]
settle_ms = 500

[selectors.app]
deposit_button = "#deposit"
"##,
        )
        .unwrap();

        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.app_url, "http://127.0.0.1:3000");
        assert_eq!(config.timings.settle_ms, 500);
        assert_eq!(config.timings.element_timeout_ms, 5_000);
        assert_eq!(config.selectors.app.deposit_button.css, "#deposit");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = HarnessConfig::from_file(Path::new("/nonexistent/e2e.toml")).unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }
}

//! Error types for the wallet E2E harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("Timed out waiting for {description} after {attempts} attempts")]
    Timeout { description: String, attempts: u32 },

    #[error("Mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("Assertion failed: {description} (expected: {expected:?}, actual: {actual:?})")]
    AssertionFailed {
        description: String,
        expected: String,
        actual: String,
    },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Scenario parse error: {0}")]
    SpecParse(String),

    #[error("Step phrase registered twice: {0}")]
    DuplicateStep(String),

    #[error("No step matches: {0}")]
    UnknownStep(String),

    #[error("Invalid step argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("App server failed to start: {0}")]
    ServerStartup(String),

    #[error("App server health check failed after {0} attempts")]
    ServerHealthCheck(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    pub fn assertion(
        description: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        E2eError::AssertionFailed {
            description: description.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Failures that abort a scenario before any of its steps could run.
    pub fn is_fatal_setup(&self) -> bool {
        matches!(self, E2eError::Setup(_) | E2eError::Config(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

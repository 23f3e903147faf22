//! Scenario runner: loads scenarios, runs their steps against a fresh
//! session each, and collects results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};
use crate::server::AppServer;
use crate::session::{Bootstrapper, Launcher};
use crate::spec::ScenarioSpec;
use crate::steps::{default_registry, StepContext, StepRegistry};

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    /// Steps not run because an earlier one failed
    pub skipped_steps: usize,
    /// The failure happened while launching the browser or importing the wallet
    pub setup_failed: bool,
    pub error: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn from_results(results: Vec<ScenarioResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }
}

/// Configuration for the runner itself
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub specs_dir: PathBuf,
    /// Wait for the dApp to answer before the first scenario, even when no
    /// dev-server command is configured
    pub check_app: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("tests/e2e/specs"),
            check_app: false,
        }
    }
}

pub struct ScenarioRunner {
    config: Arc<HarnessConfig>,
    registry: StepRegistry,
    bootstrapper: Arc<Bootstrapper>,
    runner_config: RunnerConfig,
    server: Option<AppServer>,
}

impl ScenarioRunner {
    /// Runner with every built-in step bound
    pub fn new(
        config: HarnessConfig,
        launcher: Arc<dyn Launcher>,
        runner_config: RunnerConfig,
    ) -> E2eResult<Self> {
        Ok(Self::with_registry(config, launcher, default_registry()?, runner_config))
    }

    pub fn with_registry(
        config: HarnessConfig,
        launcher: Arc<dyn Launcher>,
        registry: StepRegistry,
        runner_config: RunnerConfig,
    ) -> Self {
        let config = Arc::new(config);
        let bootstrapper = Arc::new(Bootstrapper::new(launcher, config.clone()));
        Self {
            config,
            registry,
            bootstrapper,
            runner_config,
            server: None,
        }
    }

    /// Start the dev server, or just wait for the dApp, when configured to
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(());
        }
        if self.config.server.command.is_empty() && !self.runner_config.check_app {
            debug!("No dev server configured; assuming {} is up", self.config.app_url);
            return Ok(());
        }

        let server = AppServer::start(&self.config.server, &self.config.app_url).await?;
        self.server = Some(server);
        Ok(())
    }

    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Run all scenarios in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<SuiteResult> {
        let specs = ScenarioSpec::load_all(&self.runner_config.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run scenarios carrying `tag`
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<SuiteResult> {
        let specs = ScenarioSpec::load_all(&self.runner_config.specs_dir)?;
        let filtered: Vec<ScenarioSpec> = ScenarioSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run one scenario by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<ScenarioResult> {
        let specs = ScenarioSpec::load_all(&self.runner_config.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Scenario not found: {}", name)))?;

        self.start_server().await?;
        Ok(self.run_scenario(&spec).await)
    }

    pub async fn run_specs(&mut self, specs: &[ScenarioSpec]) -> E2eResult<SuiteResult> {
        let start = Instant::now();
        self.start_server().await?;

        info!("Running {} scenario(s)...", specs.len());

        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            let result = self.run_scenario(spec).await;
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let suite = SuiteResult::from_results(results, start.elapsed().as_millis() as u64);
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        Ok(suite)
    }

    /// Run a scenario's steps in order against one session, stopping at the
    /// first failure. The session is always torn down afterwards.
    pub async fn run_scenario(&self, spec: &ScenarioSpec) -> ScenarioResult {
        let start = Instant::now();
        let started_at = Utc::now();
        info!("Scenario: {}", spec.name);

        let mut ctx = StepContext::new(self.config.clone(), self.bootstrapper.clone());
        let mut steps = Vec::with_capacity(spec.steps.len());
        let mut failure: Option<E2eError> = None;

        for (index, text) in spec.steps.iter().enumerate() {
            let step_start = Instant::now();
            debug!("Step {}: {}", index + 1, text);

            match self.registry.execute(&mut ctx, text).await {
                Ok(()) => {
                    steps.push(StepResult {
                        step: text.clone(),
                        success: true,
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        error: None,
                        screenshot_path: None,
                    });
                }
                Err(e) => {
                    error!("Step '{}' failed: {}", text, e);
                    let screenshot_path = self.capture_failure(&ctx, &spec.name, index + 1).await;
                    steps.push(StepResult {
                        step: text.clone(),
                        success: false,
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        error: Some(e.to_string()),
                        screenshot_path,
                    });
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = ctx.teardown().await {
            warn!("Session teardown failed: {}", e);
        }

        let skipped_steps = spec.steps.len() - steps.len();
        ScenarioResult {
            name: spec.name.clone(),
            started_at,
            success: failure.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            skipped_steps,
            setup_failed: failure.as_ref().is_some_and(E2eError::is_fatal_setup),
            error: failure.map(|e| e.to_string()),
        }
    }

    /// Best effort: a screenshot problem is logged, never reported in place
    /// of the step's own error.
    async fn capture_failure(&self, ctx: &StepContext, scenario: &str, step: usize) -> Option<PathBuf> {
        let bytes = match ctx.screenshot().await? {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not capture failure screenshot: {}", e);
                return None;
            }
        };

        let dir = self.config.screenshot_dir();
        let path = dir.join(format!("{}-{}.png", file_stem(scenario), step));
        match write_file(&dir, &path, &bytes) {
            Ok(()) => {
                info!("Failure screenshot: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not write {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write results to `<output_dir>/test-results.json`
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        let dir = &self.config.output_dir;
        let path = dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        write_file(dir, &path, json.as_bytes())?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

fn write_file(dir: &Path, path: &Path, bytes: &[u8]) -> E2eResult<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Scenario name reduced to something safe in a file name
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

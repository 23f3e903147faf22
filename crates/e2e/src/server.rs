//! dApp dev-server management - optional spawning and readiness checks

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::poller::PollCondition;

/// Handle to a dev server started by the harness
pub struct AppServer {
    child: Option<Child>,
    pub url: String,
}

impl AppServer {
    /// Start the configured dev server (if any) and wait until `url` answers.
    ///
    /// With an empty `command` the app is assumed to be started out-of-band
    /// and only the readiness check runs.
    pub async fn start(config: &ServerConfig, url: &str) -> E2eResult<Self> {
        let child = match config.command.split_first() {
            Some((program, args)) => {
                info!("Spawning dev server: {}", config.command.join(" "));

                let mut cmd = Command::new(program);
                cmd.args(args).stdout(Stdio::null()).stderr(Stdio::inherit());
                if let Some(dir) = &config.working_dir {
                    cmd.current_dir(dir);
                }

                let child = cmd.spawn().map_err(|e| {
                    E2eError::ServerStartup(format!("Failed to spawn {}: {}", program, e))
                })?;
                Some(child)
            }
            None => None,
        };

        let server = AppServer {
            child,
            url: url.to_string(),
        };

        server.wait_until_ready(config).await?;

        info!("dApp is reachable at {}", url);
        Ok(server)
    }

    async fn wait_until_ready(&self, config: &ServerConfig) -> E2eResult<()> {
        // Local dev servers commonly use self-signed certificates.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .danger_accept_invalid_certs(true)
            .build()?;

        let poll = PollCondition::within(
            format!("{} to respond", self.url),
            Duration::from_millis(config.startup_timeout_ms),
            Duration::from_millis(config.health_interval_ms),
        );
        let client = &client;
        let url = self.url.as_str();

        poll.wait_until(move || async move {
            match client.get(url).send().await {
                Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => Ok(true),
                Ok(resp) => {
                    warn!("Readiness check returned {}", resp.status());
                    Ok(false)
                }
                Err(e) => {
                    // Connection refused is expected while the server boots.
                    if !e.is_connect() {
                        debug!("Readiness check error: {}", e);
                    }
                    Ok(false)
                }
            }
        })
        .await
        .map(|_| ())
        .map_err(|e| match e {
            E2eError::Timeout { attempts, .. } => E2eError::ServerHealthCheck(attempts),
            other => other,
        })
    }

    /// Stop the dev server if this handle started one
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping dev server (pid: {})", child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = child.kill();
        let _ = child.wait();
        Ok(())
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Command line that starts the dApp, e.g. `["npm", "run", "dev"]`.
    /// Empty means the dApp is already running.
    pub command: Vec<String>,

    pub working_dir: Option<PathBuf>,

    pub startup_timeout_ms: u64,

    pub health_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            working_dir: None,
            startup_timeout_ms: 60_000,
            health_interval_ms: 500,
        }
    }
}

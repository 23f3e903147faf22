//! Walletflow E2E harness
//!
//! Drives a dApp and a browser-extension wallet side by side in one
//! Chromium instance:
//! - Launches Chromium with the wallet extension and imports a seed
//! - Finds the dApp and extension tabs by URL and moves focus between them
//! - Runs the wallet half of each flow (connect, switch network, approve)
//!   as a fixed choreography with bounded polling
//! - Executes YAML scenarios made of plain step phrases
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  ScenarioRunner (tests/e2e.rs)               │
//! │    ├── AppServer (optional dev server + readiness)           │
//! │    └── per scenario: StepContext ── StepRegistry.execute()   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Session (from Bootstrapper)                                 │
//! │    ├── TabRegistry ── find / focus by URL pattern            │
//! │    ├── DappPage    ── dApp operations by element name        │
//! │    └── WalletBridge ── WalletDriver (MetaMask) choreography  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  BrowserDriver (chromiumoxide)      PollCondition            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod assertions;
pub mod chromium;
pub mod config;
pub mod driver;
pub mod error;
pub mod metamask;
pub mod poller;
pub mod runner;
pub mod selectors;
pub mod server;
pub mod session;
pub mod spec;
pub mod steps;
pub mod tabs;
pub mod wallet;

pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult};
pub use runner::ScenarioRunner;
pub use spec::ScenarioSpec;

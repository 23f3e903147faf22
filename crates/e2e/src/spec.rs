//! Declarative YAML scenario files
//!
//! A scenario is a name, some tags and an ordered list of step phrases:
//!
//! ```yaml
//! name: app-access
//! tags: [smoke]
//! steps:
//!   - A user with metamask installed connected to "Sepolia" network
//!   - the user accesses the app page
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Step phrases, executed in order
    pub steps: Vec<String>,
}

impl ScenarioSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios under a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("scenario '{}' has no steps", self.name)));
        }
        if let Some(i) = self.steps.iter().position(|s| s.trim().is_empty()) {
            return Err(E2eError::SpecParse(format!(
                "scenario '{}' step {} is blank",
                self.name,
                i + 1
            )));
        }
        Ok(())
    }
}

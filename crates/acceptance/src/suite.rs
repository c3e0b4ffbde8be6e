//! Declarative suite definitions
//!
//! A suite is a role plus an ordered list of steps. Built-in suites live in
//! [`crate::catalog`]; more can be loaded from YAML files.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::assertion::{Assertion, Check};
use crate::config::TimingConfig;
use crate::driver::StabilityWait;
use crate::error::{AcceptanceError, AcceptanceResult};
use crate::evidence::sanitize_name;
use crate::role::Role;

/// An ordered set of steps executed under one role's session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteDefinition {
    /// Unique name for this suite
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Role to log in as; `None` runs the suite unauthenticated
    #[serde(default)]
    pub role: Option<Role>,

    /// Steps to execute in order
    pub steps: Vec<ScenarioStep>,
}

/// One navigate, wait, assert, capture unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Message used in the report
    pub label: String,

    /// Path appended to the base URL
    pub route: String,

    #[serde(default)]
    pub wait: WaitPolicy,

    #[serde(default)]
    pub assertions: Vec<Check>,

    /// Counted or read but never asserted
    #[serde(default)]
    pub observe: Vec<Observation>,

    /// Screenshot name, without extension
    pub screenshot: String,

    /// The route may not exist; failing to reach it only warns
    #[serde(default)]
    pub optional: bool,
}

/// Per-step overrides of the configured stability wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,

    #[serde(default)]
    pub settle_ms: Option<u64>,
}

impl WaitPolicy {
    pub fn settle(settle_ms: u64) -> Self {
        Self {
            idle_timeout_ms: None,
            settle_ms: Some(settle_ms),
        }
    }

    /// Fill unset fields from configuration
    pub fn resolve(&self, timing: &TimingConfig) -> StabilityWait {
        StabilityWait::new(
            self.idle_timeout_ms.unwrap_or(timing.idle_timeout_ms),
            self.settle_ms.unwrap_or(timing.settle_ms),
        )
    }
}

/// Something worth noting about a page that must not fail it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub label: String,
    pub selector: String,

    /// Record the first match's text instead of the match count
    #[serde(default)]
    pub text: bool,
}

impl Observation {
    pub fn count(label: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            selector: selector.into(),
            text: false,
        }
    }

    pub fn first_text(label: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            selector: selector.into(),
            text: true,
        }
    }
}

impl ScenarioStep {
    pub fn new(label: impl Into<String>, route: impl Into<String>, screenshot: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            route: route.into(),
            wait: WaitPolicy::default(),
            assertions: Vec::new(),
            observe: Vec::new(),
            screenshot: screenshot.into(),
            optional: false,
        }
    }

    pub fn require(mut self, assertion: Assertion) -> Self {
        self.assertions.push(Check::required(assertion));
        self
    }

    /// Add a check whose failure only warns
    pub fn prefer(mut self, assertion: Assertion) -> Self {
        self.assertions.push(Check::optional(assertion));
        self
    }

    pub fn observe(mut self, observation: Observation) -> Self {
        self.observe.push(observation);
        self
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn optional_route(mut self) -> Self {
        self.optional = true;
        self
    }
}

impl SuiteDefinition {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> AcceptanceResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> AcceptanceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| {
            AcceptanceError::SuiteParse(format!("{}: {}", path.display(), e))
        })
    }

    /// Load all suites from a directory, sorted by path
    pub fn load_all(dir: &Path) -> AcceptanceResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|path| Self::from_file(path)).collect()
    }

    pub fn validate(&self) -> AcceptanceResult<()> {
        if self.name.trim().is_empty() {
            return Err(AcceptanceError::SuiteParse("suite name is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(AcceptanceError::SuiteParse(format!(
                "suite '{}' has no steps",
                self.name
            )));
        }
        let mut screenshots = HashSet::new();
        for step in &self.steps {
            if step.screenshot.trim().is_empty() {
                return Err(AcceptanceError::SuiteParse(format!(
                    "step '{}' in suite '{}' has no screenshot name",
                    step.label, self.name
                )));
            }
            // Names collide after sanitizing too, e.g. "a b" and "a_b"
            if !screenshots.insert(sanitize_name(&step.screenshot)) {
                return Err(AcceptanceError::SuiteParse(format!(
                    "screenshot '{}' is used twice in suite '{}'",
                    step.screenshot, self.name
                )));
            }
        }
        Ok(())
    }
}

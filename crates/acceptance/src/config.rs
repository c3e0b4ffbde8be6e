//! Run configuration
//!
//! Loaded from a TOML file (a missing file means defaults), then overlaid with
//! `ACCEPTANCE_*` environment variables. Credentials only ever come from these
//! two sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AcceptanceError, AcceptanceResult};
use crate::playwright::PlaywrightConfig;
use crate::role::{Credentials, Role, RoleOverrides, RoleProfile};

pub const DEFAULT_CONFIG_PATH: &str = "acceptance.toml";

/// Top-level configuration for one acceptance run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base URL of the application under test
    pub base_url: String,

    /// Directory for the JSON report and screenshots
    pub output_dir: PathBuf,

    /// Suites to run, by name. Empty means every built-in suite.
    pub suites: Vec<String>,

    pub browser: PlaywrightConfig,

    pub timing: TimingConfig,

    /// Secrets per role
    pub credentials: BTreeMap<Role, Credentials>,

    /// Route overrides per role
    pub roles: BTreeMap<Role, RoleOverrides>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3003".to_string(),
            output_dir: PathBuf::from("test-results"),
            suites: Vec::new(),
            browser: PlaywrightConfig::default(),
            timing: TimingConfig::default(),
            credentials: BTreeMap::new(),
            roles: BTreeMap::new(),
        }
    }
}

/// Waits and timeouts, all in milliseconds unless named otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub navigation_timeout_ms: u64,

    /// Cap on the network-idle wait after each navigation
    pub idle_timeout_ms: u64,

    /// Settle delay after the idle wait on ordinary pages
    pub settle_ms: u64,

    /// Settle delay after submitting the login form
    pub login_settle_ms: u64,

    pub logout_settle_ms: u64,

    /// Timeout for fill/click on a single element
    pub action_timeout_ms: u64,

    /// Keep the browser open this long after the last suite
    pub keep_open_secs: u64,

    pub preflight_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            idle_timeout_ms: 10_000,
            settle_ms: 2_000,
            login_settle_ms: 3_000,
            logout_settle_ms: 2_000,
            action_timeout_ms: 5_000,
            keep_open_secs: 0,
            preflight_timeout_secs: 30,
        }
    }
}

impl TimingConfig {
    /// Zero delays everywhere, for fakes and dry runs
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            login_settle_ms: 0,
            logout_settle_ms: 0,
            keep_open_secs: 0,
            ..Self::default()
        }
    }

    pub fn keep_open(&self) -> Duration {
        Duration::from_secs(self.keep_open_secs)
    }
}

impl RunConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> AcceptanceResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> AcceptanceResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `ACCEPTANCE_*` variables from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ACCEPTANCE_BASE_URL") {
            self.base_url = url;
        }

        for role in Role::ALL {
            let prefix = role.env_prefix();
            let email = lookup(&format!("{}_EMAIL", prefix));
            let password = lookup(&format!("{}_PASSWORD", prefix));

            match (email, password) {
                (Some(email), Some(password)) => {
                    self.credentials.insert(role, Credentials { email, password });
                }
                (email, password) => {
                    // A lone variable only patches an existing entry
                    if let Some(existing) = self.credentials.get_mut(&role) {
                        if let Some(email) = email {
                            existing.email = email;
                        }
                        if let Some(password) = password {
                            existing.password = password;
                        }
                    }
                }
            }
        }
    }

    pub fn validate(&self) -> AcceptanceResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(AcceptanceError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        for (role, creds) in &self.credentials {
            if creds.email.trim().is_empty() {
                return Err(AcceptanceError::Config(format!(
                    "credentials for '{}' have an empty email",
                    role
                )));
            }
        }
        Ok(())
    }

    /// Resolved login profile for every role
    pub fn profiles(&self) -> Vec<RoleProfile> {
        Role::ALL
            .iter()
            .map(|role| {
                let profile = RoleProfile::for_role(*role, self.credentials.get(role).cloned());
                match self.roles.get(role) {
                    Some(overrides) => profile.with_overrides(overrides),
                    None => profile,
                }
            })
            .collect()
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }
}

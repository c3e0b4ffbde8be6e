//! Error types for acceptance runs

use thiserror::Error;

use crate::role::Role;

#[derive(Error, Debug)]
pub enum AcceptanceError {
    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser bridge failed to start: {0}")]
    BridgeStartup(String),

    #[error("Navigation to {route} failed: {reason}")]
    Navigation { route: String, reason: String },

    #[error("Interaction with '{selector}' failed: {reason}")]
    Interaction { selector: String, reason: String },

    #[error("Assertion fault: {0}")]
    AssertionFault(String),

    #[error("Screenshot capture failed for {path}: {reason}")]
    Capture { path: String, reason: String },

    /// The browser or the bridge process is gone. Aborts the current suite.
    #[error("Browser transport failed: {0}")]
    FatalTransport(String),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("No credentials configured for role '{0}'")]
    MissingCredentials(Role),

    #[error("Target {url} unreachable after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error("Suite definition error: {0}")]
    SuiteParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

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

impl AcceptanceError {
    /// Whether this error means the browser can no longer be driven.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AcceptanceError::FatalTransport(_))
    }
}

pub type AcceptanceResult<T> = Result<T, AcceptanceError>;

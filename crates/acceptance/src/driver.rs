//! Page driver abstraction
//!
//! Everything above this trait is independent of the automation engine. The
//! production implementation is [`crate::playwright::PlaywrightDriver`]; tests
//! drive the engine with scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::AcceptanceResult;

/// One element matched by a DOM query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Position among the matches of the query
    pub index: usize,

    /// Text content, trimmed
    pub text: String,
}

/// Bounded wait for page stability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityWait {
    /// Cap on the network-idle wait
    pub idle_timeout: Duration,

    /// Fixed delay after the idle wait
    pub settle: Duration,
}

impl StabilityWait {
    pub fn new(idle_timeout_ms: u64, settle_ms: u64) -> Self {
        Self {
            idle_timeout: Duration::from_millis(idle_timeout_ms),
            settle: Duration::from_millis(settle_ms),
        }
    }
}

/// How a stability wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Idle,
    /// The idle signal never came; the settle delay still elapsed
    TimedOut,
}

/// A single browser page
///
/// Errors follow one rule: [`crate::AcceptanceError::FatalTransport`] means the
/// page can no longer be driven, anything else is local to the call.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to a route relative to the base URL.
    ///
    /// Returns the HTTP status of the main document when there was one. An
    /// error status is not an error here; callers decide what it means.
    async fn navigate(&mut self, route: &str) -> AcceptanceResult<Option<u16>>;

    /// Wait for network idle (bounded), then the settle delay.
    /// An idle timeout is reported, not raised.
    async fn wait_for_stable(&mut self, wait: StabilityWait) -> AcceptanceResult<Stability>;

    async fn current_url(&mut self) -> AcceptanceResult<String>;

    async fn title(&mut self) -> AcceptanceResult<String>;

    /// Query the live DOM; every call re-queries
    async fn query_all(&mut self, selector: &str) -> AcceptanceResult<Vec<ElementHandle>>;

    /// Fill the first match; `Interaction` when nothing matches
    async fn fill(&mut self, selector: &str, value: &str) -> AcceptanceResult<()>;

    /// Click the first match; `Interaction` when nothing matches
    async fn click(&mut self, selector: &str) -> AcceptanceResult<()>;

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> AcceptanceResult<()>;

    /// Release the browser. Calling it again is a no-op.
    async fn close(&mut self) -> AcceptanceResult<()>;
}

/// Join a route onto a base URL with exactly one slash between them
pub fn join_route(base_url: &str, route: &str) -> String {
    if route.starts_with("http://") || route.starts_with("https://") {
        return route.to_string();
    }
    let base = base_url.trim_end_matches('/');
    let route = route.trim_start_matches('/');
    if route.is_empty() {
        format!("{}/", base)
    } else {
        format!("{}/{}", base, route)
    }
}

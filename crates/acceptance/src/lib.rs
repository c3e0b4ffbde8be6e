//! Fleet Acceptance Runner
//!
//! Browser-driven acceptance checks for the fleet management web app:
//! - Logs in as each role through the real login forms
//! - Walks ordered page scenarios on one persistent page
//! - Asserts on URLs, titles and element counts
//! - Captures a full-page screenshot as evidence for every step
//! - Aggregates everything into a console summary and a JSON report
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Acceptance Runner (Rust)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner<D: PageDriver>                              │
//! │    ├── SessionController  login(role) / logout()            │
//! │    ├── run_suite(SuiteDefinition) -> SuiteResult            │
//! │    │     └── per step: navigate, wait, assert, capture      │
//! │    ├── EvidenceSink       screenshot + sha256               │
//! │    └── run(suites) -> Report   (closes the page once)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PageDriver                                                 │
//! │    └── PlaywrightDriver   node bridge, JSON lines on stdio  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteDefinition (catalog or YAML)                          │
//! │    ├── name, role?                                          │
//! │    └── steps: [ScenarioStep]                                │
//! │          ├── route, wait, screenshot, optional              │
//! │          ├── assertions: [url_contains | url_excludes |     │
//! │          │                element_count_at_least |          │
//! │          │                title_non_empty]                  │
//! │          └── observe: [count | first_text]                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertion;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod playwright;
pub mod preflight;
pub mod report;
pub mod role;
pub mod runner;
pub mod session;
pub mod suite;

pub use assertion::{Assertion, Check, Verdict};
pub use config::{RunConfig, TimingConfig};
pub use driver::{ElementHandle, PageDriver, Stability, StabilityWait};
pub use error::{AcceptanceError, AcceptanceResult};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightDriver};
pub use report::Report;
pub use role::{Credentials, Role, RoleProfile};
pub use runner::{ScenarioRunner, StepResult, StepStatus, SuiteResult};
pub use session::{LoginOutcome, SessionController};
pub use suite::{ScenarioStep, SuiteDefinition};

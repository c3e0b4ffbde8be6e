//! Scenario runner: logs in per suite, then navigates, waits, asserts and
//! captures each step, strictly in order on one page.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::assertion::{AssertionResult, Verdict};
use crate::config::{RunConfig, TimingConfig};
use crate::driver::{PageDriver, StabilityWait};
use crate::error::{AcceptanceError, AcceptanceResult};
use crate::evidence::{EvidenceRecord, EvidenceSink};
use crate::report::Report;
use crate::role::Role;
use crate::session::{LoginOutcome, SessionController};
use crate::suite::{Observation, ScenarioStep, SuiteDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    PassedWithWarning,
    Failed,
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed)
    }
}

/// Result of executing one step (or the login that opens a suite)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub label: String,
    pub route: Option<String>,
    pub status: StepStatus,
    pub message: String,

    /// Absent when the capture failed
    pub screenshot_path: Option<PathBuf>,
    pub screenshot_sha256: Option<String>,

    pub assertions: Vec<AssertionResult>,
    pub observations: Vec<String>,

    /// Faults caught while running the step
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl StepResult {
    fn attach(&mut self, evidence: Option<EvidenceRecord>) {
        if let Some(record) = evidence {
            self.screenshot_path = Some(record.path);
            self.screenshot_sha256 = Some(record.sha256);
        }
    }
}

/// Ordered step results for one suite. Results are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub suite: String,
    pub role: Option<Role>,

    /// A transport failure cut the suite short
    pub aborted: bool,
    steps: Vec<StepResult>,
}

impl SuiteResult {
    pub fn new(suite: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            suite: suite.into(),
            role,
            aborted: false,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: StepResult) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn failed(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_failure()).count()
    }

    pub fn passed(&self) -> usize {
        self.steps.len() - self.failed()
    }

    pub fn statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|s| s.status).collect()
    }
}

/// Owns the page for the whole run
pub struct ScenarioRunner<D: PageDriver> {
    driver: D,
    session: SessionController,
    evidence: EvidenceSink,
    timing: TimingConfig,
    closed: bool,
}

impl<D: PageDriver> ScenarioRunner<D> {
    pub fn new(driver: D, config: &RunConfig) -> Self {
        Self::with_parts(
            driver,
            SessionController::new(config.profiles(), config.timing.clone()),
            EvidenceSink::new(config.screenshot_dir()),
            config.timing.clone(),
        )
    }

    pub fn with_parts(
        driver: D,
        session: SessionController,
        evidence: EvidenceSink,
        timing: TimingConfig,
    ) -> Self {
        Self {
            driver,
            session,
            evidence,
            timing,
            closed: false,
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Run every suite in order, then release the browser.
    ///
    /// Faults never escape: each one ends up in the returned report.
    pub async fn run(mut self, suites: &[SuiteDefinition]) -> Report {
        let mut report = Report::new();
        info!("Running {} suite(s)...", suites.len());

        for suite in suites {
            let result = self.run_suite(suite).await;
            report.record(result);
        }

        let keep_open = self.timing.keep_open();
        if !keep_open.is_zero() {
            info!("Keeping browser open for {}s for review...", keep_open.as_secs());
            tokio::time::sleep(keep_open).await;
        }

        self.shutdown().await;
        report.finish();
        report
    }

    /// Close the driver. Only the first call reaches it.
    pub async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.driver.close().await {
            warn!("Browser close failed: {}", e);
        }
    }

    /// Run one suite, entering its role first if needed
    pub async fn run_suite(&mut self, suite: &SuiteDefinition) -> SuiteResult {
        let start = Instant::now();
        let mut result = SuiteResult::new(&suite.name, suite.role);
        info!("");
        info!("=== Suite '{}' ({} steps) ===", suite.name, suite.steps.len());

        if self.session.current_role() != suite.role {
            if self.session.current_role().is_some() {
                self.session.logout(&mut self.driver).await;
            }
            if let Some(role) = suite.role {
                let label = format!("Login as {}", role);
                let screenshot = format!("{}_login", suite.name);
                match self.login_step(role, &label, &screenshot).await {
                    Ok(step) => result.push(step),
                    Err(fault) => {
                        let step = self.abort_step(&label, None, fault, &screenshot).await;
                        result.push(step);
                        result.aborted = true;
                        return result;
                    }
                }
            }
        }

        for step in &suite.steps {
            match self.execute_step(step).await {
                Ok(step_result) => result.push(step_result),
                Err(fault) => {
                    let aborted = self
                        .abort_step(&step.label, Some(&step.route), fault, &step.screenshot)
                        .await;
                    result.push(aborted);
                    result.aborted = true;
                    break;
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if result.failed() == 0 {
            info!("✓ {} ({} steps, {} ms)", suite.name, result.steps().len(), duration_ms);
        } else {
            error!(
                "✗ {} ({} of {} steps failed, {} ms)",
                suite.name,
                result.failed(),
                result.steps().len(),
                duration_ms
            );
        }
        result
    }

    /// Log in and record the attempt. `Err` only for a fatal transport error.
    async fn login_step(
        &mut self,
        role: Role,
        label: &str,
        screenshot: &str,
    ) -> AcceptanceResult<StepResult> {
        let start = Instant::now();
        let mut errors = Vec::new();

        let (status, message) = match self.session.login(&mut self.driver, role).await {
            Ok(LoginOutcome::Success(_)) => {
                (StepStatus::Passed, format!("{} login successful", role))
            }
            Ok(LoginOutcome::Ambiguous(url)) => (
                StepStatus::PassedWithWarning,
                format!("{} login inconclusive (landed on {})", role, url),
            ),
            Ok(LoginOutcome::Failure(text)) => {
                (StepStatus::Failed, format!("{} login failed: {}", role, text))
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                errors.push(e.to_string());
                (StepStatus::Failed, format!("{} login failed: {}", role, e))
            }
        };

        let evidence = self.capture(screenshot, &mut errors).await?;
        let mut step = StepResult {
            label: label.to_string(),
            route: None,
            status,
            message,
            screenshot_path: None,
            screenshot_sha256: None,
            assertions: Vec::new(),
            observations: Vec::new(),
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        step.attach(evidence);
        log_step(&step);
        Ok(step)
    }

    /// Navigate, wait, assert, observe, capture. `Err` only for a fatal
    /// transport error; everything else is folded into the result.
    async fn execute_step(&mut self, step: &ScenarioStep) -> AcceptanceResult<StepResult> {
        let start = Instant::now();
        debug!("Executing step: {} ({})", step.label, step.route);

        let mut errors = Vec::new();
        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        let mut assertions = Vec::new();
        let mut observations = Vec::new();

        match self.driver.navigate(&step.route).await {
            Ok(_) => {
                self.settle(step.wait.resolve(&self.timing)).await?;

                for check in &step.assertions {
                    let verdict = check.assertion.evaluate(&mut self.driver).await?;
                    if !verdict.passed() {
                        let note = format!("{}: {}", check.assertion, verdict.detail());
                        if check.optional {
                            warnings.push(note);
                        } else {
                            failures.push(note);
                        }
                    }
                    if let Verdict::Fault(detail) = &verdict {
                        errors.push(detail.clone());
                    }
                    assertions.push(AssertionResult {
                        assertion: check.assertion.to_string(),
                        optional: check.optional,
                        verdict,
                    });
                }

                for observation in &step.observe {
                    if let Some(note) = self.observe(observation).await? {
                        debug!("   {}", note);
                        observations.push(note);
                    }
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                errors.push(e.to_string());
                if step.optional {
                    warnings.push(format!("route not available: {}", e));
                } else {
                    failures.push(e.to_string());
                }
            }
        }

        let evidence = self.capture(&step.screenshot, &mut errors).await?;

        let status = if !failures.is_empty() {
            StepStatus::Failed
        } else if !warnings.is_empty() {
            StepStatus::PassedWithWarning
        } else {
            StepStatus::Passed
        };
        let message = match status {
            StepStatus::Passed => step.label.clone(),
            StepStatus::PassedWithWarning => {
                format!("{} (warning: {})", step.label, warnings.join("; "))
            }
            StepStatus::Failed => format!("{} failed: {}", step.label, failures.join("; ")),
        };

        let mut result = StepResult {
            label: step.label.clone(),
            route: Some(step.route.clone()),
            status,
            message,
            screenshot_path: None,
            screenshot_sha256: None,
            assertions,
            observations,
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        result.attach(evidence);
        log_step(&result);
        Ok(result)
    }

    /// Terminal failure entry for a suite cut short by the transport
    async fn abort_step(
        &mut self,
        label: &str,
        route: Option<&str>,
        fault: AcceptanceError,
        screenshot: &str,
    ) -> StepResult {
        error!("Aborting suite at '{}': {}", label, fault);
        self.session.reset();

        let mut errors = vec![fault.to_string()];
        let evidence = match self
            .evidence
            .capture(&mut self.driver, &format!("{}_error", screenshot))
            .await
        {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Error screenshot unavailable: {}", e);
                errors.push(e.to_string());
                None
            }
        };

        let mut step = StepResult {
            label: label.to_string(),
            route: route.map(str::to_string),
            status: StepStatus::Failed,
            message: format!("{} aborted: {}", label, fault),
            screenshot_path: None,
            screenshot_sha256: None,
            assertions: Vec::new(),
            observations: Vec::new(),
            errors,
            duration_ms: 0,
        };
        step.attach(evidence);
        step
    }

    async fn settle(&mut self, wait: StabilityWait) -> AcceptanceResult<()> {
        match self.driver.wait_for_stable(wait).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Stability wait failed, continuing: {}", e);
                Ok(())
            }
        }
    }

    async fn observe(&mut self, observation: &Observation) -> AcceptanceResult<Option<String>> {
        match self.driver.query_all(&observation.selector).await {
            Ok(elements) if observation.text => Ok(elements
                .iter()
                .map(|element| element.text.trim())
                .find(|text| !text.is_empty())
                .map(|text| format!("{}: {}", observation.label, text))),
            Ok(elements) => Ok(Some(format!("{}: {}", observation.label, elements.len()))),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("Observation '{}' skipped: {}", observation.label, e);
                Ok(None)
            }
        }
    }

    /// Capture failures are recorded in `errors` and never fail the step
    async fn capture(
        &mut self,
        name: &str,
        errors: &mut Vec<String>,
    ) -> AcceptanceResult<Option<EvidenceRecord>> {
        match self.evidence.capture(&mut self.driver, name).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("{}", e);
                errors.push(e.to_string());
                Ok(None)
            }
        }
    }
}

fn log_step(step: &StepResult) {
    match step.status {
        StepStatus::Passed => info!("✅ {}", step.message),
        StepStatus::PassedWithWarning => warn!("⚠️  {}", step.message),
        StepStatus::Failed => error!("❌ {}", step.message),
    }
}

//! Login and logout for a role
//!
//! The application is a black box, so login success is judged from where the
//! browser lands after submitting the form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::driver::{PageDriver, Stability, StabilityWait};
use crate::error::{AcceptanceError, AcceptanceResult};
use crate::role::{Role, RoleProfile};

pub const EMAIL_SELECTOR: &str = r#"input[type="email"]"#;
pub const PASSWORD_SELECTOR: &str = r#"input[type="password"]"#;
pub const SUBMIT_SELECTOR: &str = r#"button[type="submit"]"#;
pub const ERROR_SELECTOR: &str = r#"[class*="error"]"#;

/// Upper bound on the network-idle wait after submitting the form
const LOGIN_IDLE_CAP_MS: u64 = 10_000;

/// How a login attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum LoginOutcome {
    /// Landed on a success route; carries the URL
    Success(String),
    /// The page showed an error; carries its text
    Failure(String),
    /// Neither a success route nor a visible error; carries the URL
    Ambiguous(String),
}

/// Classify where the browser landed after submitting the login form
pub fn classify_login(profile: &RoleProfile, url: &str, error_text: Option<&str>) -> LoginOutcome {
    let on_success_route = profile
        .success_markers
        .iter()
        .any(|marker| url.contains(marker.as_str()));

    if on_success_route && !url.contains(profile.login_marker.as_str()) {
        return LoginOutcome::Success(url.to_string());
    }

    match error_text.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => LoginOutcome::Failure(text.to_string()),
        None => LoginOutcome::Ambiguous(url.to_string()),
    }
}

/// Tracks which role the shared page is authenticated as
pub struct SessionController {
    profiles: BTreeMap<Role, RoleProfile>,
    timing: TimingConfig,
    current: Option<Role>,
}

impl SessionController {
    pub fn new(profiles: Vec<RoleProfile>, timing: TimingConfig) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.role, p)).collect(),
            timing,
            current: None,
        }
    }

    /// Role entered by the last login attempt, if not logged out since
    pub fn current_role(&self) -> Option<Role> {
        self.current
    }

    fn profile(&self, role: Role) -> RoleProfile {
        self.profiles
            .get(&role)
            .cloned()
            .unwrap_or_else(|| RoleProfile::for_role(role, None))
    }

    /// Log in through the role's form.
    ///
    /// The role counts as entered even when the attempt fails, so a suite for
    /// the same role does not retry.
    pub async fn login<D>(&mut self, driver: &mut D, role: Role) -> AcceptanceResult<LoginOutcome>
    where
        D: PageDriver + ?Sized,
    {
        self.current = Some(role);
        let profile = self.profile(role);
        let credentials = profile
            .credentials
            .clone()
            .ok_or(AcceptanceError::MissingCredentials(role))?;

        info!("Logging in as {} ({}) at {}", role, credentials.email, profile.login_route);

        driver.navigate(&profile.login_route).await?;
        driver
            .wait_for_stable(StabilityWait::new(
                self.timing.idle_timeout_ms,
                self.timing.settle_ms,
            ))
            .await?;

        driver.fill(EMAIL_SELECTOR, &credentials.email).await?;
        driver.fill(PASSWORD_SELECTOR, &credentials.password).await?;
        driver.click(SUBMIT_SELECTOR).await?;

        let after_submit = StabilityWait::new(
            self.timing.idle_timeout_ms.min(LOGIN_IDLE_CAP_MS),
            self.timing.login_settle_ms,
        );
        if driver.wait_for_stable(after_submit).await? == Stability::TimedOut {
            warn!("Page still busy after login submit, classifying anyway");
        }

        let url = driver.current_url().await?;
        debug!("Landed on {} after login", url);

        let error_text = if classify_login(&profile, &url, None).is_success() {
            None
        } else {
            match driver.query_all(ERROR_SELECTOR).await {
                Ok(elements) => elements
                    .into_iter()
                    .map(|element| element.text)
                    .find(|text| !text.trim().is_empty()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("No readable login error: {}", e);
                    None
                }
            }
        };

        let outcome = classify_login(&profile, &url, error_text.as_deref());
        match &outcome {
            LoginOutcome::Success(_) => info!("{} login successful", role),
            LoginOutcome::Failure(message) => warn!("{} login failed: {}", role, message),
            LoginOutcome::Ambiguous(url) => warn!("{} login inconclusive, landed on {}", role, url),
        }
        Ok(outcome)
    }

    /// Leave the current role. Never fails; problems are logged.
    pub async fn logout<D>(&mut self, driver: &mut D)
    where
        D: PageDriver + ?Sized,
    {
        let Some(role) = self.current.take() else {
            return;
        };
        let profile = self.profile(role);
        info!("Logging out {}", role);

        let via_route = match &profile.logout_route {
            Some(route) => match driver.navigate(route).await {
                Ok(Some(status)) if status >= 400 => {
                    warn!("Logout route {} answered {}", route, status);
                    false
                }
                Ok(_) => true,
                Err(e) => {
                    warn!("Logout route {} failed: {}", route, e);
                    false
                }
            },
            None => false,
        };

        if !via_route {
            if let Err(e) = driver.click(&profile.logout_selector).await {
                warn!("Logout control not usable for {}: {}", role, e);
            }
        }

        let settle = StabilityWait::new(self.timing.idle_timeout_ms, self.timing.logout_settle_ms);
        if let Err(e) = driver.wait_for_stable(settle).await {
            warn!("Wait after logout failed: {}", e);
        }
    }

    /// Forget the session, e.g. after the browser died
    pub fn reset(&mut self) {
        self.current = None;
    }
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success(_))
    }
}

//! Scripted in-memory page driver shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fleet_acceptance::config::RunConfig;
use fleet_acceptance::driver::join_route;
use fleet_acceptance::role::{Credentials, Role};
use fleet_acceptance::session::{EMAIL_SELECTOR, PASSWORD_SELECTOR, SUBMIT_SELECTOR};
use fleet_acceptance::{
    AcceptanceError, AcceptanceResult, ElementHandle, PageDriver, Stability, StabilityWait,
    TimingConfig,
};

pub const BASE_URL: &str = "http://x/";

/// What the fake shows for a route
#[derive(Debug, Clone)]
pub struct FakePage {
    /// Route the browser ends up on, if the app redirects
    redirect: Option<String>,
    status: u16,
    title: String,
    elements: HashMap<String, Vec<String>>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            redirect: None,
            status: 200,
            title: "Fleet Manager".to_string(),
            elements: HashMap::new(),
        }
    }

    pub fn login_form() -> Self {
        Self::new()
            .with(EMAIL_SELECTOR, 1)
            .with(PASSWORD_SELECTOR, 1)
            .with(SUBMIT_SELECTOR, 1)
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with(mut self, selector: &str, count: usize) -> Self {
        self.elements
            .insert(selector.to_string(), vec![String::new(); count]);
        self
    }

    pub fn with_text(mut self, selector: &str, texts: &[&str]) -> Self {
        self.elements.insert(
            selector.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// HTTP status the route answers with
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn redirects_to(mut self, route: &str) -> Self {
        self.redirect = Some(route.to_string());
        self
    }
}

/// Shared view of what the fake was asked to do
#[derive(Clone, Default)]
pub struct FakeHandles {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeHandles {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("navigate ").map(str::to_string))
            .collect()
    }
}

pub struct FakeDriver {
    base_url: String,
    pages: HashMap<String, FakePage>,
    current_route: String,
    submit_route: Option<String>,
    unreachable: HashSet<String>,
    fatal_routes: HashSet<String>,
    stalled_routes: HashSet<String>,
    broken_selectors: HashSet<String>,
    fail_screenshots: bool,
    dead: bool,
    handles: FakeHandles,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            pages: HashMap::new(),
            current_route: "about:blank".to_string(),
            submit_route: None,
            unreachable: HashSet::new(),
            fatal_routes: HashSet::new(),
            stalled_routes: HashSet::new(),
            broken_selectors: HashSet::new(),
            fail_screenshots: false,
            dead: false,
            handles: FakeHandles::default(),
        }
    }

    /// Login forms for both roles, submitting lands on `after_submit`
    pub fn with_login(self, after_submit: &str) -> Self {
        self.page("/auth/login", FakePage::login_form())
            .page("/portal/login", FakePage::login_form())
            .submit_to(after_submit)
    }

    pub fn page(mut self, route: &str, page: FakePage) -> Self {
        self.pages.insert(route.to_string(), page);
        self
    }

    pub fn submit_to(mut self, route: &str) -> Self {
        self.submit_route = Some(route.to_string());
        self
    }

    pub fn unreachable(mut self, route: &str) -> Self {
        self.unreachable.insert(route.to_string());
        self
    }

    /// The browser dies while navigating to `route`
    pub fn fatal_on(mut self, route: &str) -> Self {
        self.fatal_routes.insert(route.to_string());
        self
    }

    /// The network never goes idle while on `route`
    pub fn stalls_on(mut self, route: &str) -> Self {
        self.stalled_routes.insert(route.to_string());
        self
    }

    pub fn broken_selector(mut self, selector: &str) -> Self {
        self.broken_selectors.insert(selector.to_string());
        self
    }

    pub fn failing_screenshots(mut self) -> Self {
        self.fail_screenshots = true;
        self
    }

    pub fn handles(&self) -> FakeHandles {
        self.handles.clone()
    }

    fn record(&self, call: String) {
        self.handles.calls.lock().unwrap().push(call);
    }

    fn alive(&self) -> AcceptanceResult<()> {
        if self.dead {
            Err(AcceptanceError::FatalTransport("browser closed".into()))
        } else {
            Ok(())
        }
    }

    fn current_page(&self) -> FakePage {
        self.pages
            .get(&self.current_route)
            .cloned()
            .unwrap_or_else(|| FakePage::new().titled(""))
    }

    fn land_on(&mut self, route: &str) {
        let redirect = self.pages.get(route).and_then(|p| p.redirect.clone());
        self.current_route = redirect.unwrap_or_else(|| route.to_string());
    }

    fn require_element(&self, selector: &str) -> AcceptanceResult<()> {
        if self.current_page().elements.contains_key(selector) {
            Ok(())
        } else {
            Err(AcceptanceError::Interaction {
                selector: selector.to_string(),
                reason: "no element matches selector".into(),
            })
        }
    }
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&mut self, route: &str) -> AcceptanceResult<Option<u16>> {
        self.alive()?;
        self.record(format!("navigate {}", route));
        if self.fatal_routes.contains(route) {
            self.dead = true;
            return Err(AcceptanceError::FatalTransport("browser crashed".into()));
        }
        if self.unreachable.contains(route) {
            return Err(AcceptanceError::Navigation {
                route: route.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".into(),
            });
        }
        let status = self.pages.get(route).map(|p| p.status).unwrap_or(200);
        self.land_on(route);
        Ok(Some(status))
    }

    async fn wait_for_stable(&mut self, _wait: StabilityWait) -> AcceptanceResult<Stability> {
        self.alive()?;
        if self.stalled_routes.contains(&self.current_route) {
            self.record(format!("timed out {}", self.current_route));
            Ok(Stability::TimedOut)
        } else {
            Ok(Stability::Idle)
        }
    }

    async fn current_url(&mut self) -> AcceptanceResult<String> {
        self.alive()?;
        Ok(join_route(&self.base_url, &self.current_route))
    }

    async fn title(&mut self) -> AcceptanceResult<String> {
        self.alive()?;
        Ok(self.current_page().title)
    }

    async fn query_all(&mut self, selector: &str) -> AcceptanceResult<Vec<ElementHandle>> {
        self.alive()?;
        if self.broken_selectors.contains(selector) {
            return Err(AcceptanceError::AssertionFault(format!(
                "invalid selector '{}'",
                selector
            )));
        }
        Ok(self
            .current_page()
            .elements
            .get(selector)
            .map(|texts| {
                texts
                    .iter()
                    .enumerate()
                    .map(|(index, text)| ElementHandle {
                        index,
                        text: text.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fill(&mut self, selector: &str, _value: &str) -> AcceptanceResult<()> {
        self.alive()?;
        self.record(format!("fill {}", selector));
        self.require_element(selector)
    }

    async fn click(&mut self, selector: &str) -> AcceptanceResult<()> {
        self.alive()?;
        self.record(format!("click {}", selector));
        self.require_element(selector)?;
        if selector == SUBMIT_SELECTOR {
            if let Some(route) = self.submit_route.clone() {
                self.land_on(&route);
            }
        }
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> AcceptanceResult<()> {
        self.alive()?;
        self.record(format!("screenshot {}", path.display()));
        if self.fail_screenshots {
            return Err(AcceptanceError::Capture {
                path: path.display().to_string(),
                reason: "disk full".into(),
            });
        }
        std::fs::write(path, format!("PNG {}", self.current_route))?;
        Ok(())
    }

    async fn close(&mut self) -> AcceptanceResult<()> {
        self.handles.closes.fetch_add(1, Ordering::SeqCst);
        self.dead = true;
        Ok(())
    }
}

/// Config with both roles' test credentials and no settle delays
pub fn test_config(output: &Path) -> RunConfig {
    let mut config = RunConfig {
        base_url: BASE_URL.to_string(),
        output_dir: output.to_path_buf(),
        timing: TimingConfig::immediate(),
        ..RunConfig::default()
    };
    config.credentials.insert(
        Role::Admin,
        Credentials {
            email: "admin@example.test".into(),
            password: "admin-test-password".into(),
        },
    );
    config.credentials.insert(
        Role::Pilot,
        Credentials {
            email: "pilot@example.test".into(),
            password: "pilot-test-password".into(),
        },
    );
    config
}

pub fn screenshot_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}

//! Scenario runner behaviour against a scripted page

mod common;

use common::{screenshot_files, test_config, FakeDriver, FakePage};
use fleet_acceptance::assertion::Verdict;
use fleet_acceptance::session::ERROR_SELECTOR;
use fleet_acceptance::{
    Assertion, Role, ScenarioRunner, ScenarioStep, StepStatus, SuiteDefinition,
};

fn suite(name: &str, role: Option<Role>, steps: Vec<ScenarioStep>) -> SuiteDefinition {
    SuiteDefinition {
        name: name.to_string(),
        description: String::new(),
        role,
        steps,
    }
}

fn dashboard_step(label: &str, route: &str, shot: &str) -> ScenarioStep {
    ScenarioStep::new(label, route, shot)
        .require(Assertion::url_contains("/dashboard"))
        .require(Assertion::url_excludes("/login"))
}

fn admin_site() -> FakeDriver {
    FakeDriver::new()
        .with_login("/dashboard")
        .page("/dashboard", FakePage::new().with("h1, h2", 1))
        .page("/dashboard/pilots", FakePage::new().with("tr", 5))
        .page("/dashboard/reports", FakePage::new().with("h1, h2", 1))
}

#[tokio::test]
async fn pilots_page_with_rows_passes() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let mut runner = ScenarioRunner::new(admin_site(), &config);

    let admin = suite(
        "admin",
        Some(Role::Admin),
        vec![dashboard_step("Pilots page accessible", "/dashboard/pilots", "pilots")
            .require(Assertion::element_count_at_least("tr", 2))],
    );
    let result = runner.run_suite(&admin).await;

    assert_eq!(result.statuses(), vec![StepStatus::Passed, StepStatus::Passed]);
    assert_eq!(result.steps()[0].message, "admin login successful");
    let pilots = &result.steps()[1];
    assert_eq!(pilots.message, "Pilots page accessible");
    assert_eq!(pilots.assertions.len(), 3);
    assert!(pilots.assertions.iter().all(|a| a.verdict.passed()));
    assert!(pilots.screenshot_path.as_ref().unwrap().exists());
    assert_eq!(pilots.screenshot_sha256.as_ref().unwrap().len(), 64);
}

#[tokio::test]
async fn every_assertion_is_evaluated() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::new().page("/reports", FakePage::new().with("tr", 1));
    let mut runner = ScenarioRunner::new(driver, &config);

    let anonymous = suite(
        "reports",
        None,
        vec![ScenarioStep::new("Reports", "/reports", "reports")
            .require(Assertion::element_count_at_least("tr", 2))
            .require(Assertion::TitleNonEmpty)],
    );
    let result = runner.run_suite(&anonymous).await;

    let step = &result.steps()[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.assertions.len(), 2);
    assert!(matches!(step.assertions[0].verdict, Verdict::Fail(_)));
    assert!(step.assertions[1].verdict.passed());
    assert!(step.message.starts_with("Reports failed: "));
}

#[tokio::test]
async fn failed_login_does_not_stop_the_suite() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = admin_site().submit_to("/auth/login").page(
        "/auth/login",
        FakePage::login_form().with_text(ERROR_SELECTOR, &["Invalid credentials"]),
    );
    let handles = driver.handles();
    let mut runner = ScenarioRunner::new(driver, &config);

    let admin = suite(
        "admin",
        Some(Role::Admin),
        vec![
            dashboard_step("Dashboard", "/dashboard", "admin_dashboard"),
            dashboard_step("Pilots", "/dashboard/pilots", "admin_pilots"),
        ],
    );
    let result = runner.run_suite(&admin).await;

    assert_eq!(result.steps().len(), 3);
    let login = &result.steps()[0];
    assert_eq!(login.status, StepStatus::Failed);
    assert_eq!(login.message, "admin login failed: Invalid credentials");
    assert!(handles.navigations().contains(&"/dashboard/pilots".to_string()));
    assert!(!result.aborted);
}

#[tokio::test]
async fn ambiguous_login_warns() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = admin_site().submit_to("/welcome");
    let mut runner = ScenarioRunner::new(driver, &config);

    let admin = suite(
        "admin",
        Some(Role::Admin),
        vec![dashboard_step("Dashboard", "/dashboard", "admin_dashboard")],
    );
    let result = runner.run_suite(&admin).await;

    let login = &result.steps()[0];
    assert_eq!(login.status, StepStatus::PassedWithWarning);
    assert!(login.message.contains("http://x/welcome"));
}

#[tokio::test]
async fn missing_credentials_fail_the_login_step() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.credentials.remove(&Role::Pilot);
    let driver = FakeDriver::new().with_login("/portal/dashboard");
    let handles = driver.handles();
    let mut runner = ScenarioRunner::new(driver, &config);

    let pilot = suite(
        "pilot",
        Some(Role::Pilot),
        vec![ScenarioStep::new("Portal", "/portal/dashboard", "portal")],
    );
    let result = runner.run_suite(&pilot).await;

    assert_eq!(result.steps()[0].status, StepStatus::Failed);
    assert!(result.steps()[0]
        .message
        .contains("No credentials configured for role 'pilot'"));
    assert!(!handles.calls().iter().any(|c| c.starts_with("fill")));
    assert_eq!(result.steps().len(), 2);
}

#[tokio::test]
async fn fatal_transport_aborts_the_suite_and_closes_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::new().fatal_on("/three");
    let handles = driver.handles();
    let runner = ScenarioRunner::new(driver, &config);

    let steps = ["/one", "/two", "/three", "/four", "/five"]
        .iter()
        .enumerate()
        .map(|(i, route)| ScenarioStep::new(format!("Step {}", i + 1), *route, format!("step_{}", i + 1)))
        .collect();
    let crash = suite("crash", None, steps);
    let report = runner.run(&[crash]).await;

    let result = &report.suites()[0];
    assert!(result.aborted);
    assert_eq!(result.steps().len(), 3);
    assert_eq!(
        result.statuses(),
        vec![StepStatus::Passed, StepStatus::Passed, StepStatus::Failed]
    );
    assert!(result.steps()[2].message.starts_with("Step 3 aborted: "));
    assert!(!handles.navigations().contains(&"/four".to_string()));
    assert_eq!(handles.closes(), 1);

    // Evidence from before the crash survives
    let shots = screenshot_files(&config.screenshot_dir());
    assert_eq!(shots.len(), 2);
    assert!(result.steps()[0].screenshot_path.as_ref().unwrap().exists());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn navigation_failure_fails_only_that_step() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::new()
        .unreachable("/down")
        .page("/up", FakePage::new());
    let mut runner = ScenarioRunner::new(driver, &config);

    let site = suite(
        "site",
        None,
        vec![
            ScenarioStep::new("Down", "/down", "down").require(Assertion::TitleNonEmpty),
            ScenarioStep::new("Up", "/up", "up").require(Assertion::TitleNonEmpty),
        ],
    );
    let result = runner.run_suite(&site).await;

    assert_eq!(result.statuses(), vec![StepStatus::Failed, StepStatus::Passed]);
    let down = &result.steps()[0];
    assert!(down.assertions.is_empty());
    assert!(down.errors[0].contains("ERR_CONNECTION_REFUSED"));
    // Evidence is still captured for the failed navigation
    assert!(down.screenshot_path.is_some());
}

#[tokio::test]
async fn optional_checks_and_routes_only_warn() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::new()
        .page("/portal/certifications", FakePage::new().with("tr", 1))
        .unreachable("/portal/settings");
    let mut runner = ScenarioRunner::new(driver, &config);

    let portal = suite(
        "portal",
        None,
        vec![
            ScenarioStep::new("Certifications", "/portal/certifications", "certs")
                .prefer(Assertion::element_count_at_least("tr", 2)),
            ScenarioStep::new("Settings", "/portal/settings", "settings").optional_route(),
        ],
    );
    let result = runner.run_suite(&portal).await;

    assert_eq!(
        result.statuses(),
        vec![StepStatus::PassedWithWarning, StepStatus::PassedWithWarning]
    );
    assert!(result.steps()[0].message.starts_with("Certifications (warning: "));
    assert!(result.steps()[1].message.contains("route not available"));
    assert_eq!(result.failed(), 0);
}

#[tokio::test]
async fn selector_fault_is_recorded_distinctly() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::new()
        .page("/pilots", FakePage::new())
        .broken_selector("tr:::");
    let mut runner = ScenarioRunner::new(driver, &config);

    let pilots = suite(
        "pilots",
        None,
        vec![ScenarioStep::new("Pilots", "/pilots", "pilots")
            .require(Assertion::element_count_at_least("tr:::", 1))],
    );
    let result = runner.run_suite(&pilots).await;

    let step = &result.steps()[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert!(matches!(step.assertions[0].verdict, Verdict::Fault(_)));
    assert!(step.errors.iter().any(|e| e.contains("invalid selector")));
}

#[tokio::test]
async fn capture_failure_keeps_the_step_status() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::new()
        .page("/", FakePage::new())
        .failing_screenshots();
    let mut runner = ScenarioRunner::new(driver, &config);

    let home = suite(
        "home",
        None,
        vec![ScenarioStep::new("Home", "/", "home").require(Assertion::TitleNonEmpty)],
    );
    let result = runner.run_suite(&home).await;

    let step = &result.steps()[0];
    assert_eq!(step.status, StepStatus::Passed);
    assert!(step.screenshot_path.is_none());
    assert!(step.screenshot_sha256.is_none());
    assert!(step.errors[0].contains("disk full"));
}

#[tokio::test]
async fn observations_are_collected_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::new().page(
        "/portal/dashboard",
        FakePage::new()
            .with_text("h1, h2", &["", "Welcome back, Captain"])
            .with("button", 4),
    );
    let mut runner = ScenarioRunner::new(driver, &config);

    let dashboard = suite(
        "dashboard",
        None,
        vec![ScenarioStep::new("Dashboard", "/portal/dashboard", "dash")
            .observe(fleet_acceptance::suite::Observation::first_text("Main heading", "h1, h2"))
            .observe(fleet_acceptance::suite::Observation::count("Buttons", "button"))
            .observe(fleet_acceptance::suite::Observation::first_text("Missing", "nav"))],
    );
    let result = runner.run_suite(&dashboard).await;

    let step = &result.steps()[0];
    assert_eq!(step.status, StepStatus::Passed);
    assert_eq!(
        step.observations,
        vec!["Main heading: Welcome back, Captain", "Buttons: 4"]
    );
}

#[tokio::test]
async fn role_changes_log_out_and_same_role_reuses_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = admin_site().page("/portal/dashboard", FakePage::new());
    let handles = driver.handles();
    let runner = ScenarioRunner::new(driver, &config);

    let suites = vec![
        suite("admin", Some(Role::Admin), vec![ScenarioStep::new("A", "/dashboard", "a")]),
        suite("pilot", Some(Role::Pilot), vec![ScenarioStep::new("P1", "/portal/dashboard", "p1")]),
        suite("pilot-more", Some(Role::Pilot), vec![ScenarioStep::new("P2", "/portal/dashboard", "p2")]),
        suite("public", None, vec![ScenarioStep::new("Home", "/", "home")]),
    ];
    let report = runner.run(&suites).await;

    let lengths: Vec<_> = report.suites().iter().map(|s| s.steps().len()).collect();
    assert_eq!(lengths, vec![2, 2, 1, 1]);

    let navigations = handles.navigations();
    let logouts: Vec<_> = navigations
        .iter()
        .enumerate()
        .filter(|(_, route)| route.as_str() == "/auth/logout")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(logouts.len(), 2);

    let pilot_login = navigations.iter().position(|r| r == "/portal/login").unwrap();
    assert!(logouts[0] < pilot_login);
    assert_eq!(navigations.iter().filter(|r| r.as_str() == "/portal/login").count(), 1);
    assert_eq!(handles.closes(), 1);
}

#[tokio::test]
async fn same_suite_twice_gives_the_same_statuses() {
    let admin = suite(
        "admin",
        Some(Role::Admin),
        vec![
            dashboard_step("Dashboard", "/dashboard", "admin_dashboard"),
            dashboard_step("Pilots", "/dashboard/pilots", "admin_pilots")
                .require(Assertion::element_count_at_least("tr", 10)),
            dashboard_step("Reports", "/dashboard/reports", "admin_reports"),
        ],
    );

    let mut runs = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let report = ScenarioRunner::new(admin_site(), &config).run(&[admin.clone()]).await;
        runs.push(report.suites()[0].statuses());
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(
        runs[0],
        vec![
            StepStatus::Passed,
            StepStatus::Passed,
            StepStatus::Failed,
            StepStatus::Passed
        ]
    );
}

#[tokio::test]
async fn step_count_matches_declared_steps() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::new()
        .with_login("/portal/dashboard")
        .page("/", FakePage::new())
        .page("/dashboard", FakePage::new().redirects_to("/auth/login"))
        .page("/portal/login", FakePage::login_form());
    let runner = ScenarioRunner::new(driver, &config);

    let suites = fleet_acceptance::catalog::builtin();
    let report = runner.run(&suites).await;

    for (definition, result) in suites.iter().zip(report.suites()) {
        let login = usize::from(definition.role.is_some() && result.suite != "pilot-comprehensive");
        assert_eq!(result.steps().len(), definition.steps.len() + login, "{}", result.suite);
    }

    let public = &report.suites()[0];
    assert_eq!(
        public.statuses(),
        vec![StepStatus::Passed, StepStatus::Passed, StepStatus::Passed]
    );
}

#[tokio::test]
async fn busy_network_still_evaluates_the_step() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = admin_site().stalls_on("/dashboard/pilots");
    let handles = driver.handles();
    let mut runner = ScenarioRunner::new(driver, &config);

    let admin = suite(
        "admin",
        Some(Role::Admin),
        vec![dashboard_step("Pilots", "/dashboard/pilots", "pilots")
            .require(Assertion::element_count_at_least("tr", 2))],
    );
    let result = runner.run_suite(&admin).await;

    assert!(handles.calls().contains(&"timed out /dashboard/pilots".to_string()));
    let pilots = &result.steps()[1];
    assert_eq!(pilots.status, StepStatus::Passed);
    assert_eq!(pilots.assertions.len(), 3);
    assert!(pilots.screenshot_path.is_some());
}

#[tokio::test]
async fn fatal_transport_during_login_skips_the_suite() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = admin_site().fatal_on("/auth/login");
    let handles = driver.handles();
    let runner = ScenarioRunner::new(driver, &config);

    let suites = vec![
        suite(
            "admin",
            Some(Role::Admin),
            vec![
                dashboard_step("Dashboard", "/dashboard", "admin_dashboard"),
                dashboard_step("Pilots", "/dashboard/pilots", "admin_pilots"),
            ],
        ),
        suite(
            "admin-again",
            Some(Role::Admin),
            vec![dashboard_step("Reports", "/dashboard/reports", "admin_reports")],
        ),
    ];
    let report = runner.run(&suites).await;

    let first = &report.suites()[0];
    assert!(first.aborted);
    assert_eq!(first.statuses(), vec![StepStatus::Failed]);
    assert!(first.steps()[0].message.starts_with("Login as admin aborted: "));
    assert!(!handles.navigations().contains(&"/dashboard".to_string()));

    // The session was reset, so the next suite for the same role logs in again
    let second = &report.suites()[1];
    assert_eq!(second.steps().len(), 1);
    assert_eq!(second.steps()[0].label, "Login as admin");
    assert!(second.aborted);

    assert_eq!(handles.closes(), 1);
    assert_eq!(report.exit_code(), 1);
}

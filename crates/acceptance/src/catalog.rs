//! Built-in suites for the fleet management application
//!
//! `public` probes the app without a session, `admin` walks the dashboard,
//! `pilot` and `pilot-comprehensive` walk the self-service portal.

use crate::assertion::Assertion;
use crate::role::Role;
use crate::suite::{Observation, ScenarioStep, SuiteDefinition, WaitPolicy};

const ACTION_BUTTONS: &str =
    r#"button:has-text("Submit"), button:has-text("New"), button:has-text("Create")"#;

/// All built-in suites in their default run order
pub fn builtin() -> Vec<SuiteDefinition> {
    vec![public(), admin(), pilot(), pilot_comprehensive()]
}

/// Find a built-in suite by name
pub fn find(name: &str) -> Option<SuiteDefinition> {
    builtin().into_iter().find(|suite| suite.name == name)
}

fn admin_page(label: &str, route: &str, screenshot: &str) -> ScenarioStep {
    ScenarioStep::new(label, route, screenshot)
        .require(Assertion::url_contains("/dashboard"))
        .require(Assertion::url_excludes("/login"))
}

fn portal_page(label: &str, route: &str, screenshot: &str) -> ScenarioStep {
    ScenarioStep::new(label, route, screenshot)
        .require(Assertion::url_contains("/portal"))
        .require(Assertion::url_excludes("/login"))
}

/// Unauthenticated probe of the landing page, the auth redirect and the
/// portal login form
pub fn public() -> SuiteDefinition {
    SuiteDefinition {
        name: "public".to_string(),
        description: "Landing page, auth redirect and portal login form without a session"
            .to_string(),
        role: None,
        steps: vec![
            ScenarioStep::new("Home page loaded", "/", "public_01_home")
                .with_wait(WaitPolicy::settle(1_000))
                .require(Assertion::TitleNonEmpty),
            // Without a session the dashboard should bounce to login
            ScenarioStep::new("Dashboard requires authentication", "/dashboard", "public_02_dashboard")
                .require(Assertion::url_contains("/login")),
            ScenarioStep::new("Pilot portal login page loaded", "/portal/login", "public_03_portal_login")
                .require(Assertion::element_count_at_least(r#"input[type="email"]"#, 1))
                .require(Assertion::element_count_at_least(r#"input[type="password"]"#, 1)),
        ],
    }
}

/// Admin dashboard walk-through
pub fn admin() -> SuiteDefinition {
    SuiteDefinition {
        name: "admin".to_string(),
        description: "Admin dashboard pages behind authentication".to_string(),
        role: Some(Role::Admin),
        steps: vec![
            admin_page("Admin dashboard accessible", "/dashboard", "admin_01_dashboard"),
            admin_page("Pilots page accessible", "/dashboard/pilots", "admin_02_pilots")
                .prefer(Assertion::element_count_at_least("tr", 2))
                .observe(Observation::count("Pilot table rows", "tr")),
            admin_page(
                "Certifications page accessible",
                "/dashboard/certifications",
                "admin_03_certifications",
            ),
            admin_page("Reports page functional", "/dashboard/reports", "admin_04_reports")
                .require(Assertion::element_count_at_least("h1, h2", 1))
                .observe(Observation::count("Report buttons", "button")),
            admin_page(
                "Leave requests page accessible",
                "/dashboard/leave-requests",
                "admin_05_leave_requests",
            ),
            admin_page(
                "Flight requests page accessible",
                "/dashboard/flight-requests",
                "admin_06_flight_requests",
            ),
        ],
    }
}

/// Pilot portal pages
pub fn pilot() -> SuiteDefinition {
    SuiteDefinition {
        name: "pilot".to_string(),
        description: "Pilot self-service portal pages".to_string(),
        role: Some(Role::Pilot),
        steps: vec![
            portal_page("Pilot dashboard accessible", "/portal/dashboard", "pilot_01_dashboard")
                .observe(Observation::first_text("Main heading", "h1, h2")),
            portal_page(
                "Pilot leave requests loaded",
                "/portal/leave-requests",
                "pilot_02_leave_requests",
            ),
            portal_page(
                "Pilot flight requests loaded",
                "/portal/flight-requests",
                "pilot_03_flight_requests",
            ),
            portal_page("Pilot profile loaded", "/portal/profile", "pilot_04_profile"),
            portal_page(
                "Pilot certifications loaded",
                "/portal/certifications",
                "pilot_05_certifications",
            ),
        ],
    }
}

/// Detailed portal walk-through with content checks and optional pages
pub fn pilot_comprehensive() -> SuiteDefinition {
    SuiteDefinition {
        name: "pilot-comprehensive".to_string(),
        description: "Portal content checks, including pages that may not exist yet".to_string(),
        role: Some(Role::Pilot),
        steps: vec![
            portal_page(
                "Dashboard loaded with content",
                "/portal/dashboard",
                "pilot_comprehensive_01_dashboard",
            )
            .require(Assertion::element_count_at_least("h1, h2, h3", 1))
            .observe(Observation::first_text("Main heading", "h1, h2, h3"))
            .observe(Observation::count("Dashboard cards", r#"[class*="card"]"#))
            .observe(Observation::count("Dashboard buttons", "button")),
            portal_page("Profile page loaded", "/portal/profile", "pilot_comprehensive_02_profile")
                .observe(Observation::first_text("Pilot", "h1, h2"))
                .observe(Observation::count("Profile labels", "label"))
                .observe(Observation::count("Profile inputs", "input")),
            portal_page(
                "Certifications page loaded",
                "/portal/certifications",
                "pilot_comprehensive_03_certifications",
            )
            .prefer(Assertion::element_count_at_least("tr", 2))
            .observe(Observation::count("Certification tables", "table"))
            .observe(Observation::count("Certification rows", "tr")),
            portal_page(
                "Leave requests page loaded",
                "/portal/leave-requests",
                "pilot_comprehensive_04_leave",
            )
            .prefer(Assertion::element_count_at_least(ACTION_BUTTONS, 1))
            .observe(Observation::count("Leave request forms", "form")),
            portal_page(
                "Flight requests page loaded",
                "/portal/flight-requests",
                "pilot_comprehensive_05_flights",
            )
            .prefer(Assertion::element_count_at_least(ACTION_BUTTONS, 1))
            .observe(Observation::count("Flight request tables", "table")),
            portal_page(
                "Notifications page loaded",
                "/portal/notifications",
                "pilot_comprehensive_06_notifications",
            )
            .with_wait(WaitPolicy {
                idle_timeout_ms: Some(5_000),
                settle_ms: None,
            })
            .optional_route(),
            portal_page(
                "Settings page loaded",
                "/portal/settings",
                "pilot_comprehensive_07_settings",
            )
            .with_wait(WaitPolicy {
                idle_timeout_ms: Some(5_000),
                settle_ms: None,
            })
            .optional_route(),
        ],
    }
}

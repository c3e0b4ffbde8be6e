//! Authenticated identities and how each one logs in

use serde::{Deserialize, Serialize};
use std::fmt;

/// An authenticated identity type of the application under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Pilot,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Admin, Role::Pilot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Pilot => "pilot",
        }
    }

    /// Prefix for environment variables carrying this role's secrets
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Role::Admin => "ACCEPTANCE_ADMIN",
            Role::Pilot => "ACCEPTANCE_PILOT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login secrets for one role. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

/// Optional per-role route overrides read from configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleOverrides {
    #[serde(default)]
    pub login_route: Option<String>,

    #[serde(default)]
    pub success_markers: Option<Vec<String>>,

    #[serde(default)]
    pub logout_route: Option<String>,
}

/// Everything the session controller needs to enter and leave a role
#[derive(Debug, Clone)]
pub struct RoleProfile {
    pub role: Role,

    /// `None` when no secrets were configured for this role
    pub credentials: Option<Credentials>,

    /// Route serving the email/password form
    pub login_route: String,

    /// URL substrings that signal a successful login
    pub success_markers: Vec<String>,

    /// URL substring that means we are still on a login page
    pub login_marker: String,

    pub logout_route: Option<String>,

    /// Control clicked when the logout route is unavailable
    pub logout_selector: String,
}

pub const DEFAULT_LOGOUT_SELECTOR: &str =
    r#"button:has-text("Logout"), a:has-text("Logout"), button:has-text("Sign Out")"#;

impl RoleProfile {
    /// Built-in profile for a role
    pub fn for_role(role: Role, credentials: Option<Credentials>) -> Self {
        let (login_route, success_markers) = match role {
            Role::Admin => ("/auth/login", vec!["/dashboard".to_string()]),
            Role::Pilot => (
                "/portal/login",
                vec!["/portal".to_string(), "/dashboard".to_string()],
            ),
        };

        Self {
            role,
            credentials,
            login_route: login_route.to_string(),
            success_markers,
            login_marker: "/login".to_string(),
            logout_route: Some("/auth/logout".to_string()),
            logout_selector: DEFAULT_LOGOUT_SELECTOR.to_string(),
        }
    }

    /// Apply configuration overrides on top of the built-in profile
    pub fn with_overrides(mut self, overrides: &RoleOverrides) -> Self {
        if let Some(route) = &overrides.login_route {
            self.login_route = route.clone();
        }
        if let Some(markers) = &overrides.success_markers {
            self.success_markers = markers.clone();
        }
        if let Some(route) = &overrides.logout_route {
            self.logout_route = Some(route.clone());
        }
        self
    }
}

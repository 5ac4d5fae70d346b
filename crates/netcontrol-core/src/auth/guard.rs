//! Route guarding.
//!
//! Pages are either public (login, registration) or protected. The guard
//! decides where a visitor should end up given whether they are signed in,
//! and `Navigator` holds the client's current location.

use std::sync::Mutex;

use tracing::debug;

/// Landing page for signed-in users.
pub const LANDING_PATH: &str = "/index.html";

pub const LOGIN_PATH: &str = "/login.html";

pub const REGISTER_PATH: &str = "/register.html";

const PUBLIC_PATHS: [&str; 2] = [LOGIN_PATH, REGISTER_PATH];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Stay,
    Redirect(String),
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path_only(path))
}

/// Where a visitor on `path` should be sent.
pub fn decide(path: &str, authenticated: bool) -> GuardDecision {
    let path = path_only(path);
    match (is_public(path), authenticated) {
        (true, true) => GuardDecision::Redirect(LANDING_PATH.to_string()),
        (false, false) => GuardDecision::Redirect(login_redirect_for(path)),
        _ => GuardDecision::Stay,
    }
}

/// Login location that resumes at `path` after signing in.
pub fn login_redirect_for(path: &str) -> String {
    format!("{}?redirect={}", LOGIN_PATH, urlencoding::encode(path))
}

/// Logout confirmation location.
pub fn logout_location() -> String {
    format!("{}?logout=true", LOGIN_PATH)
}

/// The `redirect` target carried by a login location, when it is a same-site
/// protected path.
pub fn resume_target(location: &str) -> Option<String> {
    let (_, query) = location.split_once('?')?;
    let target = query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "redirect").then_some(value)
    })?;
    let decoded = urlencoding::decode(target).ok()?.into_owned();

    let same_site = decoded.starts_with('/') && !decoded.starts_with("//");
    if same_site && !is_public(&decoded) {
        Some(decoded)
    } else {
        debug!(target = %decoded, "Ignoring unsafe redirect target");
        None
    }
}

fn path_only(location: &str) -> &str {
    location.split(['?', '#']).next().unwrap_or(location)
}

/// The client's current location (path plus query).
#[derive(Debug)]
pub struct Navigator {
    location: Mutex<String>,
}

impl Navigator {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(initial.into()),
        }
    }

    pub fn current(&self) -> String {
        match self.location.lock() {
            Ok(location) => location.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn go(&self, location: impl Into<String>) {
        let location = location.into();
        debug!(to = %location, "Navigating");
        match self.location.lock() {
            Ok(mut current) => *current = location,
            Err(poisoned) => *poisoned.into_inner() = location,
        }
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(LANDING_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_public_paths() {
        assert_eq!(
            decide("/login.html", true),
            GuardDecision::Redirect("/index.html".to_string())
        );
        assert_eq!(decide("/login.html", false), GuardDecision::Stay);
        assert_eq!(decide("/register.html?x=1", false), GuardDecision::Stay);
    }

    #[test]
    fn test_decide_protected_paths() {
        assert_eq!(decide("/index.html", true), GuardDecision::Stay);
        assert_eq!(
            decide("/settings/devices.html", false),
            GuardDecision::Redirect("/login.html?redirect=%2Fsettings%2Fdevices.html".to_string())
        );
    }

    #[test]
    fn test_resume_target() {
        assert_eq!(
            resume_target("/login.html?redirect=%2Fschedules.html").as_deref(),
            Some("/schedules.html")
        );
        assert_eq!(resume_target("/login.html?logout=true"), None);
        assert_eq!(resume_target("/login.html"), None);
        assert_eq!(resume_target("/login.html?redirect=https%3A%2F%2Fevil.example"), None);
        assert_eq!(resume_target("/login.html?redirect=%2F%2Fevil.example"), None);
        assert_eq!(resume_target("/login.html?redirect=%2Flogin.html"), None);
    }

    #[test]
    fn test_navigator_tracks_location() {
        let nav = Navigator::new("/login.html");
        assert_eq!(nav.current(), "/login.html");
        nav.go(logout_location());
        assert_eq!(nav.current(), "/login.html?logout=true");
    }
}

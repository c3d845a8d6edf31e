//! Role portals.
//!
//! Each role has a landing page with a greeting and a fixed set of tabs. Tab selection is the
//! only logic: an unknown or missing tab falls back to the first one.

use crate::session::{Role, User};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortalTab {
    pub id: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalView {
    pub role: Role,
    pub path: &'static str,
    pub greeting: String,
    pub tabs: Vec<PortalTab>,
    pub active_tab: &'static str,
}

const PATIENT_TABS: &[PortalTab] = &[
    PortalTab {
        id: "overview",
        label: "Overview",
    },
    PortalTab {
        id: "history",
        label: "X-Ray History",
    },
    PortalTab {
        id: "upload",
        label: "Upload New X-Ray",
    },
];

const DOCTOR_TABS: &[PortalTab] = &[
    PortalTab {
        id: "dashboard",
        label: "Dashboard",
    },
    PortalTab {
        id: "pending",
        label: "Pending Reviews",
    },
    PortalTab {
        id: "patients",
        label: "My Patients",
    },
];

const ADMIN_TABS: &[PortalTab] = &[PortalTab {
    id: "overview",
    label: "System Overview",
}];

pub fn tabs_for(role: Role) -> &'static [PortalTab] {
    match role {
        Role::Patient => PATIENT_TABS,
        Role::Doctor => DOCTOR_TABS,
        Role::Admin => ADMIN_TABS,
    }
}

/// Builds the portal page for `user`, selecting `requested_tab` when it exists.
pub fn portal_view(user: &User, requested_tab: Option<&str>) -> PortalView {
    let tabs = tabs_for(user.role);
    let active_tab = requested_tab
        .and_then(|requested| tabs.iter().find(|t| t.id == requested))
        .or_else(|| tabs.first())
        .map(|t| t.id)
        .unwrap_or_default();

    PortalView {
        role: user.role,
        path: user.role.portal_path(),
        greeting: user.greeting(),
        tabs: tabs.to_vec(),
        active_tab,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserDirectory;

    fn user(role: Role) -> User {
        UserDirectory::mock()
            .users()
            .iter()
            .find(|u| u.role == role)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_default_tab_is_first() {
        let view = portal_view(&user(Role::Doctor), None);
        assert_eq!(view.active_tab, "dashboard");
        assert_eq!(view.path, "/doctor-portal");
        assert_eq!(view.greeting, "Welcome, Dr. Sarah Wilson");
    }

    #[test]
    fn test_requested_tab_is_selected() {
        let view = portal_view(&user(Role::Patient), Some("upload"));
        assert_eq!(view.active_tab, "upload");
        assert_eq!(view.tabs.len(), 3);
    }

    #[test]
    fn test_unknown_tab_falls_back() {
        let view = portal_view(&user(Role::Patient), Some("pending"));
        assert_eq!(view.active_tab, "overview");
    }

    #[test]
    fn test_admin_portal() {
        let view = portal_view(&user(Role::Admin), Some("anything"));
        assert_eq!(view.path, "/admin-dashboard");
        assert_eq!(view.active_tab, "overview");
    }
}

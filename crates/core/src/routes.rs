//! Route guards.
//!
//! Maps a settled [`SessionState`] to the view a client should land on. While the session is
//! still `Loading` no decision is made.

use crate::model::Role;
use crate::session::SessionState;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Login,
    AdminPanel,
    PatientProfile,
    DoctorProfile,
}

/// The view for `state`, or `None` while the session is loading.
pub fn landing_view(state: &SessionState) -> Option<View> {
    match state {
        SessionState::Loading => None,
        SessionState::Anonymous => Some(View::Login),
        SessionState::Authenticated(account) => Some(profile_view(account.role())),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(View),
}

/// Guard for the administrator panel.
///
/// Anonymous clients are sent to the login view and non-admins to their own profile.
pub fn admin_route(state: &SessionState) -> Option<RouteDecision> {
    landing_view(state).map(|view| match view {
        View::AdminPanel => RouteDecision::Allow,
        other => RouteDecision::Redirect(other),
    })
}

fn profile_view(role: Role) -> View {
    match role {
        Role::Admin => View::AdminPanel,
        Role::Patient => View::PatientProfile,
        Role::Doctor => View::DoctorProfile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DocumentId;
    use crate::model::{Account, AccountProfile};
    use portal_types::{InsuranceNumber, NonEmptyText};

    fn signed_in(role: Role) -> SessionState {
        SessionState::Authenticated(Account {
            id: DocumentId::generate(),
            profile: AccountProfile {
                insurance_number: InsuranceNumber::parse("77").unwrap(),
                role,
                name: NonEmptyText::new("Someone").unwrap(),
            },
        })
    }

    #[test]
    fn loading_blocks_navigation() {
        assert_eq!(landing_view(&SessionState::Loading), None);
        assert_eq!(admin_route(&SessionState::Loading), None);
    }

    #[test]
    fn landing_view_follows_role() {
        assert_eq!(landing_view(&SessionState::Anonymous), Some(View::Login));
        assert_eq!(landing_view(&signed_in(Role::Admin)), Some(View::AdminPanel));
        assert_eq!(
            landing_view(&signed_in(Role::Patient)),
            Some(View::PatientProfile)
        );
        assert_eq!(
            landing_view(&signed_in(Role::Doctor)),
            Some(View::DoctorProfile)
        );
    }

    #[test]
    fn admin_route_redirects_non_admins_to_profile() {
        assert_eq!(
            admin_route(&signed_in(Role::Admin)),
            Some(RouteDecision::Allow)
        );
        assert_eq!(
            admin_route(&signed_in(Role::Doctor)),
            Some(RouteDecision::Redirect(View::DoctorProfile))
        );
        assert_eq!(
            admin_route(&signed_in(Role::Patient)),
            Some(RouteDecision::Redirect(View::PatientProfile))
        );
        assert_eq!(
            admin_route(&SessionState::Anonymous),
            Some(RouteDecision::Redirect(View::Login))
        );
    }
}

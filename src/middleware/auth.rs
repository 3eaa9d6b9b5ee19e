//! Authorization middleware
//!
//! Maps member roles to the permissions that gate every mutation.

use tracing::{debug, warn};

use crate::models::user::{UserProfile, UserRole};
use crate::utils::errors::{ClubError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewEvents,
    Register,
    SubmitFeedback,
    ManageEvents,
    ManageRegistrations,
    MarkAttendance,
    RespondFeedback,
    ManageUsers,
}

impl Permission {
    fn denial_message(&self) -> &'static str {
        match self {
            Permission::ViewEvents => "You are not allowed to view events",
            Permission::Register => "Guests cannot register for events, please sign in",
            Permission::SubmitFeedback => "Guests cannot submit feedback, please sign in",
            Permission::ManageEvents => "Only executives can manage events",
            Permission::ManageRegistrations => "Only executives can manage registrations",
            Permission::MarkAttendance => "Only executives can mark attendance",
            Permission::RespondFeedback => "Only executives can respond to feedback",
            Permission::ManageUsers => "Only executives can manage members",
        }
    }
}

/// Role-based permission checks
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    pub fn new() -> Self {
        Self
    }

    pub fn role_allows(role: UserRole, permission: Permission) -> bool {
        match role {
            UserRole::Executive => true,
            UserRole::Student => matches!(
                permission,
                Permission::ViewEvents | Permission::Register | Permission::SubmitFeedback
            ),
            UserRole::Guest => permission == Permission::ViewEvents,
        }
    }

    /// Whether `user` holds `permission`; deactivated accounts hold none
    pub fn can(&self, user: &UserProfile, permission: Permission) -> bool {
        user.is_active && Self::role_allows(user.role, permission)
    }

    pub fn require(&self, user: &UserProfile, permission: Permission) -> Result<()> {
        if !user.is_active {
            warn!(uid = %user.uid, ?permission, "Deactivated account attempted an action");
            return Err(ClubError::Authorization(
                "This account has been deactivated".to_string(),
            ));
        }

        if Self::role_allows(user.role, permission) {
            debug!(uid = %user.uid, ?permission, "Permission granted");
            Ok(())
        } else {
            warn!(uid = %user.uid, role = ?user.role, ?permission, "Permission denied");
            Err(ClubError::Authorization(
                permission.denial_message().to_string(),
            ))
        }
    }

    /// Executives may act on anyone's resources; others only on their own
    pub fn require_owner_or(&self, user: &UserProfile, owner_id: &str, permission: Permission) -> Result<()> {
        if user.is_active && !user.is_guest() && user.uid == owner_id {
            return Ok(());
        }
        self.require(user, permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: UserRole) -> UserProfile {
        let mut profile = UserProfile::guest("u1", Utc::now());
        profile.role = role;
        profile
    }

    #[test]
    fn test_role_permissions() {
        let auth = Authorizer::new();
        let exec = user(UserRole::Executive);
        let student = user(UserRole::Student);
        let guest = user(UserRole::Guest);

        assert!(auth.require(&exec, Permission::MarkAttendance).is_ok());
        assert!(auth.require(&student, Permission::Register).is_ok());
        assert!(auth.require(&student, Permission::ManageEvents).is_err());
        assert!(auth.require(&guest, Permission::ViewEvents).is_ok());
        assert!(auth.require(&guest, Permission::Register).is_err());
        assert!(auth.require(&guest, Permission::SubmitFeedback).is_err());
    }

    #[test]
    fn test_inactive_accounts_hold_nothing() {
        let auth = Authorizer::new();
        let mut exec = user(UserRole::Executive);
        exec.is_active = false;
        assert!(!auth.can(&exec, Permission::ViewEvents));
        assert!(matches!(
            auth.require(&exec, Permission::ManageEvents),
            Err(ClubError::Authorization(_))
        ));
    }

    #[test]
    fn test_owner_check() {
        let auth = Authorizer::new();
        let student = user(UserRole::Student);
        assert!(auth
            .require_owner_or(&student, "u1", Permission::ManageRegistrations)
            .is_ok());
        assert!(auth
            .require_owner_or(&student, "u2", Permission::ManageRegistrations)
            .is_err());
        let guest = user(UserRole::Guest);
        assert!(auth
            .require_owner_or(&guest, "u1", Permission::ManageRegistrations)
            .is_err());
    }
}

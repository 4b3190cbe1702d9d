//! Role checks shared by the command layer

use crate::error::{AppError, AppResult};
use crate::models::{MemberRole, SessionUser};

/// Minimal membership view needed for access decisions
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MemberRef {
    pub user_id: String,
    pub role: MemberRole,
}

pub fn is_admin(user: &SessionUser) -> bool {
    user.is_admin()
}

/// Owner filter for scoped listings: `None` for admins, the caller's id otherwise
pub fn user_filter(user: &SessionUser) -> Option<&str> {
    if is_admin(user) {
        None
    } else {
        Some(user.id.as_str())
    }
}

pub fn can_access_project(user: &SessionUser, members: &[MemberRef]) -> bool {
    is_admin(user) || members.iter().any(|m| m.user_id == user.id)
}

pub fn can_manage_project(user: &SessionUser, members: &[MemberRef]) -> bool {
    is_admin(user)
        || members
            .iter()
            .any(|m| m.user_id == user.id && m.role == MemberRole::Owner)
}

pub fn require_admin(user: &SessionUser) -> AppResult<()> {
    if is_admin(user) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn session(id: &str, role: UserRole) -> SessionUser {
        SessionUser {
            id: id.to_string(),
            name: id.to_string(),
            email: format!("{}@example.com", id),
            role,
        }
    }

    fn member(id: &str, role: MemberRole) -> MemberRef {
        MemberRef {
            user_id: id.to_string(),
            role,
        }
    }

    #[test]
    fn admin_bypasses_membership() {
        let admin = session("root", UserRole::Admin);
        assert!(can_access_project(&admin, &[]));
        assert!(can_manage_project(&admin, &[]));
        assert_eq!(user_filter(&admin), None);
    }

    #[test]
    fn member_can_access_but_not_manage() {
        let user = session("u1", UserRole::User);
        let members = vec![member("owner", MemberRole::Owner), member("u1", MemberRole::Member)];
        assert!(can_access_project(&user, &members));
        assert!(!can_manage_project(&user, &members));
        assert_eq!(user_filter(&user), Some("u1"));
    }

    #[test]
    fn outsider_has_no_access() {
        let user = session("u2", UserRole::User);
        let members = vec![member("owner", MemberRole::Owner)];
        assert!(!can_access_project(&user, &members));
        assert!(require_admin(&user).is_err());
    }
}

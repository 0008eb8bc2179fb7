//! Permission rules.
//!
//! Anonymous requests may only use public views. Administrators hold every
//! permission. Other authenticated users hold the plain CRUD permissions of
//! every model (`*_create`, `*_read`, `*_update`, `*_delete`) plus
//! [`API_DESCRIBE`]; everything else (actions, field level permissions) is
//! reserved to administrators unless a view declares otherwise.

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

/// Permission that requires no authentication
pub const PUBLIC: &str = "public";

/// Permission to read API descriptions
pub const API_DESCRIBE: &str = "api_describe";

const AUTHENTICATED_SUFFIXES: [&str; 4] = ["_create", "_read", "_update", "_delete"];

/// Who is making the current request
#[derive(Debug, Clone, Default)]
pub struct Identity {
    user: Option<AuthUser>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: AuthUser) -> Self {
        Self { user: Some(user) }
    }

    /// Regular user with the given id
    pub fn user(user_id: i64) -> Self {
        Self::authenticated(AuthUser {
            user_id,
            email: String::new(),
            is_admin: false,
        })
    }

    /// Administrator with the given id
    pub fn admin(user_id: i64) -> Self {
        Self::authenticated(AuthUser {
            user_id,
            email: String::new(),
            is_admin: true,
        })
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().map(|u| u.is_admin).unwrap_or(false)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        if permission == PUBLIC {
            return true;
        }

        match &self.user {
            None => false,
            Some(user) if user.is_admin => true,
            Some(_) => {
                permission == API_DESCRIBE
                    || AUTHENTICATED_SUFFIXES.iter().any(|suffix| permission.ends_with(suffix))
            }
        }
    }

    /// Fail with 401 for anonymous users and 403 for users lacking the permission
    pub fn check_permission(&self, permission: &str) -> Result<(), ApiError> {
        if self.has_permission(permission) {
            return Ok(());
        }
        if !self.is_authenticated() {
            return Err(ApiError::unauthorized("Authentication required"));
        }
        tracing::debug!(
            "Permission {} denied for user {:?}",
            permission,
            self.user_id()
        );
        Err(ApiError::forbidden(format!("Permission denied: {}", permission)))
    }
}

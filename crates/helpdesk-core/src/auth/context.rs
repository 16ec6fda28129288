use uuid::Uuid;

use super::session::Session;
use crate::error::{HelpdeskError, Result};
use crate::schema::Role;

/// Caller identity passed explicitly to every backend call.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// The authenticated user ID (if any).
    user_id: Option<Uuid>,
    /// Service-granted role.
    role: Option<Role>,
    /// Tenant of the caller.
    client_id: Option<Uuid>,
    /// Bearer token forwarded to the hosted backend.
    access_token: Option<String>,
}

impl AuthContext {
    /// Create an anonymous context.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create an authenticated context.
    pub fn authenticated(user_id: Uuid, role: Option<Role>, client_id: Option<Uuid>) -> Self {
        Self {
            user_id: Some(user_id),
            role,
            client_id,
            access_token: None,
        }
    }

    /// Create the context for a live session.
    pub fn from_session(session: &Session) -> Self {
        Self {
            user_id: Some(session.user.id),
            role: session.user.role,
            client_id: session.user.client_id,
            access_token: Some(session.access_token.clone()),
        }
    }

    /// Attach a bearer token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Check if the caller is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Get the user ID if authenticated.
    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    /// Get the user ID, returning an error if not authenticated.
    pub fn require_user_id(&self) -> Result<Uuid> {
        self.user_id
            .ok_or_else(|| HelpdeskError::Unauthorized("User not authenticated".into()))
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    pub fn is_staff(&self) -> bool {
        self.role.map(|r| r.is_staff()).unwrap_or(false)
    }

    /// Check if the caller holds one of the given roles.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role.map(|r| roles.contains(&r)).unwrap_or(false)
    }

    /// Require one of the given roles, returning an error if absent.
    pub fn require_any_role(&self, roles: &[Role]) -> Result<()> {
        if self.has_any_role(roles) {
            Ok(())
        } else {
            let wanted: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
            Err(HelpdeskError::Forbidden(format!(
                "Requires role {}",
                wanted.join(" or ")
            )))
        }
    }

    /// Tenant of the caller, if the identity is bound to one.
    pub fn client_id(&self) -> Option<Uuid> {
        self.client_id
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_context_anonymous() {
        let ctx = AuthContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert!(ctx.user_id().is_none());
        assert!(ctx.require_user_id().is_err());
        assert!(!ctx.is_staff());
        assert!(ctx.access_token().is_none());
    }

    #[test]
    fn test_auth_context_authenticated() {
        let user_id = Uuid::new_v4();
        let ctx = AuthContext::authenticated(user_id, Some(Role::Agent), None);

        assert!(ctx.is_authenticated());
        assert_eq!(ctx.user_id(), Some(user_id));
        assert!(ctx.is_staff());
        assert!(!ctx.is_admin());
        assert!(ctx.require_any_role(&[Role::Admin, Role::Agent]).is_ok());
        assert!(ctx.require_any_role(&[Role::Admin]).is_err());
    }

    #[test]
    fn test_role_less_identity_is_not_staff() {
        let ctx = AuthContext::authenticated(Uuid::new_v4(), None, None);
        assert!(ctx.is_authenticated());
        assert!(!ctx.is_staff());
        assert!(ctx.require_any_role(&[Role::ClientContact]).is_err());
    }
}

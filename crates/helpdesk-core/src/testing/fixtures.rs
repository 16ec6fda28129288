//! Builders for identities and sessions used across tests.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{AuthContext, AuthUser, Session};
use crate::schema::{ContactInfo, NewClient, Role};

/// Builder for a test identity.
///
/// # Example
///
/// ```ignore
/// let auth = TestIdentity::builder()
///     .with_role(Role::ClientContact)
///     .in_client(client_id)
///     .build_context();
/// ```
#[derive(Debug, Clone)]
pub struct TestIdentity {
    user_id: Uuid,
    email: String,
    role: Option<Role>,
    client_id: Option<Uuid>,
    full_name: Option<String>,
}

impl Default for TestIdentity {
    fn default() -> Self {
        let user_id = Uuid::new_v4();
        Self {
            user_id,
            email: format!("user-{}@example.com", user_id.simple()),
            role: None,
            client_id: None,
            full_name: None,
        }
    }
}

impl TestIdentity {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn admin() -> Self {
        Self::default().with_role(Role::Admin)
    }

    pub fn agent() -> Self {
        Self::default().with_role(Role::Agent)
    }

    pub fn contact(client_id: Uuid) -> Self {
        Self::default()
            .with_role(Role::ClientContact)
            .in_client(client_id)
    }

    pub fn as_user(mut self, id: Uuid) -> Self {
        self.user_id = id;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn in_client(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn user(&self) -> AuthUser {
        AuthUser {
            id: self.user_id,
            email: Some(self.email.clone()),
            role: self.role,
            client_id: self.client_id,
            full_name: self.full_name.clone(),
        }
    }

    /// Session valid for one hour.
    pub fn build_session(&self) -> Session {
        Session {
            access_token: format!("access-{}", self.user_id.simple()),
            refresh_token: format!("refresh-{}", self.user_id.simple()),
            expires_at: Utc::now() + Duration::hours(1),
            user: self.user(),
        }
    }

    pub fn build_context(&self) -> AuthContext {
        AuthContext::authenticated(self.user_id, self.role, self.client_id)
    }
}

/// A client insert with a plausible contact.
pub fn new_client(name: &str) -> NewClient {
    let slug = name.to_lowercase().replace(' ', "-");
    NewClient {
        name: name.to_string(),
        contact_info: ContactInfo {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: format!("grace@{}.example.com", slug),
            phone: None,
        },
        notes: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_builder() {
        let client_id = Uuid::new_v4();
        let identity = TestIdentity::contact(client_id).with_full_name("Ada");
        let ctx = identity.build_context();

        assert_eq!(ctx.user_id(), Some(identity.user_id()));
        assert_eq!(ctx.client_id(), Some(client_id));
        assert_eq!(ctx.role(), Some(Role::ClientContact));

        let session = identity.build_session();
        assert!(!session.is_expired());
        assert_eq!(session.user.full_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_new_client_fixture() {
        let client = new_client("Acme Corp");
        assert_eq!(client.contact_info.email, "grace@acme-corp.example.com");
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::session::AuthUser;
use crate::error::{HelpdeskError, Result};
use crate::schema::Role;

/// Free-form metadata map attached to an identity.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Access-token claims issued by the hosted auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Email of the identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Metadata only the service may write (carries the role).
    #[serde(default)]
    pub app_metadata: Metadata,
    /// Metadata supplied at sign-up (client id, full name).
    #[serde(default)]
    pub user_metadata: Metadata,
}

impl TokenClaims {
    /// Get the user ID as UUID.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }

    /// Role granted by the service. Unknown role strings read as no role.
    pub fn role(&self) -> Option<Role> {
        self.app_metadata
            .get("role")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Tenant the identity signed up under.
    pub fn client_id(&self) -> Option<Uuid> {
        self.user_metadata
            .get("client_id")
            .or_else(|| self.app_metadata.get("client_id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .get("full_name")
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Build the user view of these claims.
    pub fn to_user(&self) -> Result<AuthUser> {
        let id = self.user_id().ok_or_else(|| {
            HelpdeskError::Unauthorized(format!("Token subject '{}' is not a user id", self.sub))
        })?;

        Ok(AuthUser {
            id,
            email: self.email.clone(),
            role: self.role(),
            client_id: self.client_id(),
            full_name: self.full_name(),
        })
    }

    /// Create a builder for constructing claims.
    pub fn builder() -> TokenClaimsBuilder {
        TokenClaimsBuilder::new()
    }
}

/// Builder for token claims.
#[derive(Debug, Default)]
pub struct TokenClaimsBuilder {
    sub: Option<String>,
    email: Option<String>,
    app_metadata: Metadata,
    user_metadata: Metadata,
    duration_secs: i64,
}

impl TokenClaimsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            duration_secs: 3600, // 1 hour default
            ..Default::default()
        }
    }

    /// Set the user ID.
    pub fn user_id(mut self, id: Uuid) -> Self {
        self.sub = Some(id.to_string());
        self
    }

    /// Set the raw subject.
    pub fn subject(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the service-granted role.
    pub fn role(mut self, role: Role) -> Self {
        self.app_metadata
            .insert("role".into(), serde_json::json!(role.as_str()));
        self
    }

    pub fn client_id(mut self, id: Uuid) -> Self {
        self.user_metadata
            .insert("client_id".into(), serde_json::json!(id.to_string()));
        self
    }

    pub fn full_name(mut self, name: impl Into<String>) -> Self {
        self.user_metadata
            .insert("full_name".into(), serde_json::json!(name.into()));
        self
    }

    /// Set token duration in seconds.
    pub fn duration_secs(mut self, secs: i64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Build the claims.
    pub fn build(self) -> std::result::Result<TokenClaims, String> {
        let sub = self.sub.ok_or("Subject is required")?;
        let now = chrono::Utc::now().timestamp();

        Ok(TokenClaims {
            sub,
            email: self.email,
            iat: now,
            exp: now + self.duration_secs,
            app_metadata: self.app_metadata,
            user_metadata: self.user_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_builder() {
        let user_id = Uuid::new_v4();
        let client_id = Uuid::new_v4();
        let claims = TokenClaims::builder()
            .user_id(user_id)
            .email("ada@example.com")
            .role(Role::ClientContact)
            .client_id(client_id)
            .full_name("Ada Lovelace")
            .duration_secs(7200)
            .build()
            .unwrap();

        assert_eq!(claims.user_id(), Some(user_id));
        assert_eq!(claims.role(), Some(Role::ClientContact));
        assert_eq!(claims.client_id(), Some(client_id));
        assert_eq!(claims.full_name().as_deref(), Some("Ada Lovelace"));
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_claims_expiration() {
        let claims = TokenClaims {
            sub: Uuid::new_v4().to_string(),
            email: None,
            iat: 0,
            exp: 1, // Expired timestamp
            app_metadata: HashMap::new(),
            user_metadata: HashMap::new(),
        };

        assert!(claims.is_expired());
    }

    #[test]
    fn test_unknown_role_reads_as_none() {
        let mut claims = TokenClaims::builder()
            .user_id(Uuid::new_v4())
            .build()
            .unwrap();
        claims
            .app_metadata
            .insert("role".into(), serde_json::json!("authenticated"));

        assert_eq!(claims.role(), None);
    }

    #[test]
    fn test_to_user_requires_uuid_subject() {
        let claims = TokenClaims::builder().subject("service").build().unwrap();
        assert!(claims.to_user().is_err());

        let id = Uuid::new_v4();
        let claims = TokenClaims::builder()
            .user_id(id)
            .role(Role::Admin)
            .build()
            .unwrap();
        let user = claims.to_user().unwrap();
        assert_eq!(user.id, id);
        assert!(user.is_admin());
    }

    #[test]
    fn test_claims_deserialize_hosted_payload() {
        let json = serde_json::json!({
            "sub": "6f1c1f0e-9a51-4c47-8f8d-7d8d1d0b2c11",
            "email": "agent@example.com",
            "iat": 1700000000,
            "exp": 1700003600,
            "role": "authenticated",
            "app_metadata": {"provider": "email", "role": "AGENT"},
            "user_metadata": {}
        });

        let claims: TokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(claims.role(), Some(Role::Agent));
        assert_eq!(claims.client_id(), None);
    }
}

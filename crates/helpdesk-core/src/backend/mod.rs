//! Typed repository interface over the backend collections.
//!
//! Every call takes the caller's [`AuthContext`] explicitly. Implementations
//! enforce the row-level rules in [`crate::policy`] (or delegate them to a
//! backend that does).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::{AuthContext, AuthStateChange, AuthUser, Session};
use crate::error::Result;
use crate::schema::{
    Client, Invite, Message, NewClient, NewInvite, NewMessage, NewProfile, NewTicket, Profile,
    Role, Ticket, TicketType, TicketUpdate,
};

/// Tenant organizations.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Visible clients, oldest first.
    async fn list(&self, auth: &AuthContext) -> Result<Vec<Client>>;

    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Client>>;

    async fn insert(&self, auth: &AuthContext, client: NewClient) -> Result<Client>;
}

/// One-time registration grants.
#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Invite for `email` that is unused and expires after `now`.
    async fn find_valid_by_email(
        &self,
        auth: &AuthContext,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>>;

    async fn insert(&self, auth: &AuthContext, invite: NewInvite) -> Result<Invite>;

    /// Consume the invite.
    async fn mark_used(&self, auth: &AuthContext, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Identity-to-role links.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Profile>>;

    async fn insert(&self, auth: &AuthContext, profile: NewProfile) -> Result<Profile>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Visible tickets, newest first.
    async fn list(&self, auth: &AuthContext) -> Result<Vec<Ticket>>;

    /// Visible tickets of one client, newest first.
    async fn list_by_client(&self, auth: &AuthContext, client_id: Uuid) -> Result<Vec<Ticket>>;

    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Ticket>>;

    async fn insert(&self, auth: &AuthContext, ticket: NewTicket) -> Result<Ticket>;

    /// Apply a partial update. Does not return the row; callers refetch.
    async fn update_fields(
        &self,
        auth: &AuthContext,
        id: Uuid,
        updates: TicketUpdate,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Messages of a ticket, oldest first.
    async fn list_by_ticket(&self, auth: &AuthContext, ticket_id: Uuid) -> Result<Vec<Message>>;

    /// Append a message authored by the caller.
    async fn insert(&self, auth: &AuthContext, message: NewMessage) -> Result<Message>;
}

#[async_trait]
pub trait TicketTypeRepository: Send + Sync {
    /// All ticket types, by id.
    async fn list(&self, auth: &AuthContext) -> Result<Vec<TicketType>>;
}

/// Metadata attached to an identity at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Identity creation request.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub metadata: SignUpMetadata,
}

/// Result of creating an identity. The session is absent when the
/// auth service requires email confirmation first.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

/// Hosted authentication service.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome>;

    /// Establish a session from tokens handed over by a redirect.
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session>;

    async fn refresh_session(&self) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    async fn current_session(&self) -> Option<Session>;

    /// Auth-state change stream.
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;
}

/// One implementation of every repository plus auth.
#[derive(Clone)]
pub struct Backend {
    pub clients: Arc<dyn ClientRepository>,
    pub invites: Arc<dyn InviteRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub tickets: Arc<dyn TicketRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub ticket_types: Arc<dyn TicketTypeRepository>,
    pub auth: Arc<dyn AuthBackend>,
}

impl Backend {
    /// Bundle a single type that implements every trait.
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: ClientRepository
            + InviteRepository
            + ProfileRepository
            + TicketRepository
            + MessageRepository
            + TicketTypeRepository
            + AuthBackend
            + 'static,
    {
        Self {
            clients: backend.clone(),
            invites: backend.clone(),
            profiles: backend.clone(),
            tickets: backend.clone(),
            messages: backend.clone(),
            ticket_types: backend.clone(),
            auth: backend,
        }
    }

    /// Caller identity for the current session, or anonymous.
    pub async fn auth_context(&self) -> AuthContext {
        match self.auth.current_session().await {
            Some(session) => session.auth_context(),
            None => AuthContext::anonymous(),
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_metadata_serialization() {
        let client_id = Uuid::new_v4();
        let metadata = SignUpMetadata {
            role: Some(Role::ClientContact),
            client_id: Some(client_id),
            full_name: Some("Ada Lovelace".into()),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["role"], "CLIENT_CONTACT");
        assert_eq!(json["client_id"], client_id.to_string());

        let empty = serde_json::to_value(SignUpMetadata::default()).unwrap();
        assert_eq!(empty, serde_json::json!({}));
    }
}

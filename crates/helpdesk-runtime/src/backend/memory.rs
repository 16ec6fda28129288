//! In-process backend enforcing the row-level policy.
//!
//! Records every call for verification and supports one-shot fault
//! injection per operation. Used by tests and by demo mode.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use helpdesk_core::auth::{AuthContext, AuthEvent, AuthStateChange, AuthUser, Session, TokenClaims};
use helpdesk_core::backend::{
    AuthBackend, ClientRepository, InviteRepository, MessageRepository, ProfileRepository,
    SignUpOutcome, SignUpRequest, TicketRepository, TicketTypeRepository,
};
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::policy;
use helpdesk_core::schema::{
    Client, Invite, Message, NewClient, NewInvite, NewMessage, NewProfile, NewTicket, Profile,
    Role, Ticket, TicketType, TicketUpdate,
};

use super::token::{sign_claims, TokenDecoder};

/// Secret used to sign in-memory access tokens.
const MEMORY_JWT_SECRET: &str = "helpdesk-memory-backend";

/// Lifetime of in-memory access tokens.
const TOKEN_TTL_SECS: i64 = 3600;

/// Every operation the memory backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListClients,
    FindClient,
    InsertClient,
    FindInvite,
    InsertInvite,
    MarkInviteUsed,
    FindProfile,
    InsertProfile,
    ListTickets,
    ListClientTickets,
    FindTicket,
    InsertTicket,
    UpdateTicket,
    ListMessages,
    InsertMessage,
    ListTicketTypes,
    SignIn,
    SignUp,
    SetSession,
    RefreshSession,
    SignOut,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListClients => "clients.list",
            Self::FindClient => "clients.find_by_id",
            Self::InsertClient => "clients.insert",
            Self::FindInvite => "invites.find_valid_by_email",
            Self::InsertInvite => "invites.insert",
            Self::MarkInviteUsed => "invites.mark_used",
            Self::FindProfile => "profiles.find_by_id",
            Self::InsertProfile => "profiles.insert",
            Self::ListTickets => "tickets.list",
            Self::ListClientTickets => "tickets.list_by_client",
            Self::FindTicket => "tickets.find_by_id",
            Self::InsertTicket => "tickets.insert",
            Self::UpdateTicket => "tickets.update_fields",
            Self::ListMessages => "messages.list_by_ticket",
            Self::InsertMessage => "messages.insert",
            Self::ListTicketTypes => "ticket_types.list",
            Self::SignIn => "auth.sign_in_with_password",
            Self::SignUp => "auth.sign_up",
            Self::SetSession => "auth.set_session",
            Self::RefreshSession => "auth.refresh_session",
            Self::SignOut => "auth.sign_out",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded call for verification.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: Operation,
    /// Caller identity, if authenticated.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
struct MemoryUser {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    clients: Vec<Client>,
    invites: Vec<Invite>,
    profiles: Vec<Profile>,
    tickets: Vec<Ticket>,
    messages: Vec<Message>,
    ticket_types: Vec<TicketType>,
    users: Vec<MemoryUser>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing timestamps so ordering by creation time is total.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn visible_ticket(&self, auth: &AuthContext, id: Uuid) -> Option<&Ticket> {
        self.tickets
            .iter()
            .find(|t| t.id == id && policy::can_read_ticket(auth, t))
    }
}

/// In-memory implementation of every repository and the auth service.
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
    calls: Mutex<Vec<RecordedCall>>,
    faults: Mutex<HashMap<Operation, String>>,
    decoder: TokenDecoder,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("calls", &self.calls_guard().len())
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(MemoryState::default()),
            session: RwLock::new(None),
            events,
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(HashMap::new()),
            decoder: TokenDecoder::new(Some(MEMORY_JWT_SECRET)),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn calls_guard(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults_guard(&self) -> MutexGuard<'_, HashMap<Operation, String>> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, then fail if a fault was armed for it.
    fn enter(&self, operation: Operation, user_id: Option<Uuid>) -> Result<()> {
        self.calls_guard().push(RecordedCall { operation, user_id });
        tracing::debug!(operation = %operation, ?user_id, "Memory backend call");

        if let Some(message) = self.faults_guard().remove(&operation) {
            return Err(HelpdeskError::backend(Some("injected".into()), message));
        }
        Ok(())
    }

    // =========================================================================
    // VERIFICATION
    // =========================================================================

    /// Make the next call of `operation` fail with a backend-reported error.
    pub fn fail_next(&self, operation: Operation, message: impl Into<String>) {
        self.faults_guard().insert(operation, message.into());
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls_guard().clone()
    }

    /// Count the calls of one operation.
    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls_guard()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls_guard().clear();
    }

    /// Assert that an operation was called.
    pub fn assert_called(&self, operation: Operation) {
        assert!(
            self.call_count(operation) > 0,
            "Expected {} to be called, but it wasn't",
            operation
        );
    }

    /// Assert that an operation was not called.
    pub fn assert_not_called(&self, operation: Operation) {
        let count = self.call_count(operation);
        assert!(
            count == 0,
            "Expected {} not to be called, but it was called {} time(s)",
            operation,
            count
        );
    }

    // =========================================================================
    // SEEDING (bypasses policy)
    // =========================================================================

    /// Register an identity with a service-granted role.
    pub fn add_user(
        &self,
        email: &str,
        password: &str,
        role: Option<Role>,
        client_id: Option<Uuid>,
        full_name: Option<&str>,
    ) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            role,
            client_id,
            full_name: full_name.map(String::from),
        };

        let mut state = self.write_state();
        let created_at = state.next_timestamp();
        if let Some(role) = role {
            state.profiles.push(Profile {
                id: user.id,
                full_name: user.full_name.clone(),
                role,
                client_id,
                created_at,
            });
        }
        state.users.push(MemoryUser {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    pub fn seed_client(&self, client: NewClient) -> Client {
        let mut state = self.write_state();
        let row = Client {
            id: Uuid::new_v4(),
            name: client.name,
            contact_info: client.contact_info,
            notes: client.notes,
            created_at: state.next_timestamp(),
        };
        state.clients.push(row.clone());
        row
    }

    pub fn seed_invite(&self, invite: NewInvite) -> Invite {
        let row = Invite {
            id: Uuid::new_v4(),
            client_id: invite.client_id,
            email: invite.email,
            role: invite.role,
            used_at: None,
            expires_at: invite.expires_at,
        };
        self.write_state().invites.push(row.clone());
        row
    }

    pub fn seed_ticket_type(&self, name: &str, description: Option<&str>) -> TicketType {
        let mut state = self.write_state();
        let row = TicketType {
            id: state.ticket_types.len() as i64 + 1,
            name: name.to_string(),
            description: description.map(String::from),
            workflow_metadata: None,
        };
        state.ticket_types.push(row.clone());
        row
    }

    pub fn seed_ticket(&self, ticket: NewTicket) -> Ticket {
        let mut state = self.write_state();
        let now = state.next_timestamp();
        let row = ticket_row(ticket, now);
        state.tickets.push(row.clone());
        row
    }

    pub fn seed_message(&self, ticket_id: Uuid, author_id: Uuid, content: &str) -> Message {
        let mut state = self.write_state();
        let row = Message {
            id: Uuid::new_v4(),
            ticket_id,
            author_id,
            content: content.to_string(),
            attachments: None,
            created_at: state.next_timestamp(),
        };
        state.messages.push(row.clone());
        row
    }

    /// Raw invite rows, ignoring policy.
    pub fn invites_snapshot(&self) -> Vec<Invite> {
        self.read_state().invites.clone()
    }

    /// Raw ticket row, ignoring policy.
    pub fn ticket_snapshot(&self, id: Uuid) -> Option<Ticket> {
        self.read_state().tickets.iter().find(|t| t.id == id).cloned()
    }

    /// Number of registered identities.
    pub fn user_count(&self) -> usize {
        self.read_state().users.len()
    }

    /// Mint a signed token pair for a user. Also used to simulate redirects.
    pub fn issue_tokens(&self, user: &AuthUser) -> Result<(String, String)> {
        let mut builder = TokenClaims::builder()
            .user_id(user.id)
            .duration_secs(TOKEN_TTL_SECS);
        if let Some(email) = &user.email {
            builder = builder.email(email.clone());
        }
        if let Some(role) = user.role {
            builder = builder.role(role);
        }
        if let Some(client_id) = user.client_id {
            builder = builder.client_id(client_id);
        }
        if let Some(name) = &user.full_name {
            builder = builder.full_name(name.clone());
        }
        let claims = builder.build().map_err(HelpdeskError::Internal)?;
        let access = sign_claims(&claims, MEMORY_JWT_SECRET)?;
        Ok((access, format!("refresh-{}", Uuid::new_v4().simple())))
    }

    fn start_session(&self, user: &AuthUser, event: AuthEvent) -> Result<Session> {
        let (access, refresh) = self.issue_tokens(user)?;
        let session = self.decoder.session(&access, &refresh)?;
        self.replace_session(Some(session.clone()), event);
        Ok(session)
    }

    fn replace_session(&self, session: Option<Session>, event: AuthEvent) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session.clone();
        // No receivers is fine.
        let _ = self.events.send(AuthStateChange::new(event, session));
    }

    fn current(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn ticket_row(ticket: NewTicket, now: DateTime<Utc>) -> Ticket {
    Ticket {
        id: Uuid::new_v4(),
        ticket_type_id: ticket.ticket_type_id,
        title: ticket.title,
        description: ticket.description,
        status: ticket.status,
        priority: ticket.priority,
        severity: Some(ticket.severity),
        requester_id: ticket.requester_id,
        assigned_agent_id: None,
        client_id: ticket.client_id,
        tags: None,
        custom_fields: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl ClientRepository for MemoryBackend {
    async fn list(&self, auth: &AuthContext) -> Result<Vec<Client>> {
        self.enter(Operation::ListClients, auth.user_id())?;
        let state = self.read_state();
        let mut clients: Vec<Client> = state
            .clients
            .iter()
            .filter(|c| policy::can_read_client(auth, c))
            .cloned()
            .collect();
        clients.sort_by_key(|c| c.created_at);
        Ok(clients)
    }

    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Client>> {
        self.enter(Operation::FindClient, auth.user_id())?;
        Ok(self
            .read_state()
            .clients
            .iter()
            .find(|c| c.id == id && policy::can_read_client(auth, c))
            .cloned())
    }

    async fn insert(&self, auth: &AuthContext, client: NewClient) -> Result<Client> {
        self.enter(Operation::InsertClient, auth.user_id())?;
        policy::check_insert_client(auth)?;
        Ok(self.seed_client(client))
    }
}

#[async_trait]
impl InviteRepository for MemoryBackend {
    async fn find_valid_by_email(
        &self,
        auth: &AuthContext,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>> {
        self.enter(Operation::FindInvite, auth.user_id())?;
        Ok(self
            .read_state()
            .invites
            .iter()
            .find(|i| i.email == email && i.is_valid_at(now))
            .cloned())
    }

    async fn insert(&self, auth: &AuthContext, invite: NewInvite) -> Result<Invite> {
        self.enter(Operation::InsertInvite, auth.user_id())?;
        policy::check_insert_invite(auth)?;
        if !self.read_state().clients.iter().any(|c| c.id == invite.client_id) {
            return Err(HelpdeskError::backend(
                Some("23503".into()),
                "insert or update on table \"invites\" violates foreign key constraint",
            ));
        }
        Ok(self.seed_invite(invite))
    }

    async fn mark_used(&self, auth: &AuthContext, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.enter(Operation::MarkInviteUsed, auth.user_id())?;
        let mut state = self.write_state();
        let invite = state
            .invites
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| HelpdeskError::NotFound(format!("Invite {} not found", id)))?;
        policy::check_mark_invite_used(invite)?;
        invite.used_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryBackend {
    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Profile>> {
        self.enter(Operation::FindProfile, auth.user_id())?;
        Ok(self
            .read_state()
            .profiles
            .iter()
            .find(|p| p.id == id && policy::can_read_profile(auth, p))
            .cloned())
    }

    async fn insert(&self, auth: &AuthContext, profile: NewProfile) -> Result<Profile> {
        self.enter(Operation::InsertProfile, auth.user_id())?;
        policy::check_insert_profile(auth, &profile)?;

        let mut state = self.write_state();
        if state.profiles.iter().any(|p| p.id == profile.id) {
            return Err(HelpdeskError::backend(
                Some("23505".into()),
                "duplicate key value violates unique constraint \"profiles_pkey\"",
            ));
        }
        let row = Profile {
            id: profile.id,
            full_name: profile.full_name,
            role: profile.role,
            client_id: profile.client_id,
            created_at: state.next_timestamp(),
        };
        state.profiles.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl TicketRepository for MemoryBackend {
    async fn list(&self, auth: &AuthContext) -> Result<Vec<Ticket>> {
        self.enter(Operation::ListTickets, auth.user_id())?;
        let state = self.read_state();
        let mut tickets: Vec<Ticket> = state
            .tickets
            .iter()
            .filter(|t| policy::can_read_ticket(auth, t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn list_by_client(&self, auth: &AuthContext, client_id: Uuid) -> Result<Vec<Ticket>> {
        self.enter(Operation::ListClientTickets, auth.user_id())?;
        let state = self.read_state();
        let mut tickets: Vec<Ticket> = state
            .tickets
            .iter()
            .filter(|t| t.client_id == Some(client_id) && policy::can_read_ticket(auth, t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Ticket>> {
        self.enter(Operation::FindTicket, auth.user_id())?;
        Ok(self.read_state().visible_ticket(auth, id).cloned())
    }

    async fn insert(&self, auth: &AuthContext, ticket: NewTicket) -> Result<Ticket> {
        self.enter(Operation::InsertTicket, auth.user_id())?;
        policy::check_insert_ticket(auth, &ticket)?;
        Ok(self.seed_ticket(ticket))
    }

    async fn update_fields(
        &self,
        auth: &AuthContext,
        id: Uuid,
        updates: TicketUpdate,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.enter(Operation::UpdateTicket, auth.user_id())?;
        policy::check_update_ticket(auth)?;

        let mut state = self.write_state();
        let ticket = state
            .tickets
            .iter_mut()
            .find(|t| t.id == id && policy::can_read_ticket(auth, t))
            .ok_or_else(|| HelpdeskError::NotFound(format!("Ticket {} not found", id)))?;
        updates.apply(ticket, updated_at);
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for MemoryBackend {
    async fn list_by_ticket(&self, auth: &AuthContext, ticket_id: Uuid) -> Result<Vec<Message>> {
        self.enter(Operation::ListMessages, auth.user_id())?;
        let state = self.read_state();
        if state.visible_ticket(auth, ticket_id).is_none() {
            return Ok(Vec::new());
        }
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn insert(&self, auth: &AuthContext, message: NewMessage) -> Result<Message> {
        self.enter(Operation::InsertMessage, auth.user_id())?;
        let author_id = auth.require_user_id()?;

        let mut state = self.write_state();
        let parent = state
            .tickets
            .iter()
            .find(|t| t.id == message.ticket_id)
            .ok_or_else(|| {
                HelpdeskError::NotFound(format!("Ticket {} not found", message.ticket_id))
            })?;
        policy::check_insert_message(auth, parent)?;

        let row = Message {
            id: Uuid::new_v4(),
            ticket_id: message.ticket_id,
            author_id,
            content: message.content,
            attachments: None,
            created_at: state.next_timestamp(),
        };
        state.messages.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl TicketTypeRepository for MemoryBackend {
    async fn list(&self, auth: &AuthContext) -> Result<Vec<TicketType>> {
        self.enter(Operation::ListTicketTypes, auth.user_id())?;
        let mut types = self.read_state().ticket_types.clone();
        types.sort_by_key(|t| t.id);
        Ok(types)
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        self.enter(Operation::SignIn, None)?;
        let user = self
            .read_state()
            .users
            .iter()
            .find(|u| u.user.email.as_deref() == Some(email) && u.password == password)
            .map(|u| u.user.clone())
            .ok_or_else(|| {
                HelpdeskError::backend(
                    Some("invalid_credentials".into()),
                    "Invalid login credentials",
                )
            })?;

        self.start_session(&user, AuthEvent::SignedIn)
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome> {
        self.enter(Operation::SignUp, None)?;
        let exists = self
            .read_state()
            .users
            .iter()
            .any(|u| u.user.email.as_deref() == Some(request.email.as_str()));
        if exists {
            return Err(HelpdeskError::backend(
                Some("user_already_exists".into()),
                "User already registered",
            ));
        }

        // Self-registration may only claim the contact role; staff roles are granted out of band.
        let role = request.metadata.role.filter(|r| *r == Role::ClientContact);
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(request.email),
            role,
            client_id: request.metadata.client_id,
            full_name: request.metadata.full_name,
        };
        self.write_state().users.push(MemoryUser {
            user: user.clone(),
            password: request.password,
        });

        let session = self.start_session(&user, AuthEvent::SignedIn)?;
        Ok(SignUpOutcome {
            user,
            session: Some(session),
        })
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session> {
        self.enter(Operation::SetSession, None)?;
        let session = self.decoder.session(access_token, refresh_token)?;
        let known = self
            .read_state()
            .users
            .iter()
            .any(|u| u.user.id == session.user.id);
        if !known {
            return Err(HelpdeskError::Unauthorized("User from sub claim in JWT does not exist".into()));
        }

        self.replace_session(Some(session.clone()), AuthEvent::SignedIn);
        Ok(session)
    }

    async fn refresh_session(&self) -> Result<Session> {
        self.enter(Operation::RefreshSession, None)?;
        let current = self
            .current()
            .ok_or_else(|| HelpdeskError::Unauthorized("Auth session missing".into()))?;
        self.start_session(&current.user, AuthEvent::TokenRefreshed)
    }

    async fn sign_out(&self) -> Result<()> {
        self.enter(Operation::SignOut, None)?;
        self.replace_session(None, AuthEvent::SignedOut);
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        self.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::schema::{ContactInfo, TicketPriority, TicketSeverity, TicketStatus};
    use helpdesk_core::testing::TestIdentity;
    use helpdesk_core::{assert_err, assert_err_variant, assert_ok};

    fn new_client(name: &str) -> NewClient {
        NewClient {
            name: name.into(),
            contact_info: ContactInfo {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email: "grace@example.com".into(),
                phone: None,
            },
            notes: None,
        }
    }

    fn new_ticket(requester_id: Uuid, client_id: Option<Uuid>) -> NewTicket {
        NewTicket {
            ticket_type_id: None,
            title: "Printer jam".into(),
            description: Some("Tray 2".into()),
            status: TicketStatus::New,
            priority: TicketPriority::Normal,
            severity: TicketSeverity::None,
            requester_id,
            client_id,
        }
    }

    #[tokio::test]
    async fn test_clients_are_tenant_scoped() {
        let backend = MemoryBackend::new();
        let acme = backend.seed_client(new_client("Acme"));
        backend.seed_client(new_client("Globex"));

        let admin = TestIdentity::admin().build_context();
        let contact = TestIdentity::contact(acme.id).build_context();

        assert_eq!(ClientRepository::list(&backend, &admin).await.unwrap().len(), 2);
        let visible = ClientRepository::list(&backend, &contact).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, acme.id);
        assert!(ClientRepository::list(&backend, &AuthContext::anonymous())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_client_insert_requires_admin() {
        let backend = MemoryBackend::new();
        let agent = TestIdentity::agent().build_context();

        let result = ClientRepository::insert(&backend, &agent, new_client("Acme")).await;
        assert_err_variant!(result, HelpdeskError::Forbidden(_));

        let admin = TestIdentity::admin().build_context();
        assert_ok!(ClientRepository::insert(&backend, &admin, new_client("Acme")).await);
    }

    #[tokio::test]
    async fn test_fault_injection_is_one_shot() {
        let backend = MemoryBackend::new();
        let admin = TestIdentity::admin().build_context();
        backend.fail_next(Operation::ListClients, "boom");

        let first = ClientRepository::list(&backend, &admin).await;
        assert_err!(first);
        assert_ok!(ClientRepository::list(&backend, &admin).await);
        assert_eq!(backend.call_count(Operation::ListClients), 2);
    }

    #[tokio::test]
    async fn test_invite_mark_used_once() {
        let backend = MemoryBackend::new();
        let client = backend.seed_client(new_client("Acme"));
        let invite = backend.seed_invite(NewInvite {
            client_id: client.id,
            email: "ada@example.com".into(),
            role: Role::ClientContact,
            expires_at: Utc::now() + Duration::days(1),
        });
        let anon = AuthContext::anonymous();

        let found = backend
            .find_valid_by_email(&anon, "ada@example.com", Utc::now())
            .await
            .unwrap();
        assert_eq!(found.map(|i| i.id), Some(invite.id));

        assert_ok!(backend.mark_used(&anon, invite.id, Utc::now()).await);
        assert_err_variant!(
            backend.mark_used(&anon, invite.id, Utc::now()).await,
            HelpdeskError::Forbidden(_)
        );
        assert!(backend
            .find_valid_by_email(&anon, "ada@example.com", Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_tickets_newest_first_and_scoped() {
        let backend = MemoryBackend::new();
        let acme = backend.seed_client(new_client("Acme"));
        let globex = backend.seed_client(new_client("Globex"));
        let contact = TestIdentity::contact(acme.id);

        let first = backend.seed_ticket(new_ticket(contact.user_id(), Some(acme.id)));
        let second = backend.seed_ticket(new_ticket(contact.user_id(), Some(acme.id)));
        backend.seed_ticket(new_ticket(Uuid::new_v4(), Some(globex.id)));

        let visible = TicketRepository::list(&backend, &contact.build_context())
            .await
            .unwrap();
        let ids: Vec<Uuid> = visible.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let staff = TicketRepository::list(&backend, &TestIdentity::agent().build_context())
            .await
            .unwrap();
        assert_eq!(staff.len(), 3);
    }

    #[tokio::test]
    async fn test_update_requires_agent_or_admin() {
        let backend = MemoryBackend::new();
        let acme = backend.seed_client(new_client("Acme"));
        let contact = TestIdentity::contact(acme.id);
        let ticket = backend.seed_ticket(new_ticket(contact.user_id(), Some(acme.id)));
        let update = TicketUpdate {
            status: Some(TicketStatus::Open),
            ..Default::default()
        };

        let denied = backend
            .update_fields(&contact.build_context(), ticket.id, update.clone(), Utc::now())
            .await;
        assert_err_variant!(denied, HelpdeskError::Forbidden(_));

        let agent = TestIdentity::agent().build_context();
        assert_ok!(backend.update_fields(&agent, ticket.id, update, Utc::now()).await);
        assert_eq!(
            backend.ticket_snapshot(ticket.id).unwrap().status,
            TicketStatus::Open
        );
    }

    #[tokio::test]
    async fn test_messages_hidden_with_parent() {
        let backend = MemoryBackend::new();
        let acme = backend.seed_client(new_client("Acme"));
        let globex = backend.seed_client(new_client("Globex"));
        let ticket = backend.seed_ticket(new_ticket(Uuid::new_v4(), Some(globex.id)));
        backend.seed_message(ticket.id, ticket.requester_id, "hello");

        let outsider = TestIdentity::contact(acme.id).build_context();
        assert!(backend
            .list_by_ticket(&outsider, ticket.id)
            .await
            .unwrap()
            .is_empty());

        let denied = MessageRepository::insert(
            &backend,
            &outsider,
            NewMessage {
                ticket_id: ticket.id,
                content: "let me in".into(),
            },
        )
        .await;
        assert_err_variant!(denied, HelpdeskError::Forbidden(_));
    }

    #[tokio::test]
    async fn test_sign_in_broadcasts_and_sets_session() {
        let backend = MemoryBackend::new();
        let user = backend.add_user("admin@example.com", "secret", Some(Role::Admin), None, None);
        let mut events = backend.subscribe();

        assert_err!(backend.sign_in_with_password("admin@example.com", "wrong").await);
        let session = backend
            .sign_in_with_password("admin@example.com", "secret")
            .await
            .unwrap();
        assert_eq!(session.user.id, user.id);
        assert!(session.user.is_admin());

        let change = events.recv().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedIn);
        assert_eq!(backend.current_session().await.map(|s| s.user.id), Some(user.id));

        backend.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::SignedOut);
        assert!(backend.current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_set_session_from_issued_tokens() {
        let backend = MemoryBackend::new();
        let user = backend.add_user("ada@example.com", "pw", Some(Role::ClientContact), None, None);
        let (access, refresh) = backend.issue_tokens(&user).unwrap();

        let session = backend.set_session(&access, &refresh).await.unwrap();
        assert_eq!(session.user.id, user.id);
        assert_err!(backend.set_session("garbage", "refresh").await);
    }

    #[tokio::test]
    async fn test_sign_up_cannot_claim_staff_role() {
        let backend = MemoryBackend::new();
        let outcome = backend
            .sign_up(SignUpRequest {
                email: "mallory@example.com".into(),
                password: "pw".into(),
                metadata: helpdesk_core::backend::SignUpMetadata {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert_eq!(outcome.user.role, None);
        assert!(outcome.session.is_some());
    }
}

//! Repository implementations over a direct Postgres connection.
//!
//! Row visibility is pushed into the `WHERE` clause using the predicates in
//! [`helpdesk_core::policy`]; write permissions are checked before the
//! statement runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use helpdesk_core::auth::AuthContext;
use helpdesk_core::backend::{
    ClientRepository, InviteRepository, MessageRepository, ProfileRepository, TicketRepository,
    TicketTypeRepository,
};
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::policy::{self, ClientScope};
use helpdesk_core::schema::{
    Client, Invite, Message, NewClient, NewInvite, NewMessage, NewProfile, NewTicket, Profile,
    Ticket, TicketType, TicketUpdate,
};

use super::Database;

const CLIENT_COLUMNS: &str = "id, name, contact_info, notes, created_at";
const INVITE_COLUMNS: &str = "id, client_id, email, role, used_at, expires_at";
const PROFILE_COLUMNS: &str = "id, full_name, role, client_id, created_at";
const TICKET_COLUMNS: &str = "id, ticket_type_id, title, description, status, priority, severity, \
     requester_id, assigned_agent_id, client_id, tags, custom_fields, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, ticket_id, author_id, content, attachments, created_at";

/// Table repositories backed by sqlx.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }

    async fn raw_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE id = $1", TICKET_COLUMNS);
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)
    }
}

/// Join predicates with `AND`, ignoring unrestricted ones.
fn where_clause(filters: &[Option<String>]) -> String {
    let parts: Vec<&str> = filters.iter().flatten().map(String::as_str).collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", parts.join(" AND "))
    }
}

/// Keep the SQLSTATE so callers can tell constraint violations apart.
fn db_err(err: sqlx::Error) -> HelpdeskError {
    match &err {
        sqlx::Error::Database(db) => HelpdeskError::backend(
            db.code().map(|c| c.into_owned()),
            db.message().to_string(),
        ),
        _ => HelpdeskError::from(err),
    }
}

#[async_trait]
impl ClientRepository for PgStore {
    async fn list(&self, auth: &AuthContext) -> Result<Vec<Client>> {
        let sql = format!(
            "SELECT {} FROM clients {} ORDER BY created_at ASC",
            CLIENT_COLUMNS,
            where_clause(&[ClientScope::for_caller(auth).sql_filter("id")])
        );
        sqlx::query_as::<_, Client>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(db_err)
    }

    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Client>> {
        let sql = format!(
            "SELECT {} FROM clients {}",
            CLIENT_COLUMNS,
            where_clause(&[
                Some("id = $1".to_string()),
                ClientScope::for_caller(auth).sql_filter("id"),
            ])
        );
        sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)
    }

    async fn insert(&self, auth: &AuthContext, client: NewClient) -> Result<Client> {
        policy::check_insert_client(auth)?;
        let sql = format!(
            "INSERT INTO clients (name, contact_info, notes) VALUES ($1, $2, $3) RETURNING {}",
            CLIENT_COLUMNS
        );
        let row = sqlx::query_as::<_, Client>(&sql)
            .bind(&client.name)
            .bind(Json(&client.contact_info))
            .bind(&client.notes)
            .fetch_one(self.pool())
            .await
            .map_err(db_err)?;
        tracing::debug!(client_id = %row.id, "Inserted client");
        Ok(row)
    }
}

#[async_trait]
impl InviteRepository for PgStore {
    async fn find_valid_by_email(
        &self,
        _auth: &AuthContext,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>> {
        let sql = format!(
            "SELECT {} FROM invites WHERE email = $1 AND used_at IS NULL AND expires_at > $2 LIMIT 1",
            INVITE_COLUMNS
        );
        sqlx::query_as::<_, Invite>(&sql)
            .bind(email)
            .bind(now)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)
    }

    async fn insert(&self, auth: &AuthContext, invite: NewInvite) -> Result<Invite> {
        policy::check_insert_invite(auth)?;
        let sql = format!(
            "INSERT INTO invites (client_id, email, role, expires_at) VALUES ($1, $2, $3, $4) RETURNING {}",
            INVITE_COLUMNS
        );
        sqlx::query_as::<_, Invite>(&sql)
            .bind(invite.client_id)
            .bind(&invite.email)
            .bind(invite.role)
            .bind(invite.expires_at)
            .fetch_one(self.pool())
            .await
            .map_err(db_err)
    }

    async fn mark_used(&self, _auth: &AuthContext, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let sql = format!("SELECT {} FROM invites WHERE id = $1", INVITE_COLUMNS);
        let invite = sqlx::query_as::<_, Invite>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?
            .ok_or_else(|| HelpdeskError::NotFound(format!("Invite {} not found", id)))?;
        policy::check_mark_invite_used(&invite)?;

        let result = sqlx::query("UPDATE invites SET used_at = $2 WHERE id = $1 AND used_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(self.pool())
            .await
            .map_err(db_err)?;
        // Lost a race with another sign-up.
        if result.rows_affected() == 0 {
            return Err(HelpdeskError::Forbidden(format!(
                "Invite {} has already been used",
                id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for PgStore {
    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        let row = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;
        Ok(row.filter(|p| policy::can_read_profile(auth, p)))
    }

    async fn insert(&self, auth: &AuthContext, profile: NewProfile) -> Result<Profile> {
        policy::check_insert_profile(auth, &profile)?;
        let sql = format!(
            "INSERT INTO profiles (id, full_name, role, client_id) VALUES ($1, $2, $3, $4) RETURNING {}",
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(profile.id)
            .bind(&profile.full_name)
            .bind(profile.role)
            .bind(profile.client_id)
            .fetch_one(self.pool())
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl TicketRepository for PgStore {
    async fn list(&self, auth: &AuthContext) -> Result<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at DESC",
            TICKET_COLUMNS,
            where_clause(&[policy::ticket_sql_filter(auth)])
        );
        sqlx::query_as::<_, Ticket>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(db_err)
    }

    async fn list_by_client(&self, auth: &AuthContext, client_id: Uuid) -> Result<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at DESC",
            TICKET_COLUMNS,
            where_clause(&[
                Some("client_id = $1".to_string()),
                policy::ticket_sql_filter(auth),
            ])
        );
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(client_id)
            .fetch_all(self.pool())
            .await
            .map_err(db_err)
    }

    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets {}",
            TICKET_COLUMNS,
            where_clause(&[Some("id = $1".to_string()), policy::ticket_sql_filter(auth)])
        );
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)
    }

    async fn insert(&self, auth: &AuthContext, ticket: NewTicket) -> Result<Ticket> {
        policy::check_insert_ticket(auth, &ticket)?;
        let sql = format!(
            "INSERT INTO tickets (ticket_type_id, title, description, status, priority, severity, requester_id, client_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            TICKET_COLUMNS
        );
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket.ticket_type_id)
            .bind(&ticket.title)
            .bind(&ticket.description)
            .bind(ticket.status)
            .bind(ticket.priority)
            .bind(ticket.severity)
            .bind(ticket.requester_id)
            .bind(ticket.client_id)
            .fetch_one(self.pool())
            .await
            .map_err(db_err)
    }

    async fn update_fields(
        &self,
        auth: &AuthContext,
        id: Uuid,
        updates: TicketUpdate,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        policy::check_update_ticket(auth)?;
        let sql = format!(
            "UPDATE tickets SET \
             status = COALESCE($2, status), \
             priority = COALESCE($3, priority), \
             severity = COALESCE($4, severity), \
             assigned_agent_id = CASE WHEN $5 THEN $6 ELSE assigned_agent_id END, \
             updated_at = $7 \
             {}",
            where_clause(&[Some("id = $1".to_string()), policy::ticket_sql_filter(auth)])
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(updates.status)
            .bind(updates.priority)
            .bind(updates.severity)
            .bind(updates.assigned_agent_id.is_some())
            .bind(updates.assigned_agent_id.flatten())
            .bind(updated_at)
            .execute(self.pool())
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(HelpdeskError::NotFound(format!("Ticket {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for PgStore {
    async fn list_by_ticket(&self, auth: &AuthContext, ticket_id: Uuid) -> Result<Vec<Message>> {
        if TicketRepository::find_by_id(self, auth, ticket_id).await?.is_none() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM messages WHERE ticket_id = $1 ORDER BY created_at ASC",
            MESSAGE_COLUMNS
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(ticket_id)
            .fetch_all(self.pool())
            .await
            .map_err(db_err)
    }

    async fn insert(&self, auth: &AuthContext, message: NewMessage) -> Result<Message> {
        let author_id = auth.require_user_id()?;
        let parent = self.raw_ticket(message.ticket_id).await?.ok_or_else(|| {
            HelpdeskError::NotFound(format!("Ticket {} not found", message.ticket_id))
        })?;
        policy::check_insert_message(auth, &parent)?;

        let sql = format!(
            "INSERT INTO messages (ticket_id, author_id, content) VALUES ($1, $2, $3) RETURNING {}",
            MESSAGE_COLUMNS
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(message.ticket_id)
            .bind(author_id)
            .bind(&message.content)
            .fetch_one(self.pool())
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl TicketTypeRepository for PgStore {
    async fn list(&self, _auth: &AuthContext) -> Result<Vec<TicketType>> {
        sqlx::query_as::<_, TicketType>(
            "SELECT id, name, description, workflow_metadata FROM ticket_types ORDER BY id ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(db_err)
    }
}

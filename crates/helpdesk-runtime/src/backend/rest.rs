//! Hosted backend-as-a-service client.
//!
//! Tables are served PostgREST-style under `/rest/v1/{table}`, auth
//! GoTrue-style under `/auth/v1`. Row-level policy is enforced server-side;
//! this adapter only forwards the caller's bearer token.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use helpdesk_core::auth::{AuthContext, AuthEvent, AuthStateChange, AuthUser, Metadata, Session};
use helpdesk_core::backend::{
    AuthBackend, ClientRepository, InviteRepository, MessageRepository, ProfileRepository,
    SignUpOutcome, SignUpRequest, TicketRepository, TicketTypeRepository,
};
use helpdesk_core::config::BackendConfig;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::policy::Collection;
use helpdesk_core::schema::{
    Client, Invite, Message, NewClient, NewInvite, NewMessage, NewProfile, NewTicket, Profile,
    Ticket, TicketType, TicketUpdate,
};

use super::token::TokenDecoder;

type Query = Vec<(&'static str, String)>;

/// Error body shapes returned by the table and auth endpoints.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<serde_json::Value>,
    error_code: Option<String>,
}

impl ErrorBody {
    fn into_error(self, status: StatusCode) -> HelpdeskError {
        let message = self
            .message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
        let code = self.error_code.or_else(|| {
            self.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        });

        match status {
            StatusCode::UNAUTHORIZED => HelpdeskError::Unauthorized(message),
            StatusCode::FORBIDDEN => HelpdeskError::Forbidden(message),
            StatusCode::NOT_FOUND => HelpdeskError::NotFound(message),
            _ => HelpdeskError::backend(code, message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

/// User object returned by the auth endpoints.
#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    app_metadata: Metadata,
    #[serde(default)]
    user_metadata: Metadata,
}

impl RemoteUser {
    fn into_user(self) -> AuthUser {
        let role = self
            .app_metadata
            .get("role")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok());
        let client_id = self
            .user_metadata
            .get("client_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let full_name = self
            .user_metadata
            .get("full_name")
            .and_then(|v| v.as_str())
            .map(String::from);

        AuthUser {
            id: self.id,
            email: self.email,
            role,
            client_id,
            full_name,
        }
    }
}

/// Sign-up answers with a session when auto-confirm is on, otherwise with the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session {
        access_token: String,
        refresh_token: String,
        user: RemoteUser,
    },
    User(RemoteUser),
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a helpdesk_core::backend::SignUpMetadata,
}

/// Client for the hosted backend.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    decoder: TokenDecoder,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url)
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

impl RestBackend {
    /// Create a client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HelpdeskError::Config(format!("Failed to build HTTP client: {}", e)))?;
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            decoder: TokenDecoder::new(config.jwt_secret.as_deref()),
            session: RwLock::new(None),
            events,
        })
    }

    fn table_url(&self, table: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Request carrying the API key and the caller's bearer token (or the anon key).
    fn request(&self, method: Method, url: &str, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let err = parsed.into_error(status);
        tracing::debug!(status = status.as_u16(), error = %err, "Backend request failed");
        Err(err)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        auth: &AuthContext,
        table: Collection,
        query: Query,
    ) -> Result<Vec<T>> {
        let builder = self
            .request(Method::GET, &self.table_url(table), auth.access_token())
            .query(&[("select", "*")])
            .query(&query);
        Ok(Self::send(builder).await?.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        auth: &AuthContext,
        table: Collection,
        query: Query,
    ) -> Result<Option<T>> {
        let mut query = query;
        query.push(("limit", "1".into()));
        Ok(self.select(auth, table, query).await?.into_iter().next())
    }

    async fn insert_row<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        auth: &AuthContext,
        table: Collection,
        body: &B,
    ) -> Result<T> {
        let builder = self
            .request(Method::POST, &self.table_url(table), auth.access_token())
            .header("Prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = Self::send(builder).await?.json().await?;
        rows.into_iter().next().ok_or_else(|| {
            HelpdeskError::Forbidden(format!("Insert into {} returned no row", table))
        })
    }

    async fn update_rows<B: Serialize + Sync>(
        &self,
        auth: &AuthContext,
        table: Collection,
        query: Query,
        body: &B,
    ) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &self.table_url(table), auth.access_token())
            .header("Prefer", "return=minimal")
            .query(&query)
            .json(body);
        Self::send(builder).await?;
        Ok(())
    }

    fn current(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_session(&self, session: Option<Session>, event: AuthEvent) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session.clone();
        let _ = self.events.send(AuthStateChange::new(event, session));
    }

    async fn token_grant<B: Serialize + Sync>(&self, grant_type: &str, body: &B) -> Result<Session> {
        let builder = self
            .request(Method::POST, &self.auth_url("token"), None)
            .query(&[("grant_type", grant_type)])
            .json(body);
        let tokens: TokenResponse = Self::send(builder).await?.json().await?;
        self.decoder.session(&tokens.access_token, &tokens.refresh_token)
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl ClientRepository for RestBackend {
    async fn list(&self, auth: &AuthContext) -> Result<Vec<Client>> {
        self.select(auth, Collection::Clients, vec![("order", "created_at.asc".into())])
            .await
    }

    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Client>> {
        self.select_one(auth, Collection::Clients, vec![("id", eq(id))])
            .await
    }

    async fn insert(&self, auth: &AuthContext, client: NewClient) -> Result<Client> {
        self.insert_row(auth, Collection::Clients, &client).await
    }
}

#[async_trait]
impl InviteRepository for RestBackend {
    async fn find_valid_by_email(
        &self,
        auth: &AuthContext,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>> {
        self.select_one(
            auth,
            Collection::Invites,
            vec![
                ("email", eq(email)),
                ("used_at", "is.null".into()),
                ("expires_at", format!("gt.{}", now.to_rfc3339())),
            ],
        )
        .await
    }

    async fn insert(&self, auth: &AuthContext, invite: NewInvite) -> Result<Invite> {
        self.insert_row(auth, Collection::Invites, &invite).await
    }

    async fn mark_used(&self, auth: &AuthContext, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.update_rows(
            auth,
            Collection::Invites,
            vec![("id", eq(id)), ("used_at", "is.null".into())],
            &serde_json::json!({ "used_at": at }),
        )
        .await
    }
}

#[async_trait]
impl ProfileRepository for RestBackend {
    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Profile>> {
        self.select_one(auth, Collection::Profiles, vec![("id", eq(id))])
            .await
    }

    async fn insert(&self, auth: &AuthContext, profile: NewProfile) -> Result<Profile> {
        self.insert_row(auth, Collection::Profiles, &profile).await
    }
}

#[async_trait]
impl TicketRepository for RestBackend {
    async fn list(&self, auth: &AuthContext) -> Result<Vec<Ticket>> {
        self.select(auth, Collection::Tickets, vec![("order", "created_at.desc".into())])
            .await
    }

    async fn list_by_client(&self, auth: &AuthContext, client_id: Uuid) -> Result<Vec<Ticket>> {
        self.select(
            auth,
            Collection::Tickets,
            vec![
                ("client_id", eq(client_id)),
                ("order", "created_at.desc".into()),
            ],
        )
        .await
    }

    async fn find_by_id(&self, auth: &AuthContext, id: Uuid) -> Result<Option<Ticket>> {
        self.select_one(auth, Collection::Tickets, vec![("id", eq(id))])
            .await
    }

    async fn insert(&self, auth: &AuthContext, ticket: NewTicket) -> Result<Ticket> {
        self.insert_row(auth, Collection::Tickets, &ticket).await
    }

    async fn update_fields(
        &self,
        auth: &AuthContext,
        id: Uuid,
        updates: TicketUpdate,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut body = serde_json::to_value(&updates)?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("updated_at".into(), serde_json::to_value(updated_at)?);
        }
        self.update_rows(auth, Collection::Tickets, vec![("id", eq(id))], &body)
            .await
    }
}

#[async_trait]
impl MessageRepository for RestBackend {
    async fn list_by_ticket(&self, auth: &AuthContext, ticket_id: Uuid) -> Result<Vec<Message>> {
        self.select(
            auth,
            Collection::Messages,
            vec![
                ("ticket_id", eq(ticket_id)),
                ("order", "created_at.asc".into()),
            ],
        )
        .await
    }

    async fn insert(&self, auth: &AuthContext, message: NewMessage) -> Result<Message> {
        let author_id = auth.require_user_id()?;
        let body = serde_json::json!({
            "ticket_id": message.ticket_id,
            "content": message.content,
            "author_id": author_id,
        });
        self.insert_row(auth, Collection::Messages, &body).await
    }
}

#[async_trait]
impl TicketTypeRepository for RestBackend {
    async fn list(&self, auth: &AuthContext) -> Result<Vec<TicketType>> {
        self.select(auth, Collection::TicketTypes, vec![("order", "id.asc".into())])
            .await
    }
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .token_grant("password", &PasswordGrant { email, password })
            .await?;
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.replace_session(Some(session.clone()), AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome> {
        let builder = self
            .request(Method::POST, &self.auth_url("signup"), None)
            .json(&SignUpBody {
                email: &request.email,
                password: &request.password,
                data: &request.metadata,
            });
        let response: SignUpResponse = Self::send(builder).await?.json().await?;

        match response {
            SignUpResponse::Session {
                access_token,
                refresh_token,
                user,
            } => {
                let session = self.decoder.session(&access_token, &refresh_token)?;
                self.replace_session(Some(session.clone()), AuthEvent::SignedIn);
                Ok(SignUpOutcome {
                    user: user.into_user(),
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => Ok(SignUpOutcome {
                user: user.into_user(),
                session: None,
            }),
        }
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session> {
        let session = self.decoder.session(access_token, refresh_token)?;

        // Confirm the token with the auth service before trusting it.
        let builder = self.request(Method::GET, &self.auth_url("user"), Some(access_token));
        let user: RemoteUser = Self::send(builder).await?.json().await?;
        if user.id != session.user.id {
            return Err(HelpdeskError::Unauthorized(
                "Token subject does not match the authenticated user".into(),
            ));
        }

        self.replace_session(Some(session.clone()), AuthEvent::SignedIn);
        Ok(session)
    }

    async fn refresh_session(&self) -> Result<Session> {
        let current = self
            .current()
            .ok_or_else(|| HelpdeskError::Unauthorized("Auth session missing".into()))?;
        let session = self
            .token_grant(
                "refresh_token",
                &serde_json::json!({ "refresh_token": current.refresh_token }),
            )
            .await?;
        self.replace_session(Some(session.clone()), AuthEvent::TokenRefreshed);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.current() {
            let builder = self.request(
                Method::POST,
                &self.auth_url("logout"),
                Some(&session.access_token),
            );
            // The local session is dropped even if the remote revoke fails.
            if let Err(e) = Self::send(builder).await {
                tracing::warn!(error = %e, "Remote sign-out failed");
            }
        }
        self.replace_session(None, AuthEvent::SignedOut);
        Ok(())
    }

    /// The held session, refreshed first if its access token has expired.
    /// A failed refresh signs the user out locally.
    async fn current_session(&self) -> Option<Session> {
        let session = self.current()?;
        if !session.is_expired() {
            return Some(session);
        }

        match self.refresh_session().await {
            Ok(refreshed) => {
                tracing::debug!(user_id = %refreshed.user.id, "Access token refreshed");
                Some(refreshed)
            }
            Err(e) => {
                tracing::warn!(user_id = %session.user.id, error = %e, "Session refresh failed");
                // Another caller may already have refreshed it.
                match self.current() {
                    Some(current) if current.refresh_token != session.refresh_token => {
                        Some(current)
                    }
                    _ => {
                        self.replace_session(None, AuthEvent::SignedOut);
                        None
                    }
                }
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}

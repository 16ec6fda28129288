use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::AuthContext;
use crate::schema::Role;

/// The identity behind a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub client_id: Option<Uuid>,
    pub full_name: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// An authenticated session held by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl Session {
    /// Check if the access token is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.role
    }

    /// Caller identity for backend calls made with this session.
    pub fn auth_context(&self) -> AuthContext {
        AuthContext::from_session(self)
    }
}

/// Kind of auth-state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    /// State known at subscription time.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

impl AuthEvent {
    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
        }
    }
}

impl FromStr for AuthEvent {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "INITIAL_SESSION" => Self::InitialSession,
            "SIGNED_IN" => Self::SignedIn,
            "TOKEN_REFRESHED" => Self::TokenRefreshed,
            _ => Self::SignedOut,
        })
    }
}

/// One notification on the auth-state stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

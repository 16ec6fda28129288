//! Row-level authorization rules per collection and role.
//!
//! Reads filter silently: a row the caller may not see behaves as absent.
//! Writes the caller may not perform fail with `Forbidden`.

use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{HelpdeskError, Result};
use crate::schema::{Client, Invite, NewProfile, NewTicket, Profile, Role, Ticket};

/// Backend collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Clients,
    Invites,
    Profiles,
    Tickets,
    Messages,
    TicketTypes,
}

impl Collection {
    /// Table name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Invites => "invites",
            Self::Profiles => "profiles",
            Self::Tickets => "tickets",
            Self::Messages => "messages",
            Self::TicketTypes => "ticket_types",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tenants a caller can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientScope {
    /// Staff: every tenant.
    All,
    /// Contact bound to one tenant.
    Client(Uuid),
    /// Anonymous, or an identity without a tenant.
    Nobody,
}

impl ClientScope {
    /// Derive the scope of a caller.
    pub fn for_caller(auth: &AuthContext) -> Self {
        if !auth.is_authenticated() {
            return Self::Nobody;
        }
        if auth.is_staff() {
            return Self::All;
        }
        match auth.client_id() {
            Some(id) => Self::Client(id),
            None => Self::Nobody,
        }
    }

    /// Check whether a row owned by `client_id` is inside the scope.
    pub fn allows(&self, client_id: Option<Uuid>) -> bool {
        match (self, client_id) {
            (Self::All, _) => true,
            (Self::Client(scope), Some(id)) => *scope == id,
            _ => false,
        }
    }

    /// SQL predicate restricting `column` to the scope. `None` means unrestricted.
    pub fn sql_filter(&self, column: &str) -> Option<String> {
        match self {
            Self::All => None,
            Self::Client(id) => Some(format!("{} = '{}'", column, id)),
            Self::Nobody => Some("FALSE".to_string()),
        }
    }
}

/// Clients: staff read all, contacts read their own.
pub fn can_read_client(auth: &AuthContext, client: &Client) -> bool {
    ClientScope::for_caller(auth).allows(Some(client.id))
}

/// Only admins create clients.
pub fn check_insert_client(auth: &AuthContext) -> Result<()> {
    auth.require_user_id()?;
    auth.require_any_role(&[Role::Admin])
        .map_err(|_| HelpdeskError::Forbidden("Only admins can create clients".into()))
}

/// Only admins issue invites.
pub fn check_insert_invite(auth: &AuthContext) -> Result<()> {
    auth.require_user_id()?;
    auth.require_any_role(&[Role::Admin])
        .map_err(|_| HelpdeskError::Forbidden("Only admins can create invites".into()))
}

/// An invite may be consumed once.
pub fn check_mark_invite_used(invite: &Invite) -> Result<()> {
    if invite.used_at.is_some() {
        return Err(HelpdeskError::Forbidden(format!(
            "Invite {} has already been used",
            invite.id
        )));
    }
    Ok(())
}

/// Profiles: self or staff.
pub fn can_read_profile(auth: &AuthContext, profile: &Profile) -> bool {
    auth.user_id() == Some(profile.id) || auth.is_staff()
}

/// A caller may only create its own profile.
pub fn check_insert_profile(auth: &AuthContext, profile: &NewProfile) -> Result<()> {
    let user_id = auth.require_user_id()?;
    if user_id != profile.id {
        return Err(HelpdeskError::Forbidden(
            "Profiles can only be created for the signed-in identity".into(),
        ));
    }
    Ok(())
}

/// Tickets: staff read all; others read their tenant's tickets and their own requests.
pub fn can_read_ticket(auth: &AuthContext, ticket: &Ticket) -> bool {
    if !auth.is_authenticated() {
        return false;
    }
    ClientScope::for_caller(auth).allows(ticket.client_id)
        || auth.user_id() == Some(ticket.requester_id)
}

/// SQL predicate equivalent of [`can_read_ticket`] over the `tickets` table.
pub fn ticket_sql_filter(auth: &AuthContext) -> Option<String> {
    let Some(user_id) = auth.user_id() else {
        return Some("FALSE".to_string());
    };
    match ClientScope::for_caller(auth) {
        ClientScope::All => None,
        ClientScope::Client(id) => Some(format!(
            "(client_id = '{}' OR requester_id = '{}')",
            id, user_id
        )),
        ClientScope::Nobody => Some(format!("requester_id = '{}'", user_id)),
    }
}

/// Tickets are filed by the caller, and contacts only under their own tenant.
pub fn check_insert_ticket(auth: &AuthContext, ticket: &NewTicket) -> Result<()> {
    let user_id = auth.require_user_id()?;
    if ticket.requester_id != user_id {
        return Err(HelpdeskError::Forbidden(
            "Tickets can only be requested by the signed-in identity".into(),
        ));
    }
    if !auth.is_staff() {
        if let Some(client_id) = ticket.client_id {
            if auth.client_id() != Some(client_id) {
                return Err(HelpdeskError::Forbidden(
                    "Tickets can only be filed under your own organization".into(),
                ));
            }
        }
    }
    Ok(())
}

/// Admins and agents work tickets.
pub fn check_update_ticket(auth: &AuthContext) -> Result<()> {
    auth.require_user_id()?;
    auth.require_any_role(&[Role::Admin, Role::Agent])
        .map_err(|_| HelpdeskError::Forbidden("Only admins and agents can update tickets".into()))
}

/// Messages can be posted to any ticket the caller can read.
pub fn check_insert_message(auth: &AuthContext, parent: &Ticket) -> Result<()> {
    auth.require_user_id()?;
    if !can_read_ticket(auth, parent) {
        return Err(HelpdeskError::Forbidden(format!(
            "No access to ticket {}",
            parent.id
        )));
    }
    Ok(())
}

//! Enum types shared by every backend.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::error::HelpdeskError;

/// Role attached to an identity by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full access to every tenant.
    Admin,
    /// Contact person of a single client organization.
    ClientContact,
    /// Support agent working tickets.
    Agent,
    /// Developer escalation target.
    Developer,
}

impl Role {
    /// Convert to the wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::ClientContact => "CLIENT_CONTACT",
            Self::Agent => "AGENT",
            Self::Developer => "DEVELOPER",
        }
    }

    /// Staff roles see every tenant.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Agent | Self::Developer)
    }
}

impl FromStr for Role {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "CLIENT_CONTACT" => Ok(Self::ClientContact),
            "AGENT" => Ok(Self::Agent),
            "DEVELOPER" => Ok(Self::Developer),
            other => Err(HelpdeskError::Validation(format!("Unknown role '{}'", other))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ticket_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        Self::New,
        Self::Open,
        Self::Pending,
        Self::Resolved,
        Self::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Open => "OPEN",
            Self::Pending => "PENDING",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }

    /// Tickets nobody has answered yet.
    pub fn is_awaiting_response(&self) -> bool {
        matches!(self, Self::New | Self::Open)
    }
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::New
    }
}

impl FromStr for TicketStatus {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| HelpdeskError::Validation(format!("Unknown status '{}'", s)))
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ticket_priority", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [Self::Low, Self::Normal, Self::High, Self::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl FromStr for TicketPriority {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| HelpdeskError::Validation(format!("Unknown priority '{}'", s)))
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ticket_severity", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketSeverity {
    None,
    Minor,
    Major,
    Critical,
}

impl TicketSeverity {
    pub const ALL: [TicketSeverity; 4] = [Self::None, Self::Minor, Self::Major, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl Default for TicketSeverity {
    fn default() -> Self {
        Self::None
    }
}

impl FromStr for TicketSeverity {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| HelpdeskError::Validation(format!("Unknown severity '{}'", s)))
    }
}

impl std::fmt::Display for TicketSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::to_string(&Role::ClientContact).unwrap();
        assert_eq!(json, "\"CLIENT_CONTACT\"");
        assert_eq!("CLIENT_CONTACT".parse::<Role>().unwrap(), Role::ClientContact);
        assert!("client_contact".parse::<Role>().is_err());
    }

    #[test]
    fn test_staff_roles() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Agent.is_staff());
        assert!(Role::Developer.is_staff());
        assert!(!Role::ClientContact.is_staff());
    }

    #[test]
    fn test_ticket_defaults() {
        assert_eq!(TicketStatus::default(), TicketStatus::New);
        assert_eq!(TicketPriority::default(), TicketPriority::Normal);
        assert_eq!(TicketSeverity::default(), TicketSeverity::None);
    }

    #[test]
    fn test_awaiting_response() {
        assert!(TicketStatus::New.is_awaiting_response());
        assert!(TicketStatus::Open.is_awaiting_response());
        assert!(!TicketStatus::Pending.is_awaiting_response());
        assert!(!TicketStatus::Closed.is_awaiting_response());
    }

    #[test]
    fn test_parse_status_and_priority() {
        assert_eq!("RESOLVED".parse::<TicketStatus>().unwrap(), TicketStatus::Resolved);
        assert_eq!("URGENT".parse::<TicketPriority>().unwrap(), TicketPriority::Urgent);
        assert_eq!("MAJOR".parse::<TicketSeverity>().unwrap(), TicketSeverity::Major);
        assert!("SOON".parse::<TicketPriority>().is_err());
    }
}

//! Data models for the ticketing collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::*;

/// Primary contact of a client organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A tenant organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub contact_info: ContactInfo,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One-time grant letting an email register as a contact of a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invite {
    pub id: Uuid,
    pub client_id: Uuid,
    pub email: String,
    pub role: Role,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Invite {
    /// Unused and not yet expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

/// Links an auth identity to its role and tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub role: Role,
    pub client_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A support ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_type_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub severity: Option<TicketSeverity>,
    pub requester_id: Uuid,
    pub assigned_agent_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message on a ticket. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub attachments: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// Reference data describing the kind of a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub workflow_metadata: Option<serde_json::Value>,
}

// Input types for inserts and updates

/// Input for creating a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub contact_info: ContactInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Input for creating an invite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvite {
    pub client_id: Uuid,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Input for creating a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub role: Role,
    pub client_id: Option<Uuid>,
}

/// Input for creating a ticket. Requester and status are fixed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
    pub ticket_type_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub severity: TicketSeverity,
    pub requester_id: Uuid,
    pub client_id: Option<Uuid>,
}

/// Partial update of the mutable ticket fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<TicketSeverity>,
    /// `Some(None)` clears the assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<Option<Uuid>>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.severity.is_none()
            && self.assigned_agent_id.is_none()
    }

    /// Apply onto a ticket row.
    pub fn apply(&self, ticket: &mut Ticket, updated_at: DateTime<Utc>) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
        if let Some(severity) = self.severity {
            ticket.severity = Some(severity);
        }
        if let Some(agent) = self.assigned_agent_id {
            ticket.assigned_agent_id = agent;
        }
        ticket.updated_at = updated_at;
    }
}

/// Input for posting a message. The author is the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub ticket_id: Uuid,
    pub content: String,
}

/// Dashboard counters over a client's tickets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TicketStats {
    pub total: usize,
    pub awaiting_response: usize,
    pub urgent: usize,
}

impl TicketStats {
    pub fn from_tickets(tickets: &[Ticket]) -> Self {
        Self {
            total: tickets.len(),
            awaiting_response: tickets
                .iter()
                .filter(|t| t.status.is_awaiting_response())
                .count(),
            urgent: tickets
                .iter()
                .filter(|t| t.priority == TicketPriority::Urgent)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ticket(status: TicketStatus, priority: TicketPriority) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            ticket_type_id: Some(1),
            title: "Printer on fire".into(),
            description: None,
            status,
            priority,
            severity: None,
            requester_id: Uuid::new_v4(),
            assigned_agent_id: None,
            client_id: None,
            tags: None,
            custom_fields: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_contact_info_uses_camel_case() {
        let contact = ContactInfo {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: None,
        };
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["lastName"], "Lovelace");
        assert!(json.get("phone").is_none());
    }

    #[test]
    fn test_invite_validity() {
        let now = Utc::now();
        let mut invite = Invite {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            role: Role::ClientContact,
            used_at: None,
            expires_at: now + Duration::hours(1),
        };
        assert!(invite.is_valid_at(now));
        assert!(!invite.is_valid_at(now + Duration::hours(2)));

        invite.used_at = Some(now);
        assert!(!invite.is_valid_at(now));
    }

    #[test]
    fn test_ticket_update_apply() {
        let mut t = ticket(TicketStatus::New, TicketPriority::Normal);
        t.assigned_agent_id = Some(Uuid::new_v4());
        let later = t.updated_at + Duration::seconds(5);

        let update = TicketUpdate {
            status: Some(TicketStatus::Pending),
            severity: Some(TicketSeverity::Major),
            assigned_agent_id: Some(None),
            ..Default::default()
        };
        update.apply(&mut t, later);

        assert_eq!(t.status, TicketStatus::Pending);
        assert_eq!(t.priority, TicketPriority::Normal);
        assert_eq!(t.severity, Some(TicketSeverity::Major));
        assert_eq!(t.assigned_agent_id, None);
        assert_eq!(t.updated_at, later);
    }

    #[test]
    fn test_ticket_update_serializes_only_set_fields() {
        let update = TicketUpdate {
            priority: Some(TicketPriority::High),
            assigned_agent_id: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"priority": "HIGH", "assigned_agent_id": null}));
        assert!(TicketUpdate::default().is_empty());
    }

    #[test]
    fn test_ticket_stats() {
        let tickets = vec![
            ticket(TicketStatus::New, TicketPriority::Urgent),
            ticket(TicketStatus::Open, TicketPriority::Low),
            ticket(TicketStatus::Closed, TicketPriority::Urgent),
        ];
        let stats = TicketStats::from_tickets(&tickets);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.awaiting_response, 2);
        assert_eq!(stats.urgent, 2);
    }
}

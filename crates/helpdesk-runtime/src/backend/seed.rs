//! Demo data for the in-memory backend.

use chrono::{Duration, Utc};
use uuid::Uuid;

use helpdesk_core::schema::{
    ContactInfo, NewClient, NewInvite, NewTicket, Role, TicketPriority, TicketSeverity,
    TicketStatus,
};

use super::memory::MemoryBackend;

/// Password shared by every demo account.
pub const DEMO_PASSWORD: &str = "helpdesk-demo";

pub const DEMO_ADMIN_EMAIL: &str = "admin@helpdesk.example.com";
pub const DEMO_AGENT_EMAIL: &str = "agent@helpdesk.example.com";
pub const DEMO_CONTACT_EMAIL: &str = "grace@acme.example.com";
/// Has an open invite and no account yet.
pub const DEMO_INVITED_EMAIL: &str = "linus@globex.example.com";

/// Ids created by [`seed_demo`].
#[derive(Debug, Clone)]
pub struct DemoData {
    pub admin_id: Uuid,
    pub agent_id: Uuid,
    pub contact_id: Uuid,
    pub acme_id: Uuid,
    pub globex_id: Uuid,
    pub ticket_ids: Vec<Uuid>,
}

/// Populate an empty backend with two clients, staff and a contact,
/// ticket types, a handful of tickets and one pending invite.
pub fn seed_demo(backend: &MemoryBackend) -> DemoData {
    let bug = backend.seed_ticket_type("BUG", Some("Something is broken"));
    let feature = backend.seed_ticket_type("FEATURE_REQUEST", Some("Something new is wanted"));
    backend.seed_ticket_type("MAINTENANCE", Some("Routine or scheduled work"));
    let question = backend.seed_ticket_type("QUESTION", Some("How do I ...?"));

    let acme = backend.seed_client(NewClient {
        name: "Acme Corp".into(),
        contact_info: ContactInfo {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: DEMO_CONTACT_EMAIL.into(),
            phone: Some("+1 555 0100".into()),
        },
        notes: Some("Enterprise plan".into()),
    });
    let globex = backend.seed_client(NewClient {
        name: "Globex".into(),
        contact_info: ContactInfo {
            first_name: "Linus".into(),
            last_name: "Torvalds".into(),
            email: DEMO_INVITED_EMAIL.into(),
            phone: None,
        },
        notes: None,
    });

    let admin = backend.add_user(
        DEMO_ADMIN_EMAIL,
        DEMO_PASSWORD,
        Some(Role::Admin),
        None,
        Some("Ada Admin"),
    );
    let agent = backend.add_user(
        DEMO_AGENT_EMAIL,
        DEMO_PASSWORD,
        Some(Role::Agent),
        None,
        Some("Alan Agent"),
    );
    let contact = backend.add_user(
        DEMO_CONTACT_EMAIL,
        DEMO_PASSWORD,
        Some(Role::ClientContact),
        Some(acme.id),
        Some("Grace Hopper"),
    );

    backend.seed_invite(NewInvite {
        client_id: globex.id,
        email: DEMO_INVITED_EMAIL.into(),
        role: Role::ClientContact,
        expires_at: Utc::now() + Duration::days(7),
    });

    let tickets = [
        (
            bug.id,
            "Login page returns 500",
            TicketStatus::Open,
            TicketPriority::Urgent,
            TicketSeverity::Critical,
            acme.id,
        ),
        (
            feature.id,
            "Export tickets as CSV",
            TicketStatus::New,
            TicketPriority::Low,
            TicketSeverity::None,
            acme.id,
        ),
        (
            question.id,
            "How do I rotate API keys?",
            TicketStatus::Resolved,
            TicketPriority::Normal,
            TicketSeverity::None,
            acme.id,
        ),
        (
            bug.id,
            "Invoices show wrong currency",
            TicketStatus::Pending,
            TicketPriority::High,
            TicketSeverity::Major,
            globex.id,
        ),
    ];

    let mut ticket_ids = Vec::with_capacity(tickets.len());
    for (type_id, title, status, priority, severity, client_id) in tickets {
        let ticket = backend.seed_ticket(NewTicket {
            ticket_type_id: Some(type_id),
            title: title.into(),
            description: Some(format!("{} (reported via demo data)", title)),
            status,
            priority,
            severity,
            requester_id: if client_id == acme.id { contact.id } else { admin.id },
            client_id: Some(client_id),
        });
        ticket_ids.push(ticket.id);
    }

    if let Some(first) = ticket_ids.first() {
        backend.seed_message(*first, contact.id, "Everyone in the office is locked out.");
        backend.seed_message(*first, agent.id, "Looking into it now.");
    }

    tracing::info!(
        clients = 2,
        tickets = ticket_ids.len(),
        "Seeded demo data"
    );

    DemoData {
        admin_id: admin.id,
        agent_id: agent.id,
        contact_id: contact.id,
        acme_id: acme.id,
        globex_id: globex.id,
        ticket_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::backend::{AuthBackend, ClientRepository, InviteRepository, TicketRepository};

    #[tokio::test]
    async fn test_demo_accounts_can_sign_in() {
        let backend = MemoryBackend::new();
        let demo = seed_demo(&backend);

        let session = backend
            .sign_in_with_password(DEMO_CONTACT_EMAIL, DEMO_PASSWORD)
            .await
            .unwrap();
        assert_eq!(session.user.id, demo.contact_id);

        let auth = session.auth_context();
        let clients = ClientRepository::list(&backend, &auth).await.unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, demo.acme_id);

        let tickets = TicketRepository::list(&backend, &auth).await.unwrap();
        assert_eq!(tickets.len(), 3);
    }

    #[tokio::test]
    async fn test_demo_invite_is_open() {
        let backend = MemoryBackend::new();
        let demo = seed_demo(&backend);

        let invite = backend
            .find_valid_by_email(
                &helpdesk_core::AuthContext::anonymous(),
                DEMO_INVITED_EMAIL,
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invite.client_id, demo.globex_id);
    }
}

use uuid::Uuid;

use helpdesk_core::schema::{
    Message, Ticket, TicketPriority, TicketSeverity, TicketStatus, TicketType, TicketUpdate,
};

use super::{Loadable, Navigation};
use crate::services::{CreateTicketParams, TicketService, TICKET_NOT_FOUND};

/// Ticket list. Staff see every ticket, contacts see their own.
#[derive(Debug, Clone)]
pub struct TicketsPage {
    tickets: TicketService,
    all: bool,
    pub list: Loadable<Vec<Ticket>>,
}

impl TicketsPage {
    pub fn admin(tickets: TicketService) -> Self {
        Self {
            tickets,
            all: true,
            list: Loadable::pending(),
        }
    }

    pub fn client(tickets: TicketService) -> Self {
        Self {
            tickets,
            all: false,
            list: Loadable::pending(),
        }
    }

    pub async fn load(&mut self) {
        self.list.begin();
        let result = if self.all {
            self.tickets.get_all_tickets().await
        } else {
            self.tickets.get_tickets().await
        };
        self.list.settle(result);
    }
}

#[derive(Debug, Clone)]
pub struct AddTicketPage {
    tickets: TicketService,
    /// From `?client=` on the admin form.
    client_override: Option<Uuid>,
    pub types: Loadable<Vec<TicketType>>,
    pub ticket_type_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub severity: TicketSeverity,
    pub in_flight: bool,
    pub error: Option<String>,
}

impl AddTicketPage {
    pub fn new(tickets: TicketService, client_override: Option<Uuid>) -> Self {
        Self {
            tickets,
            client_override,
            types: Loadable::pending(),
            ticket_type_id: None,
            title: String::new(),
            description: String::new(),
            priority: TicketPriority::Normal,
            severity: TicketSeverity::None,
            in_flight: false,
            error: None,
        }
    }

    pub fn client_override(&self) -> Option<Uuid> {
        self.client_override
    }

    /// Loads the type picker and preselects the first type.
    pub async fn load(&mut self) {
        self.types.begin();
        let result = self.tickets.get_ticket_types().await;
        self.types.settle(result);
        if self.ticket_type_id.is_none() {
            self.ticket_type_id = self.types.data().and_then(|t| t.first()).map(|t| t.id);
        }
    }

    pub async fn submit(&mut self) -> Option<Navigation> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.error = None;

        let params = CreateTicketParams {
            ticket_type_id: self.ticket_type_id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            priority: self.priority,
            severity: Some(self.severity),
            client_id: self.client_override,
        };
        let result = self.tickets.create_ticket(params).await;
        self.in_flight = false;
        match (result.error, result.data) {
            (Some(err), _) => {
                self.error = Some(err.message);
                None
            }
            (None, Some(ticket)) => Some(Navigation::to(format!("/tickets/{}", ticket.id))),
            (None, None) => None,
        }
    }
}

/// Staff-editable fields of a ticket as entered on the form.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketEditForm {
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub severity: TicketSeverity,
    /// Agent id as typed; blank unassigns.
    pub assignee: String,
}

impl TicketEditForm {
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            status: ticket.status,
            priority: ticket.priority,
            severity: ticket.severity.unwrap_or_default(),
            assignee: ticket
                .assigned_agent_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn to_update(&self) -> Result<TicketUpdate, String> {
        let assignee = self.assignee.trim();
        let assigned_agent_id = if assignee.is_empty() {
            None
        } else {
            Some(
                Uuid::parse_str(assignee)
                    .map_err(|_| format!("Invalid agent id: {}", assignee))?,
            )
        };
        Ok(TicketUpdate {
            status: Some(self.status),
            priority: Some(self.priority),
            severity: Some(self.severity),
            assigned_agent_id: Some(assigned_agent_id),
        })
    }
}

/// A ticket with its conversation. Staff also get the edit form.
#[derive(Debug, Clone)]
pub struct TicketDetailPage {
    tickets: TicketService,
    id: Option<Uuid>,
    editable: bool,
    pub ticket: Loadable<Ticket>,
    pub messages: Loadable<Vec<Message>>,
    pub types: Loadable<Vec<TicketType>>,
    pub form: Option<TicketEditForm>,
    pub update_in_flight: bool,
    pub update_error: Option<String>,
    pub new_message: String,
    pub msg_in_flight: bool,
    pub msg_error: Option<String>,
}

impl TicketDetailPage {
    pub fn new(tickets: TicketService, id: Option<Uuid>, editable: bool) -> Self {
        Self {
            tickets,
            id,
            editable,
            ticket: Loadable::pending(),
            messages: Loadable::pending(),
            types: Loadable::pending(),
            form: None,
            update_in_flight: false,
            update_error: None,
            new_message: String::new(),
            msg_in_flight: false,
            msg_error: None,
        }
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// Ticket first; messages and types only once it is known to exist.
    pub async fn load(&mut self) {
        let Some(id) = self.id else {
            self.ticket.fail(TICKET_NOT_FOUND);
            self.messages.loading = false;
            self.types.loading = false;
            return;
        };

        self.ticket.begin();
        let result = self.tickets.get_ticket_by_id(id).await;
        self.ticket.settle(result);
        let Some(ticket) = self.ticket.data() else {
            self.form = None;
            self.messages.loading = false;
            self.types.loading = false;
            return;
        };
        if self.editable {
            self.form = Some(TicketEditForm::from_ticket(ticket));
        }

        self.load_messages(id).await;
        self.types.begin();
        let result = self.tickets.get_ticket_types().await;
        self.types.settle(result);
    }

    async fn load_messages(&mut self, id: Uuid) {
        self.messages.begin();
        let result = self.tickets.get_messages(id).await;
        self.messages.settle(result);
    }

    /// Name of the ticket's type, once both are loaded.
    pub fn type_name(&self) -> Option<&str> {
        let type_id = self.ticket.data()?.ticket_type_id?;
        self.types
            .data()?
            .iter()
            .find(|t| t.id == type_id)
            .map(|t| t.name.as_str())
    }

    /// Save the edit form, then reload the page from the backend.
    pub async fn update(&mut self) {
        let (Some(id), Some(form)) = (self.id, self.form.as_ref()) else {
            return;
        };
        if self.update_in_flight {
            return;
        }
        let updates = match form.to_update() {
            Ok(updates) => updates,
            Err(message) => {
                self.update_error = Some(message);
                return;
            }
        };

        self.update_in_flight = true;
        self.update_error = None;
        let result = self.tickets.update_ticket(id, updates).await;
        self.update_in_flight = false;
        if let Some(err) = result.error {
            self.update_error = Some(err.message);
            return;
        }
        self.load().await;
    }

    /// Post the draft message; the draft is kept if posting fails.
    pub async fn send_message(&mut self) {
        let Some(id) = self.id else {
            return;
        };
        if self.msg_in_flight {
            return;
        }
        self.msg_in_flight = true;
        self.msg_error = None;

        let result = self.tickets.create_message(id, self.new_message.trim()).await;
        self.msg_in_flight = false;
        if let Some(err) = result.error {
            self.msg_error = Some(err.message);
            return;
        }
        self.new_message.clear();
        self.load_messages(id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use helpdesk_core::backend::{AuthBackend, Backend};

    use crate::backend::{
        seed_demo, DemoData, MemoryBackend, Operation, DEMO_ADMIN_EMAIL, DEMO_CONTACT_EMAIL,
        DEMO_PASSWORD,
    };

    async fn signed_in(email: &str) -> (Arc<MemoryBackend>, DemoData, TicketService) {
        let memory = Arc::new(MemoryBackend::new());
        let demo = seed_demo(&memory);
        memory.sign_in_with_password(email, DEMO_PASSWORD).await.unwrap();
        let service = TicketService::new(Backend::from_shared(memory.clone()));
        (memory, demo, service)
    }

    #[tokio::test]
    async fn test_lists_by_portal() {
        let (_, _, service) = signed_in(DEMO_ADMIN_EMAIL).await;
        let mut page = TicketsPage::admin(service);
        page.load().await;
        assert_eq!(page.list.data().unwrap().len(), 4);

        let (_, demo, service) = signed_in(DEMO_CONTACT_EMAIL).await;
        let mut page = TicketsPage::client(service);
        page.load().await;
        let tickets = page.list.data().unwrap();
        assert_eq!(tickets.len(), 3);
        assert!(tickets.iter().all(|t| t.client_id == Some(demo.acme_id)));
    }

    #[tokio::test]
    async fn test_add_ticket_defaults_and_submit() {
        let (_, demo, service) = signed_in(DEMO_CONTACT_EMAIL).await;
        let mut page = AddTicketPage::new(service.clone(), None);
        page.load().await;
        assert_eq!(page.ticket_type_id, Some(1));
        assert_eq!(page.priority, TicketPriority::Normal);
        assert_eq!(page.severity, TicketSeverity::None);

        page.title = "Printer on fire".into();
        page.description = "Smoke everywhere".into();
        let nav = page.submit().await.unwrap();
        let id = Uuid::parse_str(nav.to.trim_start_matches("/tickets/")).unwrap();

        let ticket = service.get_ticket_by_id(id).await.data.unwrap();
        assert_eq!(ticket.status, TicketStatus::New);
        assert_eq!(ticket.client_id, Some(demo.acme_id));
        assert_eq!(ticket.requester_id, demo.contact_id);
    }

    #[tokio::test]
    async fn test_add_ticket_requires_title() {
        let (memory, _, service) = signed_in(DEMO_CONTACT_EMAIL).await;
        let mut page = AddTicketPage::new(service, None);
        page.load().await;
        page.description = "no title".into();

        assert!(page.submit().await.is_none());
        assert!(page.error.is_some());
        memory.assert_not_called(Operation::InsertTicket);
    }

    #[tokio::test]
    async fn test_admin_files_for_client() {
        let (_, demo, service) = signed_in(DEMO_ADMIN_EMAIL).await;
        let mut page = AddTicketPage::new(service.clone(), Some(demo.globex_id));
        page.load().await;
        page.title = "Renewal".into();
        page.description = "Contract renewal".into();
        let nav = page.submit().await.unwrap();

        let id = Uuid::parse_str(nav.to.trim_start_matches("/tickets/")).unwrap();
        let ticket = service.get_ticket_by_id(id).await.data.unwrap();
        assert_eq!(ticket.client_id, Some(demo.globex_id));
    }

    #[test]
    fn test_edit_form_assignee() {
        let form = TicketEditForm {
            status: TicketStatus::Open,
            priority: TicketPriority::High,
            severity: TicketSeverity::Minor,
            assignee: "  ".into(),
        };
        assert_eq!(form.to_update().unwrap().assigned_agent_id, Some(None));

        let agent = Uuid::new_v4();
        let form = TicketEditForm {
            assignee: agent.to_string(),
            ..form
        };
        assert_eq!(form.to_update().unwrap().assigned_agent_id, Some(Some(agent)));

        let form = TicketEditForm {
            assignee: "not-a-uuid".into(),
            ..form
        };
        assert!(form.to_update().is_err());
    }

    #[tokio::test]
    async fn test_detail_loads_and_updates() {
        let (memory, demo, service) = signed_in(DEMO_ADMIN_EMAIL).await;
        let mut page = TicketDetailPage::new(service, Some(demo.ticket_ids[0]), true);
        page.load().await;

        assert_eq!(page.ticket.data().unwrap().title, "Login page returns 500");
        assert_eq!(page.messages.data().unwrap().len(), 2);
        assert_eq!(page.type_name(), Some("BUG"));

        let form = page.form.as_mut().unwrap();
        form.status = TicketStatus::Resolved;
        form.assignee = demo.agent_id.to_string();
        memory.clear_calls();
        page.update().await;

        assert!(page.update_error.is_none());
        let ticket = page.ticket.data().unwrap();
        assert_eq!(ticket.status, TicketStatus::Resolved);
        assert_eq!(ticket.assigned_agent_id, Some(demo.agent_id));
        // Page state is re-read after the write.
        assert!(memory.call_count(Operation::FindTicket) >= 2);
    }

    #[tokio::test]
    async fn test_failed_reload_drops_stale_ticket() {
        let (memory, demo, service) = signed_in(DEMO_ADMIN_EMAIL).await;
        let mut page = TicketDetailPage::new(service, Some(demo.ticket_ids[0]), true);
        page.load().await;
        assert!(page.ticket.data().is_some());

        memory.fail_next(Operation::FindTicket, "connection reset");
        memory.clear_calls();
        page.load().await;

        assert!(page.ticket.error.is_some());
        assert!(page.ticket.data().is_none());
        assert!(page.form.is_none());
        memory.assert_not_called(Operation::ListMessages);
    }

    #[tokio::test]
    async fn test_detail_unknown_ticket() {
        let (memory, _, service) = signed_in(DEMO_ADMIN_EMAIL).await;
        let mut page = TicketDetailPage::new(service.clone(), None, true);
        page.load().await;
        assert_eq!(page.ticket.error.as_deref(), Some(TICKET_NOT_FOUND));
        memory.assert_not_called(Operation::FindTicket);

        let mut page = TicketDetailPage::new(service, Some(Uuid::new_v4()), true);
        page.load().await;
        assert!(page.ticket.error.is_some());
        assert!(!page.messages.loading);
        assert!(page.form.is_none());
    }

    #[tokio::test]
    async fn test_send_message() {
        let (memory, demo, service) = signed_in(DEMO_CONTACT_EMAIL).await;
        let mut page = TicketDetailPage::new(service, Some(demo.ticket_ids[1]), false);
        page.load().await;
        assert!(page.form.is_none());
        assert_eq!(page.messages.data().unwrap().len(), 0);

        page.new_message = "Any update?".into();
        memory.fail_next(Operation::InsertMessage, "connection reset");
        page.send_message().await;
        assert!(page.msg_error.is_some());
        assert_eq!(page.new_message, "Any update?");

        page.send_message().await;
        assert!(page.msg_error.is_none());
        assert!(page.new_message.is_empty());
        let messages = page.messages.data().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].author_id, demo.contact_id);
    }
}

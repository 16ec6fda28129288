use uuid::Uuid;

use helpdesk_core::schema::{Client, ContactInfo, NewClient, Ticket};

use super::{Loadable, Navigation};
use crate::services::{ClientService, TicketService};

#[derive(Debug, Clone)]
pub struct ClientsPage {
    clients: ClientService,
    pub list: Loadable<Vec<Client>>,
}

impl ClientsPage {
    pub fn new(clients: ClientService) -> Self {
        Self {
            clients,
            list: Loadable::pending(),
        }
    }

    pub async fn load(&mut self) {
        self.list.begin();
        let result = self.clients.get_clients().await;
        self.list.settle(result);
    }
}

/// One client with its tickets.
#[derive(Debug, Clone)]
pub struct ClientDetailPage {
    clients: ClientService,
    tickets: TicketService,
    id: Option<Uuid>,
    pub client: Loadable<Client>,
    pub client_tickets: Loadable<Vec<Ticket>>,
}

impl ClientDetailPage {
    /// `id` is `None` when the route parameter is not a UUID.
    pub fn new(clients: ClientService, tickets: TicketService, id: Option<Uuid>) -> Self {
        Self {
            clients,
            tickets,
            id,
            client: Loadable::pending(),
            client_tickets: Loadable::pending(),
        }
    }

    pub async fn load(&mut self) {
        let Some(id) = self.id else {
            self.client.fail("Client not found");
            self.client_tickets.fail("Client not found");
            return;
        };
        self.client.begin();
        let result = self.clients.get_client_by_id(id).await;
        self.client.settle(result);
        if self.client.error.is_some() {
            self.client_tickets.loading = false;
            return;
        }

        self.client_tickets.begin();
        let result = self.tickets.get_client_tickets(id).await;
        self.client_tickets.settle(result);
    }

    /// Ticket form pre-bound to this client.
    pub fn new_ticket_link(&self) -> Option<Navigation> {
        self.id
            .map(|id| Navigation::to(format!("/tickets/new?client={}", id)))
    }
}

/// Client creation form; also sends the contact an invite.
#[derive(Debug, Clone)]
pub struct AddClientPage {
    clients: ClientService,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
    pub in_flight: bool,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl AddClientPage {
    pub fn new(clients: ClientService) -> Self {
        Self {
            clients,
            name: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            notes: String::new(),
            in_flight: false,
            error: None,
            warning: None,
        }
    }

    fn form(&self) -> NewClient {
        let optional = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        NewClient {
            name: self.name.trim().to_string(),
            contact_info: ContactInfo {
                first_name: self.first_name.trim().to_string(),
                last_name: self.last_name.trim().to_string(),
                email: self.email.trim().to_string(),
                phone: optional(&self.phone),
            },
            notes: optional(&self.notes),
        }
    }

    /// Navigates to the new client, keeping any invite warning on the page.
    pub async fn submit(&mut self) -> Option<Navigation> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.error = None;
        self.warning = None;

        let result = self.clients.create_client_with_invite(self.form()).await;
        self.in_flight = false;
        self.warning = result.warning;
        match (result.error, result.data) {
            (Some(err), _) => {
                self.error = Some(err.message);
                None
            }
            (None, Some(client)) => Some(Navigation::to(format!("/clients/{}", client.id))),
            (None, None) => None,
        }
    }
}

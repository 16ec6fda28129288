use helpdesk_core::schema::{Client, TicketStats};

use super::Loadable;
use crate::services::TicketService;

/// Ticket counters for the active client.
#[derive(Debug, Clone)]
pub struct DashboardPage {
    tickets: TicketService,
    pub client_name: Option<String>,
    pub stats: Loadable<TicketStats>,
}

impl DashboardPage {
    pub fn new(tickets: TicketService) -> Self {
        Self {
            tickets,
            client_name: None,
            stats: Loadable::pending(),
        }
    }

    /// Nothing is read until a client is active.
    pub async fn load(&mut self, active_client: Option<&Client>) {
        let Some(client) = active_client else {
            return;
        };
        self.client_name = Some(client.name.clone());
        self.stats.begin();
        let result = self.tickets.get_client_tickets(client.id).await;
        self.stats
            .settle(result.map(|tickets| TicketStats::from_tickets(&tickets)));
    }
}

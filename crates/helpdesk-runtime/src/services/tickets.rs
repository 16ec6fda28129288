use chrono::Utc;
use uuid::Uuid;

use helpdesk_core::backend::Backend;
use helpdesk_core::result::{ApiError, ApiResult};
use helpdesk_core::schema::{
    Message, NewMessage, NewTicket, Ticket, TicketPriority, TicketSeverity, TicketStatus,
    TicketType, TicketUpdate,
};

use super::validate;

pub const TICKET_NOT_FOUND: &str = "Ticket not found";
pub const UPDATE_NOT_PERMITTED: &str =
    "Ticket not found or you don't have permission to update it";
pub const REFETCH_FAILED: &str = "Update succeeded but failed to fetch updated ticket";

/// Form input for a new ticket.
#[derive(Debug, Clone, Default)]
pub struct CreateTicketParams {
    pub ticket_type_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    /// `None` files the ticket as `NONE`.
    pub severity: Option<TicketSeverity>,
    /// Admin override; otherwise the caller's own client.
    pub client_id: Option<Uuid>,
}

/// Ticket, message and ticket-type data access for both portals.
#[derive(Debug, Clone)]
pub struct TicketService {
    backend: Backend,
}

impl TicketService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Every ticket the caller can see, newest first.
    pub async fn get_all_tickets(&self) -> ApiResult<Vec<Ticket>> {
        let auth = self.backend.auth_context().await;
        self.backend.tickets.list(&auth).await.into()
    }

    /// The caller's tickets. Visibility does the filtering.
    pub async fn get_tickets(&self) -> ApiResult<Vec<Ticket>> {
        self.get_all_tickets().await
    }

    pub async fn get_client_tickets(&self, client_id: Uuid) -> ApiResult<Vec<Ticket>> {
        let auth = self.backend.auth_context().await;
        self.backend
            .tickets
            .list_by_client(&auth, client_id)
            .await
            .into()
    }

    pub async fn get_ticket_by_id(&self, id: Uuid) -> ApiResult<Ticket> {
        let auth = self.backend.auth_context().await;
        match self.backend.tickets.find_by_id(&auth, id).await {
            Ok(Some(ticket)) => ApiResult::success(ticket),
            Ok(None) => ApiResult::failure(ApiError::not_found(TICKET_NOT_FOUND)),
            Err(e) => ApiResult::failure(e),
        }
    }

    /// Confirm the ticket is visible, update it, then return the row as re-read.
    pub async fn update_ticket(&self, id: Uuid, updates: TicketUpdate) -> ApiResult<Ticket> {
        let auth = self.backend.auth_context().await;

        match self.backend.tickets.find_by_id(&auth, id).await {
            Ok(Some(_)) => {}
            Ok(None) => return ApiResult::failure(ApiError::not_found(UPDATE_NOT_PERMITTED)),
            Err(e) => return ApiResult::failure(e),
        }

        if let Err(e) = self
            .backend
            .tickets
            .update_fields(&auth, id, updates, Utc::now())
            .await
        {
            return ApiResult::failure(e);
        }

        match self.backend.tickets.find_by_id(&auth, id).await {
            Ok(Some(ticket)) => {
                tracing::info!(ticket_id = %id, status = %ticket.status, "Ticket updated");
                ApiResult::success(ticket)
            }
            other => {
                tracing::warn!(ticket_id = %id, result = ?other.map(|_| ()), "Refetch after update failed");
                ApiResult::failure(ApiError::new("REFETCH_FAILED", REFETCH_FAILED))
            }
        }
    }

    /// Messages of a ticket, oldest first.
    pub async fn get_messages(&self, ticket_id: Uuid) -> ApiResult<Vec<Message>> {
        let auth = self.backend.auth_context().await;
        self.backend
            .messages
            .list_by_ticket(&auth, ticket_id)
            .await
            .into()
    }

    pub async fn create_message(&self, ticket_id: Uuid, content: &str) -> ApiResult<Message> {
        let content = match validate::required("message", content) {
            Ok(content) => content.to_string(),
            Err(e) => return ApiResult::failure(e),
        };
        let auth = self.backend.auth_context().await;
        self.backend
            .messages
            .insert(&auth, NewMessage { ticket_id, content })
            .await
            .into()
    }

    /// Ticket types by id.
    pub async fn get_ticket_types(&self) -> ApiResult<Vec<TicketType>> {
        let auth = self.backend.auth_context().await;
        self.backend.ticket_types.list(&auth).await.into()
    }

    /// File a ticket as the caller, status `NEW`.
    pub async fn create_ticket(&self, params: CreateTicketParams) -> ApiResult<Ticket> {
        let auth = self.backend.auth_context().await;
        let requester_id = match auth.require_user_id() {
            Ok(id) => id,
            Err(e) => return ApiResult::failure(e),
        };

        let fields = validate::required("title", &params.title)
            .and_then(|title| Ok((title, validate::required("description", &params.description)?)));
        let (title, description) = match fields {
            Ok(fields) => fields,
            Err(e) => return ApiResult::failure(e),
        };

        let ticket = NewTicket {
            ticket_type_id: params.ticket_type_id,
            title: title.to_string(),
            description: Some(description.to_string()),
            status: TicketStatus::New,
            priority: params.priority,
            severity: params.severity.unwrap_or_default(),
            requester_id,
            client_id: params.client_id.or(auth.client_id()),
        };

        let result = self.backend.tickets.insert(&auth, ticket).await;
        if let Ok(created) = &result {
            tracing::info!(ticket_id = %created.id, client_id = ?created.client_id, "Ticket created");
        }
        result.into()
    }
}

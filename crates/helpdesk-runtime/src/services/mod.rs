//! Data-access services.
//!
//! Each call reads the caller identity from the current session and returns
//! an [`ApiResult`](helpdesk_core::ApiResult); failures never escape as `Err`.

mod auth;
mod clients;
mod tickets;
pub mod validate;

pub use auth::{parse_callback_fragment, AuthService, CallbackTokens, NO_TOKENS_IN_URL, NO_VALID_INVITE};
pub use clients::{ClientService, INVITE_FAILED_WARNING};
pub use tickets::{
    CreateTicketParams, TicketService, REFETCH_FAILED, TICKET_NOT_FOUND, UPDATE_NOT_PERMITTED,
};

use chrono::Duration;
use helpdesk_core::backend::Backend;

/// All services over one backend.
#[derive(Debug, Clone)]
pub struct Services {
    pub auth: AuthService,
    pub clients: ClientService,
    pub tickets: TicketService,
}

impl Services {
    pub fn new(backend: Backend, invite_ttl: Duration) -> Self {
        Self {
            auth: AuthService::new(backend.clone()),
            clients: ClientService::new(backend.clone(), invite_ttl),
            tickets: TicketService::new(backend),
        }
    }
}

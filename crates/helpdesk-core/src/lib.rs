pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod policy;
pub mod result;
pub mod schema;
pub mod testing;

pub use auth::{AuthContext, AuthEvent, AuthStateChange, AuthUser, Session, TokenClaims};
pub use backend::{
    AuthBackend, Backend, ClientRepository, InviteRepository, MessageRepository,
    ProfileRepository, SignUpMetadata, SignUpOutcome, SignUpRequest, TicketRepository,
    TicketTypeRepository,
};
pub use config::{HelpdeskConfig, PortalKind};
pub use error::{HelpdeskError, Result};
pub use policy::{ClientScope, Collection};
pub use result::{ApiError, ApiResult};
pub use schema::*;

//! Backend adapters and the factory choosing one from configuration.

mod memory;
mod rest;
mod seed;
mod token;

use std::sync::Arc;

use helpdesk_core::backend::Backend;
use helpdesk_core::config::{BackendKind, HelpdeskConfig};
use helpdesk_core::error::Result;

use crate::db::{apply_schema, Database, PgStore};

pub use memory::{MemoryBackend, Operation, RecordedCall};
pub use rest::RestBackend;
pub use seed::{
    seed_demo, DemoData, DEMO_ADMIN_EMAIL, DEMO_AGENT_EMAIL, DEMO_CONTACT_EMAIL,
    DEMO_INVITED_EMAIL, DEMO_PASSWORD,
};
pub use token::{sign_claims, TokenDecoder, TokenError};

/// Build the backend named by `config.backend.kind`.
///
/// The postgres kind serves tables from the database and authenticates
/// through the hosted auth service. The memory kind starts empty; use
/// [`connect_demo`] for seeded data.
pub async fn connect(config: &HelpdeskConfig) -> Result<Backend> {
    let kind = config.backend.kind;
    tracing::info!(backend = kind.as_str(), "Connecting backend");

    match kind {
        BackendKind::Rest => Ok(Backend::from_shared(Arc::new(RestBackend::new(
            &config.backend,
        )?))),
        BackendKind::Postgres => {
            let db = Database::from_config(&config.database).await?;
            apply_schema(db.pool()).await?;
            let store = Arc::new(PgStore::new(db));
            let auth = Arc::new(RestBackend::new(&config.backend)?);
            Ok(Backend {
                clients: store.clone(),
                invites: store.clone(),
                profiles: store.clone(),
                tickets: store.clone(),
                messages: store.clone(),
                ticket_types: store,
                auth,
            })
        }
        BackendKind::Memory => Ok(Backend::from_shared(Arc::new(MemoryBackend::new()))),
    }
}

/// In-memory backend populated with [`seed_demo`].
pub fn connect_demo() -> (Backend, Arc<MemoryBackend>, DemoData) {
    let memory = Arc::new(MemoryBackend::new());
    let demo = seed_demo(&memory);
    (Backend::from_shared(memory.clone()), memory, demo)
}

//! Visible clients and the active one.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use helpdesk_core::schema::Client;

use crate::services::ClientService;

/// What a dashboard-layout page may do given the scope state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardGate {
    Loading,
    /// No clients: send the user to client creation.
    RedirectToAddClient,
    Render,
}

impl DashboardGate {
    pub fn evaluate(is_loading: bool, client_count: usize) -> Self {
        if is_loading {
            Self::Loading
        } else if client_count == 0 {
            Self::RedirectToAddClient
        } else {
            Self::Render
        }
    }
}

#[derive(Debug)]
struct ScopeState {
    clients: Vec<Client>,
    active: Option<Uuid>,
    loading: bool,
}

/// Client list plus active-client selection.
#[derive(Debug)]
pub struct ClientScopeStore {
    service: ClientService,
    state: RwLock<ScopeState>,
}

impl ClientScopeStore {
    /// Starts in the loading state until [`load`](Self::load) settles.
    pub fn new(service: ClientService) -> Self {
        Self {
            service,
            state: RwLock::new(ScopeState {
                clients: Vec::new(),
                active: None,
                loading: true,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ScopeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScopeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the client list. The first client becomes active if none is.
    /// Errors are logged and leave an empty list.
    pub async fn load(&self) {
        self.write().loading = true;

        let result = self.service.get_clients().await;
        let clients = match (result.data, result.error) {
            (_, Some(err)) => {
                tracing::warn!(code = %err.code, error = %err.message, "Failed to load clients");
                Vec::new()
            }
            (Some(clients), None) => clients,
            (None, None) => Vec::new(),
        };

        let mut state = self.write();
        if state.active.is_none() {
            state.active = clients.first().map(|c| c.id);
        }
        tracing::debug!(count = clients.len(), active = ?state.active, "Client scope loaded");
        state.clients = clients;
        state.loading = false;
    }

    /// Forget the list and selection, e.g. when the identity changes.
    pub fn reset(&self) {
        let mut state = self.write();
        state.clients.clear();
        state.active = None;
        state.loading = true;
    }

    pub fn clients(&self) -> Vec<Client> {
        self.read().clients.clone()
    }

    pub fn active_client(&self) -> Option<Client> {
        let state = self.read();
        let active = state.active?;
        state.clients.iter().find(|c| c.id == active).cloned()
    }

    /// Pick the active client. Returns false if `id` is not in the list.
    pub fn set_active_client(&self, id: Uuid) -> bool {
        let mut state = self.write();
        if !state.clients.iter().any(|c| c.id == id) {
            return false;
        }
        state.active = Some(id);
        true
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub fn gate(&self) -> DashboardGate {
        let state = self.read();
        DashboardGate::evaluate(state.loading, state.clients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use helpdesk_core::backend::{AuthBackend, Backend};
    use helpdesk_core::schema::Role;
    use helpdesk_core::testing::new_client;

    use crate::backend::{MemoryBackend, Operation};

    async fn store_with(clients: &[&str]) -> (ClientScopeStore, Arc<MemoryBackend>) {
        let memory = Arc::new(MemoryBackend::new());
        for name in clients {
            memory.seed_client(new_client(name));
        }
        memory.add_user("agent@example.com", "pw", Some(Role::Agent), None, None);
        memory
            .sign_in_with_password("agent@example.com", "pw")
            .await
            .unwrap();
        let service = ClientService::new(Backend::from_shared(memory.clone()), Duration::days(7));
        (ClientScopeStore::new(service), memory)
    }

    #[tokio::test]
    async fn test_first_client_becomes_active() {
        let (store, _) = store_with(&["Acme", "Globex"]).await;
        assert!(store.is_loading());
        assert_eq!(store.gate(), DashboardGate::Loading);

        store.load().await;
        assert!(!store.is_loading());
        assert_eq!(store.active_client().unwrap().name, "Acme");
        assert_eq!(store.gate(), DashboardGate::Render);
    }

    #[tokio::test]
    async fn test_selection_survives_reload() {
        let (store, _) = store_with(&["Acme", "Globex"]).await;
        store.load().await;

        let globex = store.clients()[1].id;
        assert!(store.set_active_client(globex));
        assert!(!store.set_active_client(Uuid::new_v4()));

        store.load().await;
        assert_eq!(store.active_client().unwrap().id, globex);
    }

    #[tokio::test]
    async fn test_zero_clients_redirects() {
        let (store, _) = store_with(&[]).await;
        store.load().await;
        assert_eq!(store.gate(), DashboardGate::RedirectToAddClient);
        assert!(store.active_client().is_none());
    }

    #[tokio::test]
    async fn test_load_error_is_swallowed() {
        let (store, memory) = store_with(&["Acme"]).await;
        memory.fail_next(Operation::ListClients, "relation \"clients\" does not exist");

        store.load().await;
        assert!(!store.is_loading());
        assert!(store.clients().is_empty());
        assert_eq!(store.gate(), DashboardGate::RedirectToAddClient);
    }

    #[tokio::test]
    async fn test_reset_clears_selection() {
        let (store, _) = store_with(&["Acme", "Globex"]).await;
        store.load().await;
        store.set_active_client(store.clients()[1].id);

        store.reset();
        assert_eq!(store.gate(), DashboardGate::Loading);
        store.load().await;
        assert_eq!(store.active_client().unwrap().name, "Acme");
    }
}

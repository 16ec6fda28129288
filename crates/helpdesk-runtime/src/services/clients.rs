use chrono::{Duration, Utc};
use uuid::Uuid;

use helpdesk_core::backend::Backend;
use helpdesk_core::result::{ApiError, ApiResult};
use helpdesk_core::schema::{Client, NewClient, NewInvite, Role};

use super::validate;

/// Warning attached when the client row exists but its invite does not.
pub const INVITE_FAILED_WARNING: &str = "Client created but invite failed to send";

/// Client (tenant) data access.
#[derive(Debug, Clone)]
pub struct ClientService {
    backend: Backend,
    invite_ttl: Duration,
}

impl ClientService {
    pub fn new(backend: Backend, invite_ttl: Duration) -> Self {
        Self {
            backend,
            invite_ttl,
        }
    }

    /// Clients visible to the caller, oldest first.
    pub async fn get_clients(&self) -> ApiResult<Vec<Client>> {
        let auth = self.backend.auth_context().await;
        self.backend.clients.list(&auth).await.into()
    }

    pub async fn get_client_by_id(&self, id: Uuid) -> ApiResult<Client> {
        let auth = self.backend.auth_context().await;
        match self.backend.clients.find_by_id(&auth, id).await {
            Ok(Some(client)) => ApiResult::success(client),
            Ok(None) => ApiResult::failure(ApiError::not_found("Client not found")),
            Err(e) => ApiResult::failure(e),
        }
    }

    /// Insert the client row only.
    pub async fn create_client(&self, client: NewClient) -> ApiResult<Client> {
        if let Err(e) = validate::new_client(&client) {
            return ApiResult::failure(e);
        }
        let auth = self.backend.auth_context().await;
        let result = self.backend.clients.insert(&auth, client).await;
        if let Ok(created) = &result {
            tracing::info!(client_id = %created.id, "Client created");
        }
        result.into()
    }

    /// Insert the client, then invite its primary contact.
    ///
    /// A failed invite does not undo the client: the result carries the
    /// client and [`INVITE_FAILED_WARNING`].
    pub async fn create_client_with_invite(&self, client: NewClient) -> ApiResult<Client> {
        let email = client.contact_info.email.trim().to_string();
        let created = self.create_client(client).await;
        if !created.is_success() {
            return created;
        }
        let Some(created_client) = created.data else {
            return ApiResult::failure(ApiError::internal("Client insert returned no row"));
        };

        let auth = self.backend.auth_context().await;
        let invite = NewInvite {
            client_id: created_client.id,
            email,
            role: Role::ClientContact,
            expires_at: Utc::now() + self.invite_ttl,
        };

        match self.backend.invites.insert(&auth, invite).await {
            Ok(invite) => {
                tracing::info!(
                    client_id = %created_client.id,
                    invite_id = %invite.id,
                    "Invite created"
                );
                ApiResult::success(created_client)
            }
            Err(e) => {
                tracing::warn!(
                    client_id = %created_client.id,
                    error = %e,
                    "Client created but invite insert failed"
                );
                ApiResult::success(created_client).with_warning(INVITE_FAILED_WARNING)
            }
        }
    }
}

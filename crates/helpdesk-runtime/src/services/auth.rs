use chrono::Utc;

use helpdesk_core::auth::{AuthContext, Session};
use helpdesk_core::backend::{Backend, SignUpMetadata, SignUpOutcome, SignUpRequest};
use helpdesk_core::result::{ApiError, ApiResult};
use helpdesk_core::schema::{Invite, NewProfile, Role};

use super::validate;

pub const NO_VALID_INVITE: &str = "No valid invite found for this email address";
pub const NO_TOKENS_IN_URL: &str = "No tokens found in URL";

/// Tokens handed over in an auth redirect fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Extract `access_token` and `refresh_token` from `#k=v&k=v`.
pub fn parse_callback_fragment(fragment: &str) -> Option<CallbackTokens> {
    let fragment = fragment.trim().trim_start_matches('#');
    let mut access_token = None;
    let mut refresh_token = None;

    for pair in fragment.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        match key {
            "access_token" => access_token = Some(value.to_string()),
            "refresh_token" => refresh_token = Some(value.to_string()),
            _ => {}
        }
    }

    Some(CallbackTokens {
        access_token: access_token?,
        refresh_token: refresh_token?,
    })
}

/// Sign-in, sign-up and invite flows.
#[derive(Debug, Clone)]
pub struct AuthService {
    backend: Backend,
}

impl AuthService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Unused, unexpired invite for `email`.
    pub async fn validate_invite(&self, email: &str) -> ApiResult<Invite> {
        let auth = self.backend.auth_context().await;
        match self
            .backend
            .invites
            .find_valid_by_email(&auth, email.trim(), Utc::now())
            .await
        {
            Ok(Some(invite)) => ApiResult::success(invite),
            Ok(None) => ApiResult::failure(ApiError::not_found(NO_VALID_INVITE)),
            Err(e) => ApiResult::failure(e),
        }
    }

    /// Register a client contact against their invite.
    ///
    /// Steps run in order with no compensation: a failed invite update is
    /// logged and skipped, a failed profile insert is returned after the
    /// identity already exists.
    pub async fn sign_up_with_invite(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> ApiResult<SignUpOutcome> {
        let checked = validate::credentials(email, password)
            .and_then(|_| validate::required("full name", full_name));
        let full_name = match checked {
            Ok(name) => name.to_string(),
            Err(e) => return ApiResult::failure(e),
        };
        let email = email.trim();

        let invite = match self.validate_invite(email).await.into_result() {
            Ok(Some(invite)) => invite,
            Ok(None) | Err(_) => {
                return ApiResult::failure(ApiError::not_found(NO_VALID_INVITE));
            }
        };

        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            metadata: SignUpMetadata {
                role: Some(Role::ClientContact),
                client_id: Some(invite.client_id),
                full_name: Some(full_name.clone()),
            },
        };
        let outcome = match self.backend.auth.sign_up(request).await {
            Ok(outcome) => outcome,
            Err(e) => return ApiResult::failure(e),
        };
        let user_id = outcome.user.id;

        let auth = outcome
            .session
            .as_ref()
            .map(Session::auth_context)
            .unwrap_or_else(AuthContext::anonymous);

        if let Err(e) = self
            .backend
            .invites
            .mark_used(&auth, invite.id, Utc::now())
            .await
        {
            tracing::warn!(
                invite_id = %invite.id,
                %user_id,
                error = %e,
                "Identity created but invite could not be marked used"
            );
        }

        let profile = NewProfile {
            id: user_id,
            full_name: Some(full_name),
            role: Role::ClientContact,
            client_id: Some(invite.client_id),
        };
        if let Err(e) = self.backend.profiles.insert(&auth, profile).await {
            tracing::error!(
                invite_id = %invite.id,
                %user_id,
                error = %e,
                "Identity created but profile insert failed"
            );
            return ApiResult::failure(e);
        }

        tracing::info!(%user_id, client_id = %invite.client_id, "Client contact registered");
        ApiResult::success(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<Session> {
        if let Err(e) = validate::credentials(email, password) {
            return ApiResult::failure(e);
        }
        self.backend
            .auth
            .sign_in_with_password(email.trim(), password)
            .await
            .into()
    }

    /// Plain registration, no invite and no metadata.
    pub async fn sign_up(&self, email: &str, password: &str) -> ApiResult<SignUpOutcome> {
        if let Err(e) = validate::credentials(email, password) {
            return ApiResult::failure(e);
        }
        self.backend
            .auth
            .sign_up(SignUpRequest {
                email: email.trim().to_string(),
                password: password.to_string(),
                metadata: SignUpMetadata::default(),
            })
            .await
            .into()
    }

    pub async fn sign_out(&self) -> ApiResult<()> {
        self.backend.auth.sign_out().await.into()
    }

    /// Establish the session carried by an auth redirect.
    pub async fn handle_auth_callback(&self, fragment: &str) -> ApiResult<Session> {
        let Some(tokens) = parse_callback_fragment(fragment) else {
            return ApiResult::failure(ApiError::validation(NO_TOKENS_IN_URL));
        };
        self.backend
            .auth
            .set_session(&tokens.access_token, &tokens.refresh_token)
            .await
            .into()
    }
}

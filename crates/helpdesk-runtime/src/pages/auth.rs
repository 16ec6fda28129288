use std::time::Duration;

use helpdesk_core::schema::Invite;

use super::Navigation;
use crate::guard::SIGN_IN_PATH;
use crate::services::AuthService;
use crate::session::SessionSnapshot;

/// Sign-in and sign-up forms are skipped for a signed-in user.
fn redirect_if_signed_in(snapshot: &SessionSnapshot) -> Option<Navigation> {
    snapshot.is_authenticated().then(|| Navigation::to("/"))
}

#[derive(Debug, Clone)]
pub struct SignInPage {
    auth: AuthService,
    pub email: String,
    pub password: String,
    pub in_flight: bool,
    pub error: Option<String>,
}

impl SignInPage {
    pub fn new(auth: AuthService) -> Self {
        Self {
            auth,
            email: String::new(),
            password: String::new(),
            in_flight: false,
            error: None,
        }
    }

    pub fn redirect(snapshot: &SessionSnapshot) -> Option<Navigation> {
        redirect_if_signed_in(snapshot)
    }

    pub async fn submit(&mut self) -> Option<Navigation> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.error = None;

        let result = self.auth.sign_in(&self.email, &self.password).await;
        self.in_flight = false;
        match result.error {
            Some(err) => {
                self.error = Some(err.message);
                None
            }
            None => Some(Navigation::to("/")),
        }
    }
}

/// Admin portal: plain email and password registration.
#[derive(Debug, Clone)]
pub struct AdminSignUpPage {
    auth: AuthService,
    pub email: String,
    pub password: String,
    pub in_flight: bool,
    pub error: Option<String>,
    /// Set when the account exists but must be confirmed by email first.
    pub notice: Option<String>,
}

impl AdminSignUpPage {
    pub fn new(auth: AuthService) -> Self {
        Self {
            auth,
            email: String::new(),
            password: String::new(),
            in_flight: false,
            error: None,
            notice: None,
        }
    }

    pub async fn submit(&mut self) -> Option<Navigation> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.error = None;
        self.notice = None;

        let result = self.auth.sign_up(&self.email, &self.password).await;
        self.in_flight = false;
        match (result.error, result.data) {
            (Some(err), _) => {
                self.error = Some(err.message);
                None
            }
            (None, Some(outcome)) if outcome.session.is_some() => Some(Navigation::to("/")),
            (None, _) => {
                self.notice = Some("Check your email to confirm your account".into());
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpStep {
    /// Look up the invite for an email.
    Email,
    /// Password and full name.
    Details,
}

/// Client portal: registration against an invite.
#[derive(Debug, Clone)]
pub struct InviteSignUpPage {
    auth: AuthService,
    pub step: SignUpStep,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub invite: Option<Invite>,
    pub in_flight: bool,
    pub error: Option<String>,
}

impl InviteSignUpPage {
    pub fn new(auth: AuthService) -> Self {
        Self {
            auth,
            step: SignUpStep::Email,
            email: String::new(),
            password: String::new(),
            full_name: String::new(),
            invite: None,
            in_flight: false,
            error: None,
        }
    }

    /// Step one. Moves to [`SignUpStep::Details`] when an invite exists.
    pub async fn check_invite(&mut self) {
        if self.in_flight {
            return;
        }
        self.in_flight = true;
        self.error = None;

        let result = self.auth.validate_invite(&self.email).await;
        self.in_flight = false;
        match (result.error, result.data) {
            (None, Some(invite)) => {
                self.invite = Some(invite);
                self.step = SignUpStep::Details;
            }
            (Some(err), _) => self.error = Some(err.message),
            (None, None) => {
                self.error = Some(crate::services::NO_VALID_INVITE.to_string());
            }
        }
    }

    /// Step two.
    pub async fn submit(&mut self) -> Option<Navigation> {
        if self.in_flight || self.step != SignUpStep::Details {
            return None;
        }
        self.in_flight = true;
        self.error = None;

        let result = self
            .auth
            .sign_up_with_invite(&self.email, &self.password, &self.full_name)
            .await;
        self.in_flight = false;
        match (result.error, result.data) {
            (Some(err), _) => {
                self.error = Some(err.message);
                None
            }
            (None, Some(outcome)) if outcome.session.is_some() => Some(Navigation::to("/")),
            // Email confirmation pending.
            (None, _) => Some(Navigation::to(SIGN_IN_PATH)),
        }
    }
}

/// The sign-up form of the portal in use.
#[derive(Debug, Clone)]
pub enum SignUpPage {
    Admin(AdminSignUpPage),
    Invite(InviteSignUpPage),
}

impl SignUpPage {
    pub fn redirect(snapshot: &SessionSnapshot) -> Option<Navigation> {
        redirect_if_signed_in(snapshot)
    }
}

/// Completes a redirect-based sign-in from the URL fragment.
#[derive(Debug, Clone)]
pub struct AuthCallbackPage {
    auth: AuthService,
    redirect_delay: Duration,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthCallbackPage {
    pub fn new(auth: AuthService, redirect_delay: Duration) -> Self {
        Self {
            auth,
            redirect_delay,
            loading: true,
            error: None,
        }
    }

    /// Home on success; sign-in after the configured delay otherwise.
    pub async fn handle(&mut self, fragment: Option<&str>) -> Navigation {
        let result = self.auth.handle_auth_callback(fragment.unwrap_or("")).await;
        self.loading = false;
        match result.error {
            None => Navigation::to("/"),
            Some(err) => {
                tracing::warn!(error = %err.message, "Auth callback failed");
                self.error = Some(err.message);
                Navigation::after(SIGN_IN_PATH, self.redirect_delay)
            }
        }
    }
}

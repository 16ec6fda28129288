//! Page controllers.
//!
//! A page owns its loading, error and data state and reports navigation as
//! a value. Mutations re-read from the backend instead of patching state.

mod auth;
mod clients;
mod dashboard;
mod home;
mod tickets;

use std::time::Duration;

use helpdesk_core::result::ApiResult;

pub use auth::{AdminSignUpPage, AuthCallbackPage, InviteSignUpPage, SignInPage, SignUpPage, SignUpStep};
pub use clients::{AddClientPage, ClientDetailPage, ClientsPage};
pub use dashboard::DashboardPage;
pub use home::{HomeLink, HomePage, NotFoundPage, ProtectedPage};
pub use tickets::{AddTicketPage, TicketDetailPage, TicketEditForm, TicketsPage};

/// State of one read.
#[derive(Debug, Clone, PartialEq)]
pub struct Loadable<T> {
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Self {
            loading: false,
            error: None,
            data: None,
        }
    }
}

impl<T> Loadable<T> {
    /// Loading until the first read settles.
    pub fn pending() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Take the outcome of a read: either data or an error, never both.
    pub fn settle(&mut self, result: ApiResult<T>) {
        match result.error {
            Some(err) => self.fail(err.message),
            None => {
                self.loading = false;
                self.data = result.data;
            }
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.data = None;
        self.error = Some(message.into());
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }
}

/// A requested route change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub to: String,
    /// Wait before navigating.
    pub delay: Option<Duration>,
}

impl Navigation {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            to: path.into(),
            delay: None,
        }
    }

    pub fn after(path: impl Into<String>, delay: Duration) -> Self {
        Self {
            to: path.into(),
            delay: Some(delay),
        }
    }
}

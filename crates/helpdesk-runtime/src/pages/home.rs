use helpdesk_core::config::PortalKind;

use super::Navigation;
use crate::guard::SIGN_IN_PATH;
use crate::services::AuthService;
use crate::session::SessionSnapshot;

/// A labelled link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeLink {
    pub label: &'static str,
    pub to: &'static str,
}

const ADMIN_LINKS: &[HomeLink] = &[
    HomeLink { label: "Dashboard", to: "/dashboard" },
    HomeLink { label: "Clients", to: "/clients" },
    HomeLink { label: "Tickets", to: "/tickets" },
    HomeLink { label: "Add Client", to: "/add-client" },
    HomeLink { label: "Protected Page", to: "/protected" },
];

const CLIENT_LINKS: &[HomeLink] = &[
    HomeLink { label: "My Tickets", to: "/tickets" },
    HomeLink { label: "Create New Ticket", to: "/tickets/new" },
    HomeLink { label: "Protected Page", to: "/protected" },
];

#[derive(Debug, Clone)]
pub struct HomePage {
    pub portal: PortalKind,
    pub email: Option<String>,
    pub signed_in: bool,
}

impl HomePage {
    pub fn new(portal: PortalKind, snapshot: &SessionSnapshot) -> Self {
        Self {
            portal,
            email: snapshot
                .session
                .as_ref()
                .and_then(|s| s.user.email.clone()),
            signed_in: snapshot.is_authenticated(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self.portal {
            PortalKind::Admin => "Helpdesk Admin",
            PortalKind::Client => "Welcome to the Client Portal",
        }
    }

    pub fn links(&self) -> &'static [HomeLink] {
        match self.portal {
            PortalKind::Admin => ADMIN_LINKS,
            PortalKind::Client => CLIENT_LINKS,
        }
    }

    /// Sign out. The guard takes over from here; the redirect is returned anyway.
    pub async fn sign_out(&mut self, auth: &AuthService) -> Result<Navigation, String> {
        let result = auth.sign_out().await;
        match result.error {
            Some(err) => Err(err.message),
            None => {
                self.signed_in = false;
                self.email = None;
                Ok(Navigation::to(SIGN_IN_PATH))
            }
        }
    }
}

/// Shows who is signed in.
#[derive(Debug, Clone)]
pub struct ProtectedPage {
    pub email: Option<String>,
    pub role: Option<String>,
}

impl ProtectedPage {
    pub fn new(snapshot: &SessionSnapshot) -> Self {
        Self {
            email: snapshot
                .session
                .as_ref()
                .and_then(|s| s.user.email.clone()),
            role: snapshot.role.map(|r| r.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotFoundPage {
    pub path: String,
}

impl NotFoundPage {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn message(&self) -> String {
        format!("Page not found: {}", self.path)
    }

    pub fn home(&self) -> Navigation {
        Navigation::to("/")
    }
}

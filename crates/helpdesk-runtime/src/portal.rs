//! One portal instance: routing, guards and page mounting.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use helpdesk_core::backend::Backend;
use helpdesk_core::config::{HelpdeskConfig, PortalKind};
use helpdesk_core::error::Result;

use crate::backend::{self, DemoData, MemoryBackend};
use crate::guard::{self, GuardDecision};
use crate::pages::{
    AddClientPage, AddTicketPage, AdminSignUpPage, AuthCallbackPage, ClientDetailPage,
    ClientsPage, DashboardPage, HomePage, InviteSignUpPage, Navigation, NotFoundPage,
    ProtectedPage, SignInPage, SignUpPage, TicketDetailPage, TicketsPage,
};
use crate::router::{Access, Layout, PageId, RouteMatch, RouteTable};
use crate::scope::{ClientScopeStore, DashboardGate};
use crate::services::Services;
use crate::session::{SessionSnapshot, SessionStore};

/// Where the dashboard layout sends an admin with no clients.
pub const ADD_CLIENT_PATH: &str = "/add-client";

/// A mounted page.
#[derive(Debug)]
pub enum Screen {
    Home(HomePage),
    Protected(ProtectedPage),
    Dashboard(DashboardPage),
    Clients(ClientsPage),
    ClientDetail(ClientDetailPage),
    AddClient(AddClientPage),
    Tickets(TicketsPage),
    AddTicket(AddTicketPage),
    TicketDetail(TicketDetailPage),
    SignIn(SignInPage),
    SignUp(SignUpPage),
    /// Callback already handled; `next` is where to go.
    AuthCallback {
        page: AuthCallbackPage,
        next: Navigation,
    },
    NotFound(NotFoundPage),
}

/// Outcome of opening a URL.
#[derive(Debug)]
pub enum View {
    Loading,
    Redirect(Navigation),
    Screen(Box<Screen>),
}

impl View {
    fn redirect(path: impl Into<String>) -> Self {
        Self::Redirect(Navigation::to(path))
    }
}

pub struct Portal {
    config: HelpdeskConfig,
    backend: Backend,
    services: Services,
    session: SessionStore,
    scope: ClientScopeStore,
    routes: RouteTable,
    /// Identity the client scope was loaded for.
    scope_owner: Mutex<Option<Uuid>>,
}

impl std::fmt::Debug for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Portal")
            .field("portal", &self.routes.portal())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Portal {
    /// Wire a portal over `backend`. Must be called inside a tokio runtime.
    pub fn new(config: HelpdeskConfig, backend: Backend) -> Self {
        let services = Services::new(backend.clone(), config.invites.ttl());
        let session = SessionStore::start(backend.auth.clone());
        let scope = ClientScopeStore::new(services.clients.clone());
        let routes = RouteTable::for_portal(config.portal.kind);

        tracing::info!(
            portal = config.portal.kind.as_str(),
            backend = config.backend.kind.as_str(),
            "Portal started"
        );

        Self {
            config,
            backend,
            services,
            session,
            scope,
            routes,
            scope_owner: Mutex::new(None),
        }
    }

    /// Connect to the configured backend.
    pub async fn connect(config: HelpdeskConfig) -> Result<Self> {
        config.validate()?;
        let backend = backend::connect(&config).await?;
        Ok(Self::new(config, backend))
    }

    /// A portal over a seeded in-memory backend.
    pub fn demo(portal: PortalKind) -> (Self, Arc<MemoryBackend>, DemoData) {
        let (backend, memory, demo) = backend::connect_demo();
        let config = HelpdeskConfig::memory(portal);
        (Self::new(config, backend), memory, demo)
    }

    pub fn kind(&self) -> PortalKind {
        self.routes.portal()
    }

    pub fn config(&self) -> &HelpdeskConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn scope(&self) -> &ClientScopeStore {
        &self.scope
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Wait until the initial auth state is known.
    pub async fn ready(&self) -> SessionSnapshot {
        self.session.wait_resolved().await
    }

    /// Re-read the client scope, e.g. after a client was added.
    pub async fn refresh_scope(&self) {
        self.scope.load().await;
    }

    /// Resolve `url` and mount its page.
    pub async fn open(&self, url: &str) -> View {
        let matched = self.routes.resolve(url);
        let snapshot = self.session.snapshot();
        let route = matched.route;
        tracing::debug!(path = %matched.path, page = ?route.page, "Opening page");

        // Nothing mounts until the initial auth state is known.
        if !snapshot.resolved {
            return View::Loading;
        }

        if route.access == Access::Guarded {
            match guard::check(&snapshot) {
                GuardDecision::Loading => return View::Loading,
                GuardDecision::Redirect(to) => return View::redirect(to),
                GuardDecision::Render => {}
            }
        }

        if matches!(route.page, PageId::SignIn | PageId::SignUp) {
            if let Some(nav) = SignInPage::redirect(&snapshot) {
                return View::Redirect(nav);
            }
        }

        if route.layout == Layout::Dashboard {
            self.ensure_scope(&snapshot).await;
            match self.scope.gate() {
                DashboardGate::Loading => return View::Loading,
                DashboardGate::RedirectToAddClient => return View::redirect(ADD_CLIENT_PATH),
                DashboardGate::Render => {}
            }
        }

        View::Screen(Box::new(self.mount(&matched, &snapshot).await))
    }

    /// Load the scope once per identity.
    async fn ensure_scope(&self, snapshot: &SessionSnapshot) {
        let user_id = snapshot.session.as_ref().map(|s| s.user.id);
        let stale = {
            let mut owner = self
                .scope_owner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let stale = *owner != user_id;
            *owner = user_id;
            stale
        };
        if stale {
            self.scope.reset();
            self.scope.load().await;
        }
    }

    async fn mount(&self, matched: &RouteMatch, snapshot: &SessionSnapshot) -> Screen {
        let services = &self.services;
        let is_admin_portal = self.kind() == PortalKind::Admin;

        match matched.page() {
            PageId::Home => Screen::Home(HomePage::new(self.kind(), snapshot)),
            PageId::Protected => Screen::Protected(ProtectedPage::new(snapshot)),
            PageId::Dashboard => {
                let mut page = DashboardPage::new(services.tickets.clone());
                page.load(self.scope.active_client().as_ref()).await;
                Screen::Dashboard(page)
            }
            PageId::Clients => {
                let mut page = ClientsPage::new(services.clients.clone());
                page.load().await;
                Screen::Clients(page)
            }
            PageId::ClientDetail => {
                let mut page = ClientDetailPage::new(
                    services.clients.clone(),
                    services.tickets.clone(),
                    matched.param_uuid("id"),
                );
                page.load().await;
                Screen::ClientDetail(page)
            }
            PageId::AddClient => Screen::AddClient(AddClientPage::new(services.clients.clone())),
            PageId::Tickets => {
                let mut page = if is_admin_portal {
                    TicketsPage::admin(services.tickets.clone())
                } else {
                    TicketsPage::client(services.tickets.clone())
                };
                page.load().await;
                Screen::Tickets(page)
            }
            PageId::AddTicket => {
                let client_override = matched
                    .query("client")
                    .and_then(|v| Uuid::parse_str(v).ok());
                let mut page = AddTicketPage::new(services.tickets.clone(), client_override);
                page.load().await;
                Screen::AddTicket(page)
            }
            PageId::TicketDetail => {
                let mut page = TicketDetailPage::new(
                    services.tickets.clone(),
                    matched.param_uuid("id"),
                    is_admin_portal,
                );
                page.load().await;
                Screen::TicketDetail(page)
            }
            PageId::SignIn => Screen::SignIn(SignInPage::new(services.auth.clone())),
            PageId::SignUp => Screen::SignUp(if is_admin_portal {
                SignUpPage::Admin(AdminSignUpPage::new(services.auth.clone()))
            } else {
                SignUpPage::Invite(InviteSignUpPage::new(services.auth.clone()))
            }),
            PageId::AuthCallback => {
                let delay =
                    Duration::from_millis(self.config.portal.auth_callback_redirect_delay_ms);
                let mut page = AuthCallbackPage::new(services.auth.clone(), delay);
                let next = page.handle(matched.fragment.as_deref()).await;
                Screen::AuthCallback { page, next }
            }
            PageId::NotFound => Screen::NotFound(NotFoundPage::new(matched.path.clone())),
        }
    }

    /// Stop following the auth stream.
    pub fn close(&mut self) {
        self.session.close();
        tracing::info!("Portal closed");
    }
}

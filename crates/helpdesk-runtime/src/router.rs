//! Static route tables for the two portals.

use std::collections::HashMap;

use uuid::Uuid;

use helpdesk_core::config::PortalKind;

/// Every page either portal can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageId {
    Home,
    Protected,
    Dashboard,
    Clients,
    ClientDetail,
    AddClient,
    Tickets,
    AddTicket,
    TicketDetail,
    SignIn,
    SignUp,
    AuthCallback,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Requires a session.
    Guarded,
}

/// Pages nested in the admin dashboard layout need a non-empty client scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Plain,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub pattern: &'static str,
    pub page: PageId,
    pub access: Access,
    pub layout: Layout,
}

impl Route {
    const fn new(pattern: &'static str, page: PageId, access: Access, layout: Layout) -> Self {
        Self {
            pattern,
            page,
            access,
            layout,
        }
    }

    /// Match path segments, capturing `:name` segments.
    fn matches(&self, segments: &[&str]) -> Option<HashMap<String, String>> {
        let pattern: Vec<&str> = split_segments(self.pattern);
        if pattern.len() != segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (expected, actual) in pattern.iter().zip(segments) {
            match expected.strip_prefix(':') {
                Some(name) => {
                    params.insert(name.to_string(), (*actual).to_string());
                }
                None if expected == actual => {}
                None => return None,
            }
        }
        Some(params)
    }
}

const NOT_FOUND: Route = Route::new("*", PageId::NotFound, Access::Public, Layout::Plain);

use Access::{Guarded, Public};
use Layout::{Dashboard, Plain};

const AUTH_ROUTES: [Route; 3] = [
    Route::new("/auth/sign-in", PageId::SignIn, Public, Plain),
    Route::new("/auth/sign-up", PageId::SignUp, Public, Plain),
    Route::new("/auth/callback", PageId::AuthCallback, Public, Plain),
];

const ADMIN_ROUTES: [Route; 8] = [
    Route::new("/", PageId::Home, Guarded, Plain),
    Route::new("/protected", PageId::Protected, Guarded, Plain),
    Route::new("/add-client", PageId::AddClient, Guarded, Plain),
    Route::new("/dashboard", PageId::Dashboard, Guarded, Dashboard),
    Route::new("/clients", PageId::Clients, Guarded, Dashboard),
    Route::new("/clients/:id", PageId::ClientDetail, Guarded, Dashboard),
    Route::new("/tickets", PageId::Tickets, Guarded, Dashboard),
    Route::new("/tickets/:id", PageId::TicketDetail, Guarded, Dashboard),
];

// `/tickets/new` precedes `/tickets/:id`.
const CLIENT_ROUTES: [Route; 7] = [
    Route::new("/", PageId::Home, Guarded, Plain),
    Route::new("/protected", PageId::Protected, Guarded, Plain),
    Route::new("/add-client", PageId::AddClient, Guarded, Plain),
    Route::new("/clients/:id", PageId::ClientDetail, Guarded, Plain),
    Route::new("/tickets", PageId::Tickets, Guarded, Plain),
    Route::new("/tickets/new", PageId::AddTicket, Guarded, Plain),
    Route::new("/tickets/:id", PageId::TicketDetail, Guarded, Plain),
];

/// A path resolved against a route table.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub route: Route,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Text after `#`, without the `#`.
    pub fragment: Option<String>,
}

impl RouteMatch {
    pub fn page(&self) -> PageId {
        self.route.page
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A path parameter parsed as a UUID.
    pub fn param_uuid(&self, name: &str) -> Option<Uuid> {
        self.param(name).and_then(|v| Uuid::parse_str(v).ok())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Ordered routes of one portal; first match wins, then NotFound.
#[derive(Debug, Clone)]
pub struct RouteTable {
    portal: PortalKind,
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn admin() -> Self {
        Self {
            portal: PortalKind::Admin,
            routes: AUTH_ROUTES.iter().chain(ADMIN_ROUTES.iter()).copied().collect(),
        }
    }

    pub fn client() -> Self {
        Self {
            portal: PortalKind::Client,
            routes: AUTH_ROUTES.iter().chain(CLIENT_ROUTES.iter()).copied().collect(),
        }
    }

    pub fn for_portal(portal: PortalKind) -> Self {
        match portal {
            PortalKind::Admin => Self::admin(),
            PortalKind::Client => Self::client(),
        }
    }

    pub fn portal(&self) -> PortalKind {
        self.portal
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Resolve `path[?query][#fragment]`.
    pub fn resolve(&self, url: &str) -> RouteMatch {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (url, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (rest, HashMap::new()),
        };
        let path = if path.is_empty() { "/" } else { path };
        let segments = split_segments(path);

        let (route, params) = self
            .routes
            .iter()
            .find_map(|r| r.matches(&segments).map(|params| (*r, params)))
            .unwrap_or((NOT_FOUND, HashMap::new()));

        RouteMatch {
            route,
            path: path.to_string(),
            params,
            query,
            fragment,
        }
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_routes() {
        let table = RouteTable::admin();
        assert_eq!(table.resolve("/").page(), PageId::Home);
        assert_eq!(table.resolve("/dashboard").page(), PageId::Dashboard);
        assert_eq!(table.resolve("/clients").page(), PageId::Clients);

        let id = Uuid::new_v4();
        let matched = table.resolve(&format!("/clients/{}", id));
        assert_eq!(matched.page(), PageId::ClientDetail);
        assert_eq!(matched.param_uuid("id"), Some(id));
        assert_eq!(matched.route.layout, Layout::Dashboard);

        // Admins have no ticket form route.
        assert_eq!(table.resolve("/tickets/new").page(), PageId::TicketDetail);
    }

    #[test]
    fn test_client_routes() {
        let table = RouteTable::client();
        assert_eq!(table.resolve("/tickets/new").page(), PageId::AddTicket);
        assert_eq!(table.resolve("/tickets/abc").page(), PageId::TicketDetail);
        assert_eq!(table.resolve("/dashboard").page(), PageId::NotFound);
        assert!(table
            .routes()
            .iter()
            .all(|r| r.layout == Layout::Plain));
    }

    #[test]
    fn test_query_and_fragment() {
        let table = RouteTable::client();
        let id = Uuid::new_v4();
        let matched = table.resolve(&format!("/tickets/new?client={}", id));
        assert_eq!(matched.page(), PageId::AddTicket);
        assert_eq!(matched.query("client"), Some(id.to_string().as_str()));

        let matched = table.resolve("/auth/callback#access_token=a&refresh_token=b");
        assert_eq!(matched.page(), PageId::AuthCallback);
        assert_eq!(matched.fragment.as_deref(), Some("access_token=a&refresh_token=b"));
        assert_eq!(matched.route.access, Access::Public);
    }

    #[test]
    fn test_unknown_paths_are_not_found() {
        let table = RouteTable::admin();
        let matched = table.resolve("/nope/at/all");
        assert_eq!(matched.page(), PageId::NotFound);
        assert_eq!(matched.route.access, Access::Public);
        assert_eq!(table.resolve("").page(), PageId::Home);
    }
}

pub mod backend;
pub mod db;
pub mod guard;
pub mod pages;
pub mod portal;
pub mod router;
pub mod scope;
pub mod services;
pub mod session;

pub use backend::{connect, connect_demo, MemoryBackend, Operation, RestBackend};
pub use db::{Database, PgStore};
pub use guard::{GuardDecision, GuardState, SIGN_IN_PATH};
pub use pages::{Loadable, Navigation};
pub use portal::{Portal, Screen, View, ADD_CLIENT_PATH};
pub use router::{PageId, RouteMatch, RouteTable};
pub use scope::{ClientScopeStore, DashboardGate};
pub use services::{AuthService, ClientService, Services, TicketService};
pub use session::{SessionSnapshot, SessionStore};

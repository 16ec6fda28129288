mod claims;
mod context;
mod session;

pub use claims::{Metadata, TokenClaims, TokenClaimsBuilder};
pub use context::AuthContext;
pub use session::{AuthEvent, AuthStateChange, AuthUser, Session};

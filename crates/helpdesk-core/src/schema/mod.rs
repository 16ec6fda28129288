//! Helpdesk schema
//!
//! Entities are owned by the backend; these are transient in-memory copies.

mod enums;
mod models;

pub use enums::*;
pub use models::*;

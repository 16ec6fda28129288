//! Testing utilities for helpdesk crates.
//!
//! Assertion macros for `Result` and `ApiResult`, plus identity builders.
//!
//! # Example
//!
//! ```ignore
//! use helpdesk_core::testing::TestIdentity;
//!
//! let admin = TestIdentity::admin().build_context();
//! assert!(admin.is_admin());
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::{new_client, TestIdentity};

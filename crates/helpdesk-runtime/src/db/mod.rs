mod pool;
mod schema;
mod store;

pub use pool::Database;
pub use schema::{apply_schema, split_statements, SCHEMA_SQL};
pub use store::PgStore;

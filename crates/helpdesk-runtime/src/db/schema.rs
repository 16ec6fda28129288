//! Helpdesk table definitions for the direct Postgres backend.

use sqlx::PgPool;
use tracing::{debug, info};

use helpdesk_core::error::{HelpdeskError, Result};

/// Schema SQL, idempotent.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Create enum types, tables and reference rows if missing.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    let statements = split_statements(SCHEMA_SQL);
    debug!(count = statements.len(), "Applying helpdesk schema");

    for statement in &statements {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            HelpdeskError::Database(format!("Failed to apply schema statement: {}", e))
        })?;
    }

    info!("Helpdesk schema is up to date");
    Ok(())
}

/// Split SQL on `;`, leaving `$$ ... $$` bodies intact. Comment-only chunks are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_dollar_quote = false;

    let mut rest = sql;
    while let Some(c) = rest.chars().next() {
        if rest.starts_with("$$") {
            in_dollar_quote = !in_dollar_quote;
            current.push_str("$$");
            rest = &rest[2..];
            continue;
        }

        rest = &rest[c.len_utf8()..];
        if c == ';' && !in_dollar_quote {
            push_statement(&mut statements, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, chunk: &str) {
    let code_only = chunk
        .lines()
        .filter(|l| !l.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    let stmt = code_only.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}

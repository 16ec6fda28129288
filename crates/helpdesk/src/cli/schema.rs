use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::Path;

use helpdesk_core::config::{HelpdeskConfig, CONFIG_FILE};
use helpdesk_runtime::db::{apply_schema, split_statements, Database, SCHEMA_SQL};

/// Print or apply the Postgres schema.
#[derive(Parser)]
pub struct SchemaCommand {
    /// Apply to the configured database instead of printing.
    #[arg(long)]
    pub apply: bool,

    /// Configuration file path.
    #[arg(short, long, default_value = CONFIG_FILE)]
    pub config: String,
}

impl SchemaCommand {
    pub async fn execute(self) -> Result<()> {
        if !self.apply {
            print!("{}", SCHEMA_SQL);
            return Ok(());
        }

        super::init_tracing(false);

        if !Path::new(&self.config).exists() {
            anyhow::bail!(
                "Configuration file not found: {}\nRun `helpdesk init` to create one.",
                self.config
            );
        }
        let config = HelpdeskConfig::from_file(&self.config)?;
        if config.database.url.is_empty() {
            anyhow::bail!("database.url is not set in {}", self.config);
        }

        println!("  {} Applying schema...", style("→").dim());
        let db = Database::from_config(&config.database).await?;
        apply_schema(db.pool()).await?;
        db.close().await;

        println!(
            "  {} Applied {} statements",
            style("✓").green(),
            split_statements(SCHEMA_SQL).len()
        );
        Ok(())
    }
}

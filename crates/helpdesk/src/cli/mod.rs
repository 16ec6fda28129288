mod init;
mod run;
mod schema;
mod screens;

pub use init::InitCommand;
pub use run::RunCommand;
pub use schema::SchemaCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Helpdesk - multi-tenant support ticketing portals
#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter helpdesk.toml.
    Init(InitCommand),

    /// Open a portal in the terminal.
    Run(RunCommand),

    /// Print or apply the Postgres schema.
    Schema(SchemaCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Init(cmd) => cmd.execute(),
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Schema(cmd) => cmd.execute().await,
        }
    }
}

/// Logs go to stderr so they don't tangle with the prompts.
pub(crate) fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["helpdesk", "run", "--demo", "--portal", "client"]).unwrap();
        match cli.command {
            Commands::Run(cmd) => {
                assert!(cmd.demo);
                assert_eq!(cmd.portal, Some(helpdesk_core::PortalKind::Client));
                assert_eq!(cmd.open, "/");
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parse_schema_and_init() {
        assert!(Cli::try_parse_from(["helpdesk", "schema", "--apply"]).is_ok());
        assert!(Cli::try_parse_from(["helpdesk", "init", "--backend", "postgres"]).is_ok());
        assert!(Cli::try_parse_from(["helpdesk", "run", "--portal", "staff"]).is_err());
    }
}

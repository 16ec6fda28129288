use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use helpdesk_core::config::{HelpdeskConfig, CONFIG_FILE};
use helpdesk_core::PortalKind;
use helpdesk_runtime::backend::{
    DEMO_ADMIN_EMAIL, DEMO_AGENT_EMAIL, DEMO_CONTACT_EMAIL, DEMO_INVITED_EMAIL, DEMO_PASSWORD,
};
use helpdesk_runtime::{Portal, View};

use super::screens;

/// Open a portal in the terminal.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = CONFIG_FILE)]
    pub config: String,

    /// Portal to open (overrides config).
    #[arg(short, long)]
    pub portal: Option<PortalKind>,

    /// Use the seeded in-memory backend; no config needed.
    #[arg(long)]
    pub demo: bool,

    /// First location, e.g. an auth callback URL.
    #[arg(long, default_value = "/")]
    pub open: String,

    /// Debug logging on stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunCommand {
    pub async fn execute(self) -> Result<()> {
        super::init_tracing(self.verbose);

        println!();
        println!(
            "  {} v{}",
            style("HELPDESK").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!();

        let mut portal = if self.demo {
            let kind = self.portal.unwrap_or_default();
            let (portal, _, _) = Portal::demo(kind);
            print_demo_accounts(kind);
            portal
        } else {
            self.connect().await?
        };

        let pb = spinner("Restoring session...")?;
        let snapshot = portal.ready().await;
        pb.finish_and_clear();
        if let Some(session) = &snapshot.session {
            println!(
                "  {} Signed in as {}",
                style("✓").green(),
                session.user.email.as_deref().unwrap_or("unknown")
            );
        }

        let mut location = self.open;
        loop {
            match portal.open(&location).await {
                View::Loading => {
                    portal.ready().await;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                View::Redirect(nav) => {
                    if let Some(delay) = nav.delay {
                        tokio::time::sleep(delay).await;
                    }
                    info!(from = %location, to = %nav.to, "Redirect");
                    location = nav.to;
                }
                View::Screen(screen) => {
                    match screens::render(&portal, *screen, &location).await? {
                        Some(next) => location = next,
                        None => break,
                    }
                }
            }
        }

        portal.close();
        println!("\n  {}", style("Goodbye!").bold());
        Ok(())
    }

    async fn connect(&self) -> Result<Portal> {
        if !Path::new(&self.config).exists() {
            anyhow::bail!(
                "Configuration file not found: {}\nRun `helpdesk init` to create one, or pass --demo.",
                self.config
            );
        }
        info!("Loading configuration from {}", self.config);
        let mut config = HelpdeskConfig::from_file(&self.config)?;
        if let Some(kind) = self.portal {
            config.portal.kind = kind;
        }

        let pb = spinner(&format!("Connecting to {} backend...", config.backend.kind.as_str()))?;
        let portal = Portal::connect(config).await;
        pb.finish_and_clear();
        Ok(portal?)
    }
}

pub(crate) fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("  {spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn print_demo_accounts(kind: PortalKind) {
    println!(
        "  {} Demo data loaded ({} portal). Password for every account: {}",
        style("ℹ").blue(),
        kind.as_str(),
        style(DEMO_PASSWORD).bold()
    );
    match kind {
        PortalKind::Admin => {
            println!("    admin  {}", DEMO_ADMIN_EMAIL);
            println!("    agent  {}", DEMO_AGENT_EMAIL);
        }
        PortalKind::Client => {
            println!("    contact  {}", DEMO_CONTACT_EMAIL);
            println!("    invited  {} (sign up first)", DEMO_INVITED_EMAIL);
        }
    }
    println!();
}

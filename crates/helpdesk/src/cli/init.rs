use anyhow::Result;
use clap::Parser;
use console::style;
use std::fs;
use std::path::{Path, PathBuf};

use helpdesk_core::config::{BackendKind, CONFIG_FILE};
use helpdesk_core::PortalKind;

/// Write a starter helpdesk.toml.
#[derive(Parser)]
pub struct InitCommand {
    /// Directory to write into.
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Backend kind: rest, postgres or memory.
    #[arg(short, long, default_value = "rest")]
    pub backend: BackendKind,

    /// Portal served by default.
    #[arg(short, long, default_value = "admin")]
    pub portal: PortalKind,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn execute(self) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        if path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists. Use --force to overwrite it.",
                path.display()
            );
        }

        write_config(&path, self.backend, self.portal)?;
        println!("{} Wrote {}", style("✓").green(), path.display());
        if self.backend != BackendKind::Memory {
            println!(
                "  {} Set HELPDESK_URL and HELPDESK_ANON_KEY (a .env file works).",
                style("→").dim()
            );
        }
        if self.backend == BackendKind::Postgres {
            println!(
                "  {} Set DATABASE_URL, then run `helpdesk schema --apply`.",
                style("→").dim()
            );
        }
        Ok(())
    }
}

fn write_config(path: &Path, backend: BackendKind, portal: PortalKind) -> Result<()> {
    fs::write(path, config_template(backend, portal))?;
    Ok(())
}

/// Commented starter config. Secrets come from the environment.
pub fn config_template(backend: BackendKind, portal: PortalKind) -> String {
    let database = if backend == BackendKind::Postgres {
        r#"
[database]
url = "${DATABASE_URL}"
pool_size = 10
"#
    } else {
        ""
    };

    format!(
        r#"[project]
name = "helpdesk"

[backend]
# rest | postgres | memory
kind = "{backend}"
url = "${{HELPDESK_URL}}"
anon_key = "${{HELPDESK_ANON_KEY}}"
request_timeout_secs = 30
{database}
[portal]
# admin | client
kind = "{portal}"
auth_callback_redirect_delay_ms = 3000

[invites]
ttl_hours = 168
"#,
        backend = backend.as_str(),
        portal = portal.as_str(),
        database = database,
    )
}

mod backend;
mod database;

pub use backend::{BackendConfig, BackendKind};
pub use database::DatabaseConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HelpdeskError, Result};

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "helpdesk.toml";

/// Root configuration for the helpdesk portals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Backend selection and hosted-backend connection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Database configuration (Postgres backend only).
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Portal behaviour.
    #[serde(default)]
    pub portal: PortalConfig,

    /// Invite issuance.
    #[serde(default)]
    pub invites: InviteConfig,
}

impl HelpdeskConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| HelpdeskError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = substitute_env_vars(content);

        let config: Self = toml::from_str(&content)
            .map_err(|e| HelpdeskError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for the in-memory demo store.
    pub fn memory(portal: PortalKind) -> Self {
        Self {
            backend: BackendConfig {
                kind: BackendKind::Memory,
                ..Default::default()
            },
            portal: PortalConfig {
                kind: portal,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Check that the selected backend has what it needs to connect.
    pub fn validate(&self) -> Result<()> {
        let kind = self.backend.kind;
        // The postgres store still signs users in through the hosted auth service.
        if matches!(kind, BackendKind::Rest | BackendKind::Postgres) {
            if self.backend.url.is_empty() {
                return Err(HelpdeskError::Config(format!(
                    "backend.url is required for the {} backend",
                    kind.as_str()
                )));
            }
            if self.backend.anon_key.is_empty() {
                return Err(HelpdeskError::Config(format!(
                    "backend.anon_key is required for the {} backend",
                    kind.as_str()
                )));
            }
        }
        if kind == BackendKind::Postgres && self.database.url.is_empty() {
            return Err(HelpdeskError::Config(
                "database.url is required for the postgres backend".into(),
            ));
        }
        Ok(())
    }
}

/// Project metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name.
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Project version.
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            version: default_version(),
        }
    }
}

fn default_project_name() -> String {
    "helpdesk".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Which of the two portals to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalKind {
    /// Staff portal: all tenants, ticket triage.
    #[default]
    Admin,
    /// Tenant contacts: own organization's tickets.
    Client,
}

impl PortalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Client => "client",
        }
    }
}

impl std::str::FromStr for PortalKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "client" => Ok(Self::Client),
            other => Err(format!("Unknown portal kind: {}", other)),
        }
    }
}

/// Portal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub kind: PortalKind,

    /// Delay before a failed auth callback sends the user back to sign-in.
    #[serde(default = "default_callback_delay")]
    pub auth_callback_redirect_delay_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            kind: PortalKind::default(),
            auth_callback_redirect_delay_ms: default_callback_delay(),
        }
    }
}

fn default_callback_delay() -> u64 {
    3000
}

/// Invite configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteConfig {
    /// Hours until a freshly issued invite expires.
    #[serde(default = "default_invite_ttl")]
    pub ttl_hours: i64,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_invite_ttl(),
        }
    }
}

impl InviteConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }
}

fn default_invite_ttl() -> i64 {
    7 * 24 // 7 days
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config() {
        let config = HelpdeskConfig::memory(PortalKind::Client);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.portal.kind, PortalKind::Client);
        assert_eq!(config.portal.auth_callback_redirect_delay_ms, 3000);
        assert_eq!(config.invites.ttl(), chrono::Duration::days(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [backend]
            url = "https://abc.example.co"
            anon_key = "public-anon-key"
        "#;

        let config = HelpdeskConfig::parse_toml(toml).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Rest);
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.portal.kind, PortalKind::Admin);
        assert_eq!(config.project.name, "helpdesk");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [project]
            name = "acme-support"
            version = "1.0.0"

            [backend]
            kind = "postgres"
            url = "https://acme.example.com"
            anon_key = "anon"

            [database]
            url = "postgres://localhost/helpdesk"
            pool_size = 5

            [portal]
            kind = "client"
            auth_callback_redirect_delay_ms = 500

            [invites]
            ttl_hours = 24
        "#;

        let config = HelpdeskConfig::parse_toml(toml).unwrap();
        assert_eq!(config.project.name, "acme-support");
        assert_eq!(config.backend.kind, BackendKind::Postgres);
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.portal.kind, PortalKind::Client);
        assert_eq!(config.portal.auth_callback_redirect_delay_ms, 500);
        assert_eq!(config.invites.ttl_hours, 24);
    }

    #[test]
    fn test_missing_connection_settings_rejected() {
        assert!(HelpdeskConfig::parse_toml("[backend]\nkind = \"rest\"").is_err());
        assert!(HelpdeskConfig::parse_toml("[backend]\nkind = \"postgres\"").is_err());
        assert!(HelpdeskConfig::parse_toml("[backend]\nkind = \"memory\"").is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("HELPDESK_TEST_ANON_KEY", "anon-from-env");

        let toml = r#"
            [backend]
            url = "https://abc.example.co"
            anon_key = "${HELPDESK_TEST_ANON_KEY}"
        "#;

        let config = HelpdeskConfig::parse_toml(toml).unwrap();
        assert_eq!(config.backend.anon_key, "anon-from-env");

        std::env::remove_var("HELPDESK_TEST_ANON_KEY");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[backend]\nkind = \"memory\"\n").unwrap();

        let config = HelpdeskConfig::from_file(&path).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Memory);

        assert!(HelpdeskConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}

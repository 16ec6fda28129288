use serde::{Deserialize, Serialize};

/// Which store the portals talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted backend-as-a-service over HTTPS.
    #[default]
    Rest,
    /// Direct Postgres connection.
    Postgres,
    /// In-process store, seeded for demos.
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("Unknown backend kind: {}", other)),
        }
    }
}

/// Hosted backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Project URL of the hosted backend.
    #[serde(default)]
    pub url: String,

    /// Public anonymous API key sent with every request.
    #[serde(default)]
    pub anon_key: String,

    /// Shared JWT secret. When set, access tokens are signature-checked
    /// before their claims are trusted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: String::new(),
            anon_key: String::new(),
            jwt_secret: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

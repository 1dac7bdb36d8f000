use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};

// Constants for hardcoded values
/// Primary public registry host (Docker Hub's v2 API endpoint)
pub const PRIMARY_REGISTRY_HOST: &str = "registry-1.docker.io";

/// Host serving the legacy v1 search/repositories API
pub const INDEX_HOST: &str = "index.docker.io";

/// Host serving the browsable catalog pages
pub const HUB_HOST: &str = "hub.docker.com";

/// Token service for anonymous pulls from the primary registry
pub const AUTH_BASE_URL: &str = "https://auth.docker.io";

/// Service name presented to the token endpoint
pub const AUTH_SERVICE: &str = "registry.docker.io";

/// Namespace the primary registry applies to unqualified short names
pub const DEFAULT_NAMESPACE: &str = "library";

/// Fixed 96-bit NAT64 prefix; the remaining 32 bits carry the IPv4 address
pub const NAT64_PREFIX: &str = "2602:fc59:b0:64::";

/// DNS-over-HTTPS endpoint used for A-record lookups
pub const DOH_ENDPOINT: &str = "https://1.1.1.1/dns-query";

/// Hosts reachable without NAT64 translation
pub const DIRECT_HOSTS: &[&str] = &[
    "registry-1.docker.io",
    "auth.docker.io",
    "index.docker.io",
    "hub.docker.com",
    "1.1.1.1",
];

/// Upper bound on transparently followed Location redirects
pub const MAX_REDIRECT_DEPTH: usize = 5;

/// User-agent substrings blocked out of the box
pub const DEFAULT_BLOCKED_AGENTS: &[&str] = &["netcraft"];

/// Incoming request bodies are buffered so redirect re-dispatch can reuse
/// them; pulls carry no meaningful bodies, so the cap is generous
pub const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    /// Where to send browsers requesting the document root (`HUBPROXY_ROOT_UPSTREAM`).
    /// The literal value `nginx` serves the camouflage page instead.
    #[serde(default)]
    pub root_upstream_url: Option<String>,
    /// 302 target for the document root (`HUBPROXY_ROOT_REDIRECT`); takes
    /// precedence over `root_upstream_url`.
    #[serde(default)]
    pub root_redirect_url: Option<String>,
    /// Lowercased user-agent substrings that get the camouflage page.
    #[serde(default)]
    pub blocked_user_agents: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
            },
            root_upstream_url: None,
            root_redirect_url: None,
            blocked_user_agents: DEFAULT_BLOCKED_AGENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Config {
    /// Build the configuration from defaults plus environment overrides.
    /// Read once at startup; the merged blocklist is an idempotent
    /// re-derivation, so no per-request refresh is needed.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(bind) = std::env::var("HUBPROXY_BIND") {
            if !bind.is_empty() {
                config.server.bind_address = bind;
            }
        }
        if let Ok(port) = std::env::var("HUBPROXY_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ProxyError::Config(format!("invalid HUBPROXY_PORT: {}", port)))?;
        }
        if let Ok(url) = std::env::var("HUBPROXY_ROOT_UPSTREAM") {
            if !url.is_empty() {
                config.root_upstream_url = Some(url);
            }
        }
        if let Ok(url) = std::env::var("HUBPROXY_ROOT_REDIRECT") {
            if !url.is_empty() {
                config.root_redirect_url = Some(url);
            }
        }
        if let Ok(addendum) = std::env::var("HUBPROXY_UA_BLOCKLIST") {
            config.blocked_user_agents.extend(parse_blocklist(&addendum));
        }

        Ok(config)
    }

    /// True when the (lowercased) user-agent matches a blocklist entry.
    pub fn is_blocked_agent(&self, user_agent: &str) -> bool {
        self.blocked_user_agents
            .iter()
            .any(|entry| !entry.is_empty() && user_agent.contains(entry.as_str()))
    }
}

/// Parse a blocklist addendum delimited by commas, whitespace, quotes or
/// newlines into lowercased entries.
pub fn parse_blocklist(raw: &str) -> Vec<String> {
    raw.split(|c: char| matches!(c, ',' | ' ' | '\t' | '\r' | '\n' | '"' | '\''))
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_lowercase())
        .collect()
}

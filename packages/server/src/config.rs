use std::net::IpAddr;

use common::StorageConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
    /// Empty means the socket address is always the client address.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued bearer tokens, in hours. Default: 168 (7 days).
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

fn default_token_ttl_hours() -> i64 {
    168
}

/// Public portfolio hosting on tenant subdomains.
#[derive(Debug, Deserialize, Clone)]
pub struct PortfolioConfig {
    /// Base domains a tenant label may sit under, without port
    /// (e.g. `localhost` for `alice.localhost:8000`).
    #[serde(default = "default_base_domains")]
    pub base_domains: Vec<String>,
    /// Leftmost labels that never address tenant content.
    #[serde(default = "default_excluded_labels")]
    pub excluded_labels: Vec<String>,
    /// Link target of the footer badge and the error pages.
    #[serde(default = "default_platform_url")]
    pub platform_url: String,
    /// Public address of a portfolio; `{slug}` is replaced.
    #[serde(default = "default_url_template")]
    pub url_template: String,
    #[serde(default = "default_max_per_owner")]
    pub max_per_owner: u64,
    /// Repeat views from the same IP inside this window are not counted.
    #[serde(default = "default_view_window_hours")]
    pub view_window_hours: i64,
}

fn default_base_domains() -> Vec<String> {
    vec!["localhost".into()]
}
fn default_excluded_labels() -> Vec<String> {
    ["www", "api", "admin", "app", "mail", "blog", "cdn"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_platform_url() -> String {
    "http://localhost:3000".into()
}
fn default_url_template() -> String {
    "http://{slug}.localhost:3000".into()
}
fn default_max_per_owner() -> u64 {
    5
}
fn default_view_window_hours() -> i64 {
    24
}

impl PortfolioConfig {
    pub fn portfolio_url(&self, slug: &str) -> String {
        self.url_template.replace("{slug}", slug)
    }
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            base_domains: default_base_domains(),
            excluded_labels: default_excluded_labels(),
            platform_url: default_platform_url(),
            url_template: default_url_template(),
            max_per_owner: default_max_per_owner(),
            view_window_hours: default_view_window_hours(),
        }
    }
}

/// What the storage byte ceiling is measured against.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuotaBasis {
    /// Total bytes of active files across all of the owner's containers.
    Lifetime,
    /// Bytes uploaded by the owner during the current UTC day.
    Daily,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublicApiConfig {
    /// Accepted clock skew for `X-Timestamp`, in seconds. Default: 300.
    #[serde(default = "default_signature_window_secs")]
    pub signature_window_secs: i64,
    /// Reject API-key requests that carry no `X-Signature`. Default: false.
    #[serde(default)]
    pub require_signature: bool,
    #[serde(default = "default_quota_basis")]
    pub quota_basis: QuotaBasis,
    /// Per-request log rows older than this are pruned. Default: 30.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: i64,
    /// How often the pruning task runs, in seconds. Default: 3600.
    #[serde(default = "default_retention_interval_secs")]
    pub retention_interval_secs: u64,
}

fn default_signature_window_secs() -> i64 {
    300
}
fn default_quota_basis() -> QuotaBasis {
    QuotaBasis::Lifetime
}
fn default_log_retention_days() -> i64 {
    30
}
fn default_retention_interval_secs() -> u64 {
    3600
}

impl Default for PublicApiConfig {
    fn default() -> Self {
        Self {
            signature_window_secs: default_signature_window_secs(),
            require_signature: false,
            quota_basis: default_quota_basis(),
            log_retention_days: default_log_retention_days(),
            retention_interval_secs: default_retention_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub public_api: PublicApiConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., FOLIO__AUTH__JWT_SECRET)
            .add_source(
                Environment::with_prefix("FOLIO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .with_list_parse_key("server.trusted_proxies")
                    .with_list_parse_key("portfolio.base_domains")
                    .with_list_parse_key("portfolio.excluded_labels")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}

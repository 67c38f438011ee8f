use std::collections::HashSet;

use crate::config::PortfolioConfig;
use crate::utils::slug::is_valid_label;

/// Decides whether a `Host` header addresses tenant content.
#[derive(Debug, Clone)]
pub struct TenantHosts {
    base_domains: Vec<String>,
    excluded_labels: HashSet<String>,
}

impl TenantHosts {
    pub fn new<I, J>(base_domains: I, excluded_labels: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        Self {
            base_domains: base_domains
                .into_iter()
                .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            excluded_labels: excluded_labels
                .into_iter()
                .map(|l| l.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &PortfolioConfig) -> Self {
        Self::new(
            config.base_domains.iter().cloned(),
            config.excluded_labels.iter().cloned(),
        )
    }

    /// The tenant slug addressed by `host`, or `None` for regular traffic.
    ///
    /// The port is ignored. The first label is the slug; the rest must be one
    /// of the configured base domains exactly.
    pub fn resolve(&self, host: &str) -> Option<String> {
        let host = strip_port(host.trim())?.trim_end_matches('.').to_ascii_lowercase();

        let (label, base) = host.split_once('.')?;
        if self.excluded_labels.contains(label) || !is_valid_label(label) {
            return None;
        }
        if !self.base_domains.iter().any(|d| d == base) {
            return None;
        }
        Some(label.to_string())
    }
}

/// Host without its `:port` suffix. Bracketed IPv6 literals are never tenants.
fn strip_port(host: &str) -> Option<&str> {
    if host.starts_with('[') {
        return None;
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => Some(name),
        Some(_) => None,
        None => Some(host),
    }
}

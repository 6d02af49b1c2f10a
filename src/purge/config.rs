//! Purge configuration.
//!
//! Controls the upstream purge endpoint, dispatch limits and event filtering
//! via the `[purge]` section of `purger.toml`.

use std::collections::BTreeSet;
use std::time::Duration;

use url::Url;

// Default values for purge configuration
pub(crate) const DEFAULT_SCHEME: &str = "https";
pub(crate) const DEFAULT_PREFIX: &str = "/purge";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_BODY_LIMIT_BYTES: usize = 512;
pub(crate) const DEFAULT_WATCHED_TAXONOMY: &str = "product_cat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeConfig {
    /// Scheme used to reach `{host}` when no endpoint override is set.
    pub scheme: String,
    /// Reserved path prefix of the purge namespace.
    pub prefix: String,
    /// Connect here instead of `{scheme}://{host}`; the `Host` header still names the site.
    pub endpoint: Option<Url>,
    pub timeout: Duration,
    /// Verify upstream TLS certificates. Disabling is insecure.
    pub verify_tls: bool,
    /// Emit per-attempt diagnostics.
    pub debug: bool,
    /// Upstream response bodies are truncated to this many bytes in messages.
    pub body_limit_bytes: usize,
    pub watched_taxonomies: BTreeSet<String>,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            endpoint: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_tls: true,
            debug: false,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            watched_taxonomies: BTreeSet::from([DEFAULT_WATCHED_TAXONOMY.to_string()]),
        }
    }
}

impl From<&crate::config::PurgeSettings> for PurgeConfig {
    fn from(settings: &crate::config::PurgeSettings) -> Self {
        Self {
            scheme: settings.scheme.clone(),
            prefix: settings.prefix.clone(),
            endpoint: settings.endpoint.clone(),
            timeout: settings.timeout,
            verify_tls: settings.verify_tls,
            debug: settings.debug,
            body_limit_bytes: settings.body_limit_bytes.get(),
            watched_taxonomies: settings.watched_taxonomies.clone(),
        }
    }
}

//! Upstream purge client.
//!
//! Issues one `GET {base}{prefix}{suffix}` per dispatch with the site in the
//! `Host` header, and folds every failure into a [`PurgeOutcome`].

use std::error::Error as StdError;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, header::HOST};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::domain::purge::{PurgeOutcome, PurgeTarget};

use super::config::PurgeConfig;

pub(crate) const METRIC_DISPATCH_TOTAL: &str = "purger_dispatch_total";
pub(crate) const METRIC_DISPATCH_MS: &str = "purger_dispatch_ms";

/// Sends a purge for a resolved target. Implementations never fail; every
/// error becomes an unsuccessful outcome.
#[async_trait]
pub trait PurgeDispatch: Send + Sync {
    async fn dispatch(&self, target: &PurgeTarget, host: &str) -> PurgeOutcome;
}

#[derive(Debug, Error)]
pub enum PurgeClientError {
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

pub struct PurgeClient {
    http: Client,
    config: PurgeConfig,
}

impl PurgeClient {
    pub fn new(config: PurgeConfig) -> Result<Self, PurgeClientError> {
        if !config.verify_tls {
            warn!(
                target = "purger::client",
                "TLS certificate verification is disabled for purge requests"
            );
        }

        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn user_agent() -> &'static str {
        concat!("purger/", env!("CARGO_PKG_VERSION"))
    }

    pub fn config(&self) -> &PurgeConfig {
        &self.config
    }

    /// Build the upstream URL for `target` on `host`.
    pub fn purge_url(&self, target: &PurgeTarget, host: &str) -> Result<Url, String> {
        let mut url = match &self.config.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => {
                let candidate = format!("{}://{host}", self.config.scheme);
                Url::parse(&candidate)
                    .map_err(|err| format!("invalid purge url `{candidate}`: {err}"))?
            }
        };

        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!(
            "{base_path}{}{}",
            self.config.prefix,
            target.purge_suffix()
        ));
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    async fn send(&self, target: &PurgeTarget, host: &str) -> PurgeOutcome {
        if host.is_empty() {
            return PurgeOutcome::missing_host();
        }

        let url = match self.purge_url(target, host) {
            Ok(url) => url,
            Err(message) => return PurgeOutcome::transport_failure(message),
        };

        if self.config.debug {
            info!(
                target = "purger::client",
                url = %url,
                host = %host,
                "Attempting purge"
            );
        }

        let response = match self.http.get(url).header(HOST, host).send().await {
            Ok(response) => response,
            Err(err) => return PurgeOutcome::transport_failure(error_chain(&err)),
        };

        let status = response.status();
        if status.is_success() {
            return PurgeOutcome::succeeded(status.as_u16());
        }

        let body = read_body_prefix(response, self.config.body_limit_bytes).await;
        PurgeOutcome::http_error(
            status.as_u16(),
            &truncate_body(body.trim(), self.config.body_limit_bytes),
        )
    }

    fn log_attempt(
        &self,
        target: &PurgeTarget,
        host: &str,
        outcome: &PurgeOutcome,
        elapsed_ms: f64,
    ) {
        if !self.config.debug {
            return;
        }

        let path = target.path().unwrap_or("*");
        if outcome.success {
            info!(
                target = "purger::client",
                host = %host,
                path = %path,
                status = outcome.http_status,
                elapsed_ms,
                "Purge succeeded"
            );
        } else {
            warn!(
                target = "purger::client",
                host = %host,
                path = %path,
                status = outcome.http_status,
                elapsed_ms,
                detail = %outcome.message,
                "Purge failed"
            );
        }
    }
}

#[async_trait]
impl PurgeDispatch for PurgeClient {
    async fn dispatch(&self, target: &PurgeTarget, host: &str) -> PurgeOutcome {
        let started_at = Instant::now();
        let host = host.trim();
        let outcome = self.send(target, host).await;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

        histogram!(METRIC_DISPATCH_MS).record(elapsed_ms);
        counter!(METRIC_DISPATCH_TOTAL, "outcome" => outcome.label()).increment(1);
        self.log_attempt(target, host, &outcome, elapsed_ms);

        outcome
    }
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(inner) = current {
        let detail = inner.to_string();
        if !message.contains(&detail) {
            message.push_str(": ");
            message.push_str(&detail);
        }
        current = inner.source();
    }
    message
}

/// Read at most a few bytes past `limit` of an error body. The slack keeps a
/// multi-byte char at the cut point intact for [`truncate_body`], which also
/// sees that the body ran long. Read errors end the body early.
async fn read_body_prefix(mut response: reqwest::Response, limit: usize) -> String {
    let cap = limit.saturating_add(4);
    let mut buffer = Vec::new();
    while buffer.len() < cap {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(cap - buffer.len());
                buffer.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Cut `body` to at most `limit` bytes on a char boundary.
pub(crate) fn truncate_body(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }

    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

use std::{sync::Arc, time::Duration};

use axum::http::{HeaderMap, header};

use crate::application::{nonces::NonceLedger, operators::OperatorDirectory};
use crate::purge::{
    AuthorizationGate, EventRouter, PurgeClient, PurgeClientError, PurgeConfig, PurgeDispatch,
    UrlResolver,
};

#[derive(Clone)]
pub struct ApiState {
    pub router: EventRouter,
    pub gate: Arc<AuthorizationGate>,
    pub nonces: NonceLedger,
    pub operators: Arc<OperatorDirectory>,
    pub site_host: Option<Arc<str>>,
}

impl ApiState {
    /// Wire the purge core against a real upstream client.
    pub fn new(
        config: PurgeConfig,
        operators: OperatorDirectory,
        nonce_ttl: Duration,
        site_host: Option<String>,
    ) -> Result<Self, PurgeClientError> {
        let client = PurgeClient::new(config.clone())?;
        Ok(Self::with_dispatcher(
            &config,
            Arc::new(client),
            operators,
            nonce_ttl,
            site_host,
        ))
    }

    pub fn with_dispatcher(
        config: &PurgeConfig,
        dispatcher: Arc<dyn PurgeDispatch>,
        operators: OperatorDirectory,
        nonce_ttl: Duration,
        site_host: Option<String>,
    ) -> Self {
        let resolver = Arc::new(UrlResolver::new(config));
        let nonces = NonceLedger::new(nonce_ttl);
        let router = EventRouter::new(resolver.clone(), dispatcher.clone(), config);
        let gate = AuthorizationGate::new(Arc::new(nonces.clone()), resolver, dispatcher, config);

        Self {
            router,
            gate: Arc::new(gate),
            nonces,
            operators: Arc::new(operators),
            site_host: site_host.map(Arc::from),
        }
    }

    /// Site host for a request: explicit value, then configuration, then `Host`.
    pub fn resolve_host(&self, explicit: Option<&str>, headers: &HeaderMap) -> String {
        explicit
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .or(self.site_host.as_deref())
            .or_else(|| {
                headers
                    .get(header::HOST)
                    .and_then(|value| value.to_str().ok())
                    .map(str::trim)
            })
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn state(site_host: Option<&str>) -> ApiState {
        ApiState::new(
            PurgeConfig::default(),
            OperatorDirectory::default(),
            Duration::from_secs(60),
            site_host.map(str::to_string),
        )
        .expect("client builds")
    }

    fn headers(host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_str(host).expect("header"));
        headers
    }

    #[test]
    fn explicit_host_wins() {
        let state = state(Some("configured.example"));
        assert_eq!(
            state.resolve_host(Some("payload.example"), &headers("header.example")),
            "payload.example"
        );
    }

    #[test]
    fn configured_host_beats_request_header() {
        let state = state(Some("configured.example"));
        assert_eq!(
            state.resolve_host(Some("  "), &headers("header.example")),
            "configured.example"
        );
    }

    #[test]
    fn falls_back_to_request_header_then_empty() {
        let state = state(None);
        assert_eq!(
            state.resolve_host(None, &headers("header.example")),
            "header.example"
        );
        assert_eq!(state.resolve_host(None, &HeaderMap::new()), "");
    }
}

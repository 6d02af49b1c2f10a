//! Wire types for the purger HTTP API.
//!
//! Host CMS integrations post lifecycle payloads to the `/api/v1/hooks/*`
//! endpoints; operator tooling uses the nonce and purge-all endpoints.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Lifecycle action reported for a taxonomy term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermActionParam {
    Create,
    Edit,
    Delete,
}

/// Payload for `POST /api/v1/hooks/entity-saved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySavedPayload {
    pub entity_id: u64,
    pub entity_type: String,
    /// Host status spelling, e.g. `publish`, `future`, `draft`.
    pub status: String,
    /// Permalink or absolute path of the saved entity, when the host could build one.
    #[serde(default)]
    pub canonical_url: Option<String>,
    /// Set for autosaves and revisions.
    #[serde(default)]
    pub transient: bool,
    /// Site host to purge on; defaults to the request `Host` header.
    #[serde(default)]
    pub host: Option<String>,
}

/// Payload for `POST /api/v1/hooks/term-changed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermChangedPayload {
    pub term_id: u64,
    pub taxonomy: String,
    pub action: TermActionParam,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookAcceptedResponse {
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeAllRequest {
    pub nonce: String,
}

/// Result of a manual purge, also used as the error body of the operator API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurgeAllResponse {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_payload_defaults_optional_fields() {
        let payload: EntitySavedPayload = serde_json::from_str(
            r#"{"entity_id":42,"entity_type":"post","status":"publish"}"#,
        )
        .expect("payload should parse");

        assert_eq!(payload.entity_id, 42);
        assert!(payload.canonical_url.is_none());
        assert!(!payload.transient);
        assert!(payload.host.is_none());
    }

    #[test]
    fn term_action_uses_snake_case() {
        let payload: TermChangedPayload = serde_json::from_str(
            r#"{"term_id":7,"taxonomy":"product_cat","action":"delete"}"#,
        )
        .expect("payload should parse");

        assert_eq!(payload.action, TermActionParam::Delete);
    }
}

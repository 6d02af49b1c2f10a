use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::purge::TokenVerifier;

/// Single-use purge tokens bound to the operator they were issued to.
///
/// Tokens are stored by digest only. Presenting a token removes it whether
/// or not the check succeeds.
#[derive(Clone)]
pub struct NonceLedger {
    entries: Arc<DashMap<String, NonceEntry>>,
    ttl: time::Duration,
}

#[derive(Debug, Clone)]
struct NonceEntry {
    caller: String,
    expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct IssuedNonce {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl NonceLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl: time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX),
        }
    }

    pub fn issue(&self, caller: &str) -> IssuedNonce {
        self.issue_at(caller, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, caller: &str, now: OffsetDateTime) -> IssuedNonce {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let expires_at = now.saturating_add(self.ttl);
        self.entries.insert(
            digest(&token),
            NonceEntry {
                caller: caller.to_string(),
                expires_at,
            },
        );
        IssuedNonce { token, expires_at }
    }

    pub fn consume_at(&self, caller: &str, token: &str, now: OffsetDateTime) -> bool {
        match self.entries.remove(&digest(token)) {
            Some((_digest, entry)) => entry.caller == caller && now < entry.expires_at,
            None => false,
        }
    }

    /// Drop every token that expired at or before `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenVerifier for NonceLedger {
    async fn consume(&self, caller: &str, token: &str) -> bool {
        self.consume_at(caller, token, OffsetDateTime::now_utc())
    }
}

fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::OperatorSettings;
use crate::purge::AuthorizationContext;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAuthError {
    #[error("missing operator key")]
    Missing,
    #[error("invalid operator key")]
    Invalid,
}

#[derive(Debug, Clone)]
pub struct OperatorKey {
    pub name: String,
    pub key_sha256: Vec<u8>,
    pub manage: bool,
}

impl From<&OperatorSettings> for OperatorKey {
    fn from(settings: &OperatorSettings) -> Self {
        Self {
            name: settings.name.clone(),
            key_sha256: settings.key_sha256.clone(),
            manage: settings.manage,
        }
    }
}

/// Authenticated operator for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorPrincipal {
    pub name: String,
    pub manage: bool,
}

impl OperatorPrincipal {
    /// Bind this operator to a presented purge token.
    pub fn authorization(&self, token: impl Into<String>) -> AuthorizationContext {
        AuthorizationContext {
            caller_identity: self.name.clone(),
            has_manage_permission: self.manage,
            token: token.into(),
        }
    }
}

/// Static set of operator keys loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct OperatorDirectory {
    keys: Vec<OperatorKey>,
}

impl OperatorDirectory {
    pub fn new(keys: Vec<OperatorKey>) -> Self {
        Self { keys }
    }

    pub fn from_settings(operators: &[OperatorSettings]) -> Self {
        Self::new(operators.iter().map(OperatorKey::from).collect())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn authenticate(&self, token: &str) -> Result<OperatorPrincipal, OperatorAuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(OperatorAuthError::Missing);
        }

        let hashed = hash_key(token);
        // compare against every key so timing does not reveal which one matched
        let mut found = None;
        for key in &self.keys {
            if key.key_sha256.ct_eq(&hashed).unwrap_u8() == 1 && found.is_none() {
                found = Some(key);
            }
        }

        found
            .map(|key| OperatorPrincipal {
                name: key.name.clone(),
                manage: key.manage,
            })
            .ok_or(OperatorAuthError::Invalid)
    }
}

pub fn hash_key(key: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().to_vec()
}

pub fn hash_key_hex(key: &str) -> String {
    hex::encode(hash_key(key))
}

//! Authorization gate for operator-initiated purges.
//!
//! A request starts unauthorized. [`AuthorizationGate::authorize`] either
//! rejects it or hands back an [`Authorized`] value, which is the only way
//! to reach the dispatcher and is consumed by the purge.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::events::MutationEvent;
use crate::domain::purge::PurgeOutcome;

use super::client::PurgeDispatch;
use super::config::PurgeConfig;
use super::resolver::UrlResolver;

pub(crate) const METRIC_MANUAL_REJECTED_TOTAL: &str = "purger_manual_rejected_total";

pub const PERMISSION_ERROR_MESSAGE: &str = "You do not have permission to purge the cache.";
pub const PURGE_SUCCESS_MESSAGE: &str = "Cache purged successfully.";
pub const PURGE_ERROR_PREFIX: &str = "Error purging cache. Check server logs.";

/// Caller identity and credentials as established by the authentication
/// layer. Used for exactly one request.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    pub caller_identity: String,
    pub has_manage_permission: bool,
    pub token: String,
}

/// Single-use anti-replay token check.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns true when `token` was issued to `caller`, is still fresh and
    /// had not been used. The token is spent either way.
    async fn consume(&self, caller: &str, token: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateRejection {
    #[error("token is invalid, expired or already used")]
    InvalidToken,
    #[error("caller lacks the manage permission")]
    InsufficientPermission,
}

impl GateRejection {
    pub fn as_label(self) -> &'static str {
        match self {
            GateRejection::InvalidToken => "invalid_token",
            GateRejection::InsufficientPermission => "insufficient_permission",
        }
    }

    /// Caller-facing outcome. Both rejections share one message.
    pub fn outcome(self) -> PurgeOutcome {
        PurgeOutcome {
            success: false,
            http_status: None,
            message: PERMISSION_ERROR_MESSAGE.to_string(),
        }
    }
}

pub struct AuthorizationGate {
    tokens: Arc<dyn TokenVerifier>,
    resolver: Arc<UrlResolver>,
    dispatcher: Arc<dyn PurgeDispatch>,
    debug: bool,
}

impl AuthorizationGate {
    pub fn new(
        tokens: Arc<dyn TokenVerifier>,
        resolver: Arc<UrlResolver>,
        dispatcher: Arc<dyn PurgeDispatch>,
        config: &PurgeConfig,
    ) -> Self {
        Self {
            tokens,
            resolver,
            dispatcher,
            debug: config.debug,
        }
    }

    /// Check the token, then the permission.
    pub async fn authorize(
        &self,
        context: AuthorizationContext,
    ) -> Result<Authorized<'_>, GateRejection> {
        let AuthorizationContext {
            caller_identity,
            has_manage_permission,
            token,
        } = context;

        let verdict = if !self.tokens.consume(&caller_identity, &token).await {
            Err(GateRejection::InvalidToken)
        } else if !has_manage_permission {
            Err(GateRejection::InsufficientPermission)
        } else {
            Ok(())
        };

        match verdict {
            Ok(()) => Ok(Authorized {
                gate: self,
                caller: caller_identity,
            }),
            Err(rejection) => {
                counter!(METRIC_MANUAL_REJECTED_TOTAL, "reason" => rejection.as_label())
                    .increment(1);
                warn!(
                    target = "purger::gate",
                    caller = %caller_identity,
                    reason = rejection.as_label(),
                    "Manual purge rejected"
                );
                Err(rejection)
            }
        }
    }
}

/// Proof that a manual request passed the gate.
pub struct Authorized<'a> {
    gate: &'a AuthorizationGate,
    caller: String,
}

impl Authorized<'_> {
    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Purge the whole namespace on `host` and describe the result for the caller.
    pub async fn purge_all(self, host: &str) -> PurgeOutcome {
        let target = match self.gate.resolver.resolve(&MutationEvent::PurgeAll) {
            Ok(target) => target,
            Err(err) => {
                return PurgeOutcome {
                    success: false,
                    http_status: None,
                    message: format!("{PURGE_ERROR_PREFIX} {err}"),
                };
            }
        };

        let outcome = self.gate.dispatcher.dispatch(&target, host).await;
        if self.gate.debug || !outcome.success {
            info!(
                target = "purger::gate",
                caller = %self.caller,
                host = %host,
                success = outcome.success,
                status = outcome.http_status,
                "Manual purge dispatched"
            );
        }

        if outcome.success {
            PurgeOutcome {
                message: PURGE_SUCCESS_MESSAGE.to_string(),
                ..outcome
            }
        } else {
            PurgeOutcome {
                message: format!("{PURGE_ERROR_PREFIX} {}", outcome.message),
                ..outcome
            }
        }
    }
}

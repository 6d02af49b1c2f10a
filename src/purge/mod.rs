//! Purge dispatch core.
//!
//! Turns mutation events into invalidation calls against the upstream cache:
//!
//! - **Resolver**: event → purge target (pure)
//! - **Client**: purge target + host → upstream `GET`, classified outcome
//! - **Router**: lifecycle events, fire-and-forget
//! - **Gate**: operator purges, token + permission checked, outcome returned
//!
//! ## Configuration
//!
//! ```toml
//! [purge]
//! scheme = "https"
//! prefix = "/purge"
//! timeout_seconds = 10
//! verify_tls = true
//! watched_taxonomies = ["product_cat"]
//! ```

mod client;
mod config;
mod gate;
mod resolver;
mod router;

pub use client::{PurgeClient, PurgeClientError, PurgeDispatch};
pub use config::PurgeConfig;
pub use gate::{
    AuthorizationContext, AuthorizationGate, Authorized, GateRejection, PERMISSION_ERROR_MESSAGE,
    PURGE_ERROR_PREFIX, PURGE_SUCCESS_MESSAGE, TokenVerifier,
};
pub use resolver::{UrlResolver, canonical_path};
pub use router::{EventRouter, HostEvent, LifecycleHooks, RouteReport};

pub(crate) use client::{METRIC_DISPATCH_MS, METRIC_DISPATCH_TOTAL};
pub(crate) use config::{
    DEFAULT_BODY_LIMIT_BYTES, DEFAULT_PREFIX, DEFAULT_SCHEME, DEFAULT_TIMEOUT_SECS,
    DEFAULT_WATCHED_TAXONOMY,
};
pub(crate) use gate::METRIC_MANUAL_REJECTED_TOTAL;
pub(crate) use router::{
    METRIC_EVENT_DROPPED_TOTAL, METRIC_EVENT_SKIPPED_TOTAL, METRIC_EVENT_UNRESOLVED_TOTAL,
};

//! Event router: lifecycle events in, best-effort purges out.
//!
//! Outcomes are only logged. Nothing here reports back to the content
//! operation that produced the event.

use std::sync::Arc;

use metrics::counter;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::domain::error::{ResolutionError, SkipReason};
use crate::domain::events::{EntitySaved, MutationEvent, TermChanged};
use crate::domain::purge::PurgeOutcome;

use super::client::PurgeDispatch;
use super::config::PurgeConfig;
use super::resolver::UrlResolver;

pub(crate) const METRIC_EVENT_SKIPPED_TOTAL: &str = "purger_event_skipped_total";
pub(crate) const METRIC_EVENT_UNRESOLVED_TOTAL: &str = "purger_event_unresolved_total";
pub(crate) const METRIC_EVENT_DROPPED_TOTAL: &str = "purger_event_dropped_total";

/// A mutation event together with the site host it applies to.
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub event: MutationEvent,
    pub host: String,
}

/// What happened to a routed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteReport {
    Skipped(SkipReason),
    Unresolved(String),
    Dispatched(PurgeOutcome),
}

/// Callbacks the host CMS invokes from its content lifecycle.
///
/// Calls return immediately; the purge runs in the background. Callers need
/// not be inside a Tokio runtime.
pub trait LifecycleHooks {
    fn entity_saved(&self, host: &str, saved: EntitySaved);
    /// Covers term creation, edits and deletion via [`TermChanged::action`].
    fn term_changed(&self, host: &str, changed: TermChanged);
}

#[derive(Clone)]
pub struct EventRouter {
    resolver: Arc<UrlResolver>,
    dispatcher: Arc<dyn PurgeDispatch>,
    runtime: Option<Handle>,
    debug: bool,
}

impl EventRouter {
    pub fn new(
        resolver: Arc<UrlResolver>,
        dispatcher: Arc<dyn PurgeDispatch>,
        config: &PurgeConfig,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            runtime: Handle::try_current().ok(),
            debug: config.debug,
        }
    }

    /// Run background purges on `runtime` instead of the one current at
    /// construction.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Resolve and dispatch one event, returning what happened.
    pub async fn route(&self, event: MutationEvent, host: &str) -> RouteReport {
        let (context_type, context_id) = event.context();

        let target = match self.resolver.resolve(&event) {
            Ok(target) => target,
            Err(ResolutionError::Skipped(reason)) => {
                counter!(METRIC_EVENT_SKIPPED_TOTAL, "reason" => reason.as_label()).increment(1);
                if self.debug {
                    debug!(
                        target = "purger::router",
                        event_kind = event.kind(),
                        context_type,
                        context_id = %context_id,
                        reason = ?reason,
                        "Purge skipped"
                    );
                }
                return RouteReport::Skipped(reason);
            }
            Err(err @ ResolutionError::MissingPath { .. }) => {
                counter!(METRIC_EVENT_UNRESOLVED_TOTAL).increment(1);
                if self.debug {
                    warn!(
                        target = "purger::router",
                        event_kind = event.kind(),
                        context_type,
                        context_id = %context_id,
                        error = %err,
                        "Purge target could not be resolved"
                    );
                }
                return RouteReport::Unresolved(err.to_string());
            }
        };

        let outcome = self.dispatcher.dispatch(&target, host).await;
        if self.debug {
            debug!(
                target = "purger::router",
                event_kind = event.kind(),
                context_type,
                context_id = %context_id,
                success = outcome.success,
                "Event routed"
            );
        }
        RouteReport::Dispatched(outcome)
    }

    /// Route on a background task.
    ///
    /// Returns `None` when no runtime was captured and the calling thread is
    /// not inside one; the event is dropped.
    pub fn spawn(&self, event: MutationEvent, host: String) -> Option<JoinHandle<RouteReport>> {
        let Some(runtime) = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        else {
            counter!(METRIC_EVENT_DROPPED_TOTAL).increment(1);
            warn!(
                target = "purger::router",
                event_kind = event.kind(),
                "No async runtime available; purge dropped"
            );
            return None;
        };

        let router = self.clone();
        Some(runtime.spawn(async move { router.route(event, &host).await }))
    }

    /// Route every event received on `events` until the channel closes.
    ///
    /// Each event runs on its own task; in-flight purges are awaited before
    /// returning.
    pub async fn listen(self, mut events: mpsc::Receiver<HostEvent>) {
        let mut in_flight = JoinSet::new();

        while let Some(HostEvent { event, host }) = events.recv().await {
            let router = self.clone();
            in_flight.spawn(async move { router.route(event, &host).await });
            while in_flight.try_join_next().is_some() {}
        }

        let pending = in_flight.len();
        if pending > 0 {
            info!(
                target = "purger::router",
                pending, "Event channel closed; waiting for in-flight purges"
            );
        }
        while in_flight.join_next().await.is_some() {}
    }
}

impl LifecycleHooks for EventRouter {
    fn entity_saved(&self, host: &str, saved: EntitySaved) {
        let _ = self.spawn(saved.into(), host.to_string());
    }

    fn term_changed(&self, host: &str, changed: TermChanged) {
        let _ = self.spawn(changed.into(), host.to_string());
    }
}

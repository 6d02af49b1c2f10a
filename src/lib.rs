//! Cache purge dispatcher.
//!
//! Turns content lifecycle events and operator requests into invalidation
//! calls against a reverse-proxy cache's purge namespace.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod purge;

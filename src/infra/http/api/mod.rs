pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{Router, middleware as axum_middleware, routing::post};

use crate::infra::http::middleware::log_responses;

pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();

    Router::new()
        .route("/api/v1/nonces", post(handlers::issue_nonce))
        .route("/api/v1/purge-all", post(handlers::purge_all))
        .route("/api/v1/hooks/entity-saved", post(handlers::entity_saved))
        .route("/api/v1/hooks/term-changed", post(handlers::term_changed))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::operator_auth,
        ))
        .layer(axum_middleware::from_fn(log_responses))
}

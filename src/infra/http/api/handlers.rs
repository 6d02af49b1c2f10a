use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use purger_api_types::{
    EntitySavedPayload, HookAcceptedResponse, NonceResponse, PurgeAllRequest, PurgeAllResponse,
    TermActionParam, TermChangedPayload,
};
use tracing::info;

use crate::application::operators::OperatorPrincipal;
use crate::domain::events::{EntitySaved, EntityStatus, TermAction, TermChanged};
use crate::purge::LifecycleHooks;

use super::error::ApiError;
use super::state::ApiState;

pub async fn issue_nonce(
    State(state): State<ApiState>,
    Extension(principal): Extension<OperatorPrincipal>,
) -> Json<NonceResponse> {
    let issued = state.nonces.issue(&principal.name);
    Json(NonceResponse {
        nonce: issued.token,
        expires_at: issued.expires_at,
    })
}

pub async fn purge_all(
    State(state): State<ApiState>,
    Extension(principal): Extension<OperatorPrincipal>,
    headers: HeaderMap,
    payload: Result<Json<PurgeAllRequest>, JsonRejection>,
) -> Result<Json<PurgeAllResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let authorized = state
        .gate
        .authorize(principal.authorization(request.nonce))
        .await
        .map_err(|rejection| {
            ApiError::forbidden(rejection.outcome().message, rejection.as_label())
        })?;

    let host = state.resolve_host(None, &headers);
    let operator = authorized.caller().to_string();
    let outcome = authorized.purge_all(&host).await;

    if outcome.success {
        info!(
            target = "purger::http::purge_all",
            operator = %operator,
            host = %host,
            "Manual purge completed"
        );
        Ok(Json(PurgeAllResponse {
            ok: true,
            message: outcome.message,
        }))
    } else {
        Err(ApiError::bad_gateway(outcome.message))
    }
}

pub async fn entity_saved(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<EntitySavedPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<HookAcceptedResponse>), ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let host = state.resolve_host(payload.host.as_deref(), &headers);
    let saved = EntitySaved {
        entity_id: payload.entity_id,
        entity_type: payload.entity_type,
        status: EntityStatus::parse(&payload.status),
        canonical_path: payload.canonical_url,
        transient: payload.transient,
    };
    state.router.entity_saved(&host, saved);

    Ok(accepted())
}

pub async fn term_changed(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<TermChangedPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<HookAcceptedResponse>), ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let host = state.resolve_host(payload.host.as_deref(), &headers);
    let changed = TermChanged {
        term_id: payload.term_id,
        taxonomy: payload.taxonomy,
        action: term_action(payload.action),
        canonical_path: payload.canonical_url,
    };
    state.router.term_changed(&host, changed);

    Ok(accepted())
}

fn accepted() -> (StatusCode, Json<HookAcceptedResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(HookAcceptedResponse { accepted: true }),
    )
}

fn term_action(param: TermActionParam) -> TermAction {
    match param {
        TermActionParam::Create => TermAction::Create,
        TermActionParam::Edit => TermAction::Edit,
        TermActionParam::Delete => TermAction::Delete,
    }
}

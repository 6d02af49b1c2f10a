use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::error::ApiError;
use super::state::ApiState;

/// Authenticate the operator key from `Authorization: Bearer` or `x-api-key`.
pub async fn operator_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = extract_token(request.headers().get(header::AUTHORIZATION)).or_else(|| {
        request
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok().map(|s| s.to_string()))
    });

    let Some(token) = token else {
        return ApiError::unauthorized().into_response();
    };

    let principal = match state.operators.authenticate(&token) {
        Ok(principal) => principal,
        Err(err) => {
            debug!(
                target = "purger::http::auth",
                reason = %err,
                "operator authentication failed"
            );
            return ApiError::unauthorized().into_response();
        }
    };

    request.extensions_mut().insert(principal.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    response
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_required() {
        let value = HeaderValue::from_static("Bearer abc");
        assert_eq!(extract_token(Some(&value)).as_deref(), Some("abc"));

        let value = HeaderValue::from_static("Basic abc");
        assert!(extract_token(Some(&value)).is_none());
        assert!(extract_token(None).is_none());
    }
}

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use purger_api_types::PurgeAllResponse;

use crate::application::error::ErrorReport;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const BAD_GATEWAY: &str = "bad_gateway";
}

/// Operator API failure, rendered as `{"ok": false, "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            detail,
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::BAD_REQUEST,
            "Request could not be processed",
            Some(detail.into()),
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Operator key required",
            None,
        )
    }

    pub fn forbidden(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            message,
            Some(detail.into()),
        )
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, codes::BAD_GATEWAY, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report_detail = match self.detail.as_deref() {
            Some(detail) => format!("{}: {detail}", self.code),
            None => format!("{}: {}", self.code, self.message),
        };
        let body = PurgeAllResponse {
            ok: false,
            message: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::api", self.status, report_detail)
            .attach(&mut response);
        response
    }
}

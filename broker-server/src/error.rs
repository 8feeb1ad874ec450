//! Maps [`BrokerError`] onto HTTP responses, generalizing the teacher's
//! `ServerError -> IntoResponse` mapping (spec.md §7) across every kind
//! the shared error carries instead of one server-local enum.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use broker_core::BrokerError;

pub struct ApiError(pub BrokerError);

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BrokerError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            BrokerError::Forbidden(_) => StatusCode::FORBIDDEN,
            BrokerError::NotFound(_) => StatusCode::NOT_FOUND,
            BrokerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            BrokerError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BrokerError::UpstreamFailed(_) => StatusCode::BAD_GATEWAY,
            BrokerError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BrokerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
            "code": self.0.kind(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn unauthenticated_maps_to_401() {
        let resp = ApiError(BrokerError::Unauthenticated("no token".into())).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let resp = ApiError(BrokerError::Forbidden("missing scope".into())).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError(BrokerError::NotFound("no conversation".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upstream_failed_maps_to_502() {
        let resp = ApiError(BrokerError::UpstreamFailed("down".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}

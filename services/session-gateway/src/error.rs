//! Per-request error responses
//!
//! Every failure is rendered as `{"detail": "..."}` so clients written against
//! the previous gateway keep parsing errors the same way.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No usable `Authorization: Bearer` header.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Token unknown, expired, or past its logout grace window.
    #[error("Authorization expired.")]
    SessionExpired,

    /// The identity provider rejected the credentials.
    #[error("Not authorized.")]
    Unauthorized,

    /// Non-401 failure from the identity provider, passed through.
    #[error("{body}")]
    Upstream { status: u16, body: String },

    #[error("Identity provider unreachable.")]
    UpstreamUnreachable(String),

    #[error("Identity provider did not answer within {0}s.")]
    UpstreamTimeout(u64),

    #[error("{0}")]
    Validation(String),

    #[error("Session store unavailable.")]
    Store(String),

    #[error("User lookup failed.")]
    Directory(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotAuthenticated | ApiError::SessionExpired | ApiError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<identity::Error> for ApiError {
    fn from(err: identity::Error) -> Self {
        match err {
            identity::Error::Unauthorized => ApiError::Unauthorized,
            identity::Error::Upstream { status, body } => ApiError::Upstream { status, body },
            identity::Error::Unreachable(msg) => ApiError::UpstreamUnreachable(msg),
            identity::Error::Timeout(secs) => ApiError::UpstreamTimeout(secs),
            identity::Error::InvalidRequest(msg) => ApiError::Validation(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn upstream_rejection_renders_not_authorized() {
        let response = ApiError::from(identity::Error::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
        assert_eq!(body_json(response).await["detail"], "Not authorized.");
    }

    #[tokio::test]
    async fn upstream_failure_keeps_status_and_body() {
        let response = ApiError::from(identity::Error::Upstream {
            status: 503,
            body: "maintenance".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        assert_eq!(body_json(response).await["detail"], "maintenance");
    }

    #[test]
    fn invalid_upstream_status_becomes_bad_gateway() {
        let err = ApiError::Upstream {
            status: 1000,
            body: String::new(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn transport_failures_are_server_side() {
        assert_eq!(
            ApiError::from(identity::Error::Unreachable("refused".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(identity::Error::Timeout(10)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn session_errors_are_unauthorized() {
        assert_eq!(ApiError::NotAuthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::SessionExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::SessionExpired.to_string(), "Authorization expired.");
    }
}

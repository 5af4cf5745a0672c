//! Session guard
//!
//! Every protected handler takes a [`Session`] argument. Extraction reads the
//! bearer token, rejects it unless the token store knows it, and renews its
//! ttl before the handler body runs. A rejected request never reaches the
//! handler, so no downstream work (such as a datastore query) happens.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use session_store::{SESSION_TTL, TokenStore, fingerprint};
use tracing::{debug, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics;

/// A validated, freshly renewed bearer token.
#[derive(Debug, Clone)]
pub struct Session(pub String);

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let Some(token) = bearer_token(&parts.headers) else {
            metrics::record_session_rejection("missing_token");
            return Err(ApiError::NotAuthenticated);
        };
        authorize(state.store.as_ref(), token).await.map(Session)
    }
}

/// Gate a token: reject unless present in the store, otherwise renew it to
/// `SESSION_TTL` and hand it back unchanged.
pub async fn authorize(store: &dyn TokenStore, token: &str) -> Result<String, ApiError> {
    match store.exists(token).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(token = fingerprint(token), "rejecting unknown or expired session");
            metrics::record_session_rejection("expired");
            return Err(ApiError::SessionExpired);
        }
        Err(e) => {
            warn!(error = %e, backend = store.backend(), "session check failed");
            metrics::record_session_rejection("store_error");
            return Err(ApiError::Store(e.to_string()));
        }
    }

    // The token was just seen live; a failed renewal only shortens its life.
    if let Err(e) = store.renew(token, SESSION_TTL).await {
        warn!(token = fingerprint(token), error = %e, "session renewal failed");
    }
    Ok(token.to_owned())
}

/// Token from an `Authorization: Bearer <token>` header. The scheme is
/// case-insensitive; an empty token counts as missing.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use session_store::MemoryTokenStore;
    use std::time::Duration;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("bearer   abc123 ")), Some("abc123"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer   ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn never_registered_token_is_rejected() {
        let store = MemoryTokenStore::new();
        let long = "x".repeat(512);
        for token in ["abc123", "", "Bearer", long.as_str()] {
            let err = authorize(&store, token).await.unwrap_err();
            assert!(matches!(err, ApiError::SessionExpired), "{token:?}: {err:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn authorize_renews_ttl() {
        let store = MemoryTokenStore::new();
        store.register("abc123", SESSION_TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(authorize(&store, "abc123").await.unwrap(), "abc123");

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(authorize(&store, "abc123").await.is_ok());

        tokio::time::advance(SESSION_TTL).await;
        assert!(matches!(
            authorize(&store, "abc123").await,
            Err(ApiError::SessionExpired)
        ));
    }
}

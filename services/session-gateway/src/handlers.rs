//! HTTP endpoints
//!
//! Public:
//! - POST /token: OAuth2 password-grant form login
//! - POST /auth: JSON login, returns the identity provider payload
//! - POST /encode: base64 transport encoding of a plaintext string
//!
//! Behind the session guard:
//! - GET /: echo the presented token
//! - GET /users/{userId}: user record by login id
//! - GET /logout: expire the session after a short grace window

use axum::Json;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Form, Path, State};
use common::Secret;
use directory::UserRecord;
use identity::{Authenticated, LoginPair, encode_password};
use serde::Deserialize;
use serde_json::{Value, json};
use session_store::{LOGOUT_GRACE, fingerprint};
use tracing::{error, info, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::guard::Session;
use crate::metrics;

/// OAuth2 password-grant form. Other standard fields (`grant_type`, `scope`,
/// `client_id`, `client_secret`) are accepted and ignored.
#[derive(Deserialize)]
pub struct TokenForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct EncodeText {
    plaintext: String,
}

/// GET /: liveness check that only answers with a valid session.
pub async fn root(Session(token): Session) -> Json<Value> {
    Json(json!({
        "message": "session-gateway",
        "token": token,
    }))
}

/// POST /token: encode the form password, log in, and answer in OAuth2
/// token-response shape. Falls back to the raw upstream payload when it has
/// no `access_token`.
pub async fn issue_token(
    State(state): State<AppState>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Json<Value>, ApiError> {
    let Form(form) = form.map_err(|e| ApiError::Validation(e.body_text()))?;
    let plaintext = Secret::new(form.password);
    let pair = LoginPair::new(form.username, encode_password(plaintext.expose()))?;

    let outcome = login(&state, &pair).await?;
    let body = match outcome.response.access_token() {
        Some(token) => json!({ "access_token": token, "token_type": "bearer" }),
        None => outcome.response.into_value(),
    };
    Ok(Json(body))
}

/// POST /auth: log in with `{email, password}` and return the identity
/// provider payload verbatim (after sanitization).
pub async fn authenticate(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let pair = LoginPair::new(body.email, body.password)?;

    let outcome = login(&state, &pair).await?;
    Ok(Json(outcome.response.into_value()))
}

/// POST /encode: the transport encoding applied to passwords by /token.
pub async fn encode(
    body: Result<Json<EncodeText>, JsonRejection>,
) -> Result<Json<String>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    Ok(Json(encode_password(&body.plaintext)))
}

/// GET /users/{userId}: single user record, or `null` when none matches.
pub async fn lookup_user(
    State(state): State<AppState>,
    Session(_token): Session,
    Path(user_id): Path<String>,
) -> Result<Json<Option<UserRecord>>, ApiError> {
    let record = state
        .directory
        .find_by_login_id(&user_id)
        .await
        .map_err(|e| {
            error!(login_id = %user_id, backend = state.directory.backend(), error = %e, "user lookup failed");
            ApiError::Directory(e.to_string())
        })?;
    Ok(Json(record))
}

/// GET /logout: the token keeps validating for `LOGOUT_GRACE` so duplicate
/// in-flight requests still succeed, then it is gone.
pub async fn logout(
    State(state): State<AppState>,
    Session(token): Session,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .expire_now(&token, LOGOUT_GRACE)
        .await
        .map_err(|e| {
            warn!(token = fingerprint(&token), error = %e, "logout failed");
            ApiError::Store(e.to_string())
        })?;
    info!(token = fingerprint(&token), "session logged out");
    Ok(Json(json!({ "logout": "Success" })))
}

/// Run the upstream exchange and count its degraded and failed outcomes.
async fn login(state: &AppState, pair: &LoginPair) -> Result<Authenticated, ApiError> {
    match state.authenticator.authenticate(pair).await {
        Ok(outcome) => {
            if let Some(reason) = outcome.registration.failure_reason() {
                metrics::record_registration_failure(reason);
            }
            Ok(outcome)
        }
        Err(e) => {
            let error_type = match &e {
                identity::Error::Unauthorized => "unauthorized",
                identity::Error::Upstream { .. } => "status",
                identity::Error::Unreachable(_) => "unreachable",
                identity::Error::Timeout(_) => "timeout",
                identity::Error::InvalidRequest(_) => "invalid_request",
            };
            metrics::record_upstream_error(error_type);
            warn!(email = %pair.email, error = %e, "login failed");
            Err(e.into())
        }
    }
}

//! Identity provider login exchange
//!
//! Posts the login pair to `{base_url}/auth/login` and interprets the answer.
//! Success is decided by HTTP status alone: a 2xx whose body is not valid JSON
//! still succeeds with an empty payload, and missing fields surface as absent
//! values rather than errors.

use std::io;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::login::LoginPair;

/// Payload returned by the identity provider on a successful login.
///
/// Passed through to the client as-is (after sanitization), including any
/// fields this service does not interpret such as `admin_profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthResponse(Value);

impl AuthResponse {
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    /// The session token, when the payload carries one as a string.
    pub fn access_token(&self) -> Option<&str> {
        self.0.get("access_token").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// HTTP client for the identity provider's login endpoint.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    login_url: String,
    timeout: Duration,
}

impl IdentityClient {
    pub fn new(http: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            login_url: format!("{}/auth/login", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    /// Exchange a login pair for the provider's auth payload.
    ///
    /// - 2xx: payload parsed and sanitized
    /// - 401: `Error::Unauthorized`, never retried
    /// - other status: `Error::Upstream` with status and body
    /// - transport failure: `Error::Unreachable` / `Error::Timeout`
    #[instrument(skip_all, fields(email = %pair.email))]
    pub async fn login(&self, pair: &LoginPair) -> Result<AuthResponse> {
        let started = Instant::now();
        let response = self
            .http
            .post(&self.login_url)
            .json(pair)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "identity provider answered"
        );

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let payload = match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "identity provider returned 2xx with a non-JSON body");
                Value::Object(Map::new())
            }
        };

        Ok(AuthResponse(sanitize_payload(payload)))
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout.as_secs())
        } else {
            Error::Unreachable(err.to_string())
        }
    }
}

/// Strip non-ASCII characters from the serialized payload.
///
/// Serialization escapes every non-ASCII character as `\uXXXX` first, so
/// string content survives unchanged and only bytes that could not be escaped
/// are dropped. The original value is kept if the result is not valid JSON.
pub fn sanitize_payload(payload: Value) -> Value {
    let Some(serialized) = ascii_json(&payload) else {
        return payload;
    };
    let ascii: Vec<u8> = serialized.into_iter().filter(u8::is_ascii).collect();
    serde_json::from_slice(&ascii).unwrap_or(payload)
}

/// Serialize `value` as JSON using only ASCII output.
fn ascii_json(value: &Value) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, AsciiEscaper);
    value.serialize(&mut serializer).ok()?;
    Some(buf)
}

/// Compact formatter that writes non-ASCII string content as UTF-16 escapes.
struct AsciiEscaper;

impl Formatter for AsciiEscaper {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

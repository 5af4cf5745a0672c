//! Login pair sent to the identity provider

use common::Secret;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Email and (already encoded) password for a single login exchange.
/// Never persisted; the password is wiped when the pair is dropped.
#[derive(Debug, Clone)]
pub struct LoginPair {
    pub email: String,
    pub password: Secret<String>,
}

impl LoginPair {
    /// Build a pair, rejecting addresses that are obviously not emails.
    pub fn new(email: impl Into<String>, password: impl Into<Secret<String>>) -> Result<Self> {
        let email = email.into();
        validate_email(&email)?;
        Ok(Self {
            email,
            password: password.into(),
        })
    }
}

/// Upstream body shape: `{"email": ..., "password": ...}`.
impl Serialize for LoginPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("LoginPair", 2)?;
        s.serialize_field("email", &self.email)?;
        s.serialize_field("password", self.password.expose())?;
        s.end()
    }
}

/// Minimal structural email check: exactly one `@`, a non-empty local part,
/// a dotted domain and no whitespace.
///
/// Looser than full RFC 5322 address validation: label syntax is not checked,
/// so `a@-b.com` passes. The identity provider remains the authority on
/// whether an address exists.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = |reason: &str| -> Result<()> { Err(Error::InvalidRequest(format!("email {reason}"))) };

    if email.chars().any(char::is_whitespace) {
        return invalid("must not contain whitespace");
    }
    let Some((local, domain)) = email.split_once('@') else {
        return invalid("must contain '@'");
    };
    if local.is_empty() {
        return invalid("local part is empty");
    }
    if domain.contains('@') {
        return invalid("must contain a single '@'");
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return invalid("domain must be a dotted host name");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_label_syntax_is_left_to_the_provider() {
        assert!(validate_email("a@-b.com").is_ok());
        assert!(validate_email("a@b_c.com").is_ok());
    }

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.org").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "plain", "@b.com", "a@", "a@b", "a@b..com", "a@@b.com", "a b@c.com"] {
            assert!(validate_email(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn serializes_to_upstream_shape() {
        let pair = LoginPair::new("a@b.com", "c2VjcmV0").unwrap();
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json, serde_json::json!({"email": "a@b.com", "password": "c2VjcmV0"}));
    }

    #[test]
    fn debug_hides_password() {
        let pair = LoginPair::new("a@b.com", "c2VjcmV0").unwrap();
        let debug = format!("{pair:?}");
        assert!(!debug.contains("c2VjcmV0"), "got: {debug}");
        assert!(debug.contains("a@b.com"));
    }
}

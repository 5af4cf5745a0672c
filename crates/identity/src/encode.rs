//! Password transport encoding
//!
//! The identity provider expects the password field base64-encoded. This is a
//! reversible, keyless transformation that anyone can decode; it keeps the
//! value alphabet-safe in transit and provides no confidentiality. Plaintext
//! must only ever travel over TLS.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encode a plaintext password with standard (padded) base64.
pub fn encode_password(plaintext: &str) -> String {
    STANDARD.encode(plaintext.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_password(encoded: &str) -> Option<String> {
        let bytes = STANDARD.decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }

    #[test]
    fn encodes_known_value() {
        assert_eq!(encode_password("secret"), "c2VjcmV0");
        assert_eq!(encode_password("pass"), "cGFzcw==");
        assert_eq!(encode_password(""), "");
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode_password("hunter2"), encode_password("hunter2"));
    }

    #[test]
    fn decoding_reverses_encoding_for_printable_ascii() {
        let printable: String = (0x20u8..0x7f).map(char::from).collect();
        for plaintext in ["a", "secret", "p@ss:w/rd+=", printable.as_str()] {
            let encoded = encode_password(plaintext);
            assert_eq!(decode_password(&encoded).as_deref(), Some(plaintext));
        }
    }

    #[test]
    fn output_uses_standard_alphabet() {
        let encoded = encode_password("\u{7f}~~~>>>???");
        assert!(
            encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='),
            "unexpected character in {encoded}"
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(decode_password("not base64!"), None);
    }
}

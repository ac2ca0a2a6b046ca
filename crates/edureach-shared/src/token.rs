//! Session token decoding.
//!
//! Only the payload segment of the JWT is read; signature verification is the
//! server's job. The client needs the claims to know whether a stored token
//! is still worth sending.

use chrono::Utc;
use serde::Deserialize;

use crate::error::DecodeFault;

/// Claims the client cares about. Unknown claims are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Claims {
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn decode_claims(token: &str) -> Result<Claims, DecodeFault> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => {
            return Err(DecodeFault::Token(
                "expected three dot-separated segments".to_string(),
            ))
        }
    };

    let bytes = base64_url_decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn base64_url_decode(s: &str) -> Result<Vec<u8>, DecodeFault> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    Ok(URL_SAFE_NO_PAD.decode(s.trim_end_matches('='))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn make_token(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn decodes_claims() {
        let token = make_token(r#"{"exp":4102444800,"sub":"42","role":"student"}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.role.as_deref(), Some("student"));
        assert!(!claims.is_expired());
    }

    #[test]
    fn expired_token() {
        let token = make_token(r#"{"exp":1000}"#);
        assert!(decode_claims(&token).unwrap().is_expired());
    }

    #[test]
    fn malformed_tokens_are_decode_faults() {
        assert!(matches!(decode_claims("abc"), Err(DecodeFault::Token(_))));
        assert!(matches!(
            decode_claims("a.!!!.c"),
            Err(DecodeFault::Base64(_))
        ));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("nope"));
        assert!(matches!(decode_claims(&not_json), Err(DecodeFault::Json(_))));
    }
}

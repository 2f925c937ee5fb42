//! VAPID signing context (RFC 8292).
//!
//! Push services authenticate the application server through a short-lived
//! ES256 JWT whose audience is the push endpoint's origin. The signing key
//! is loaded once at startup and the context injected into the transport.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::error::{NotificationError, Result};

/// Token lifetime. VAPID caps tokens at 24 hours; staying well under keeps
/// clock skew harmless.
const TOKEN_TTL_HOURS: i64 = 12;

#[derive(Debug, Serialize)]
struct VapidClaims {
    aud: String,
    exp: i64,
    sub: String,
}

/// Holds the application server's P-256 key and produces Authorization
/// header values for push requests.
pub struct VapidSigner {
    encoding_key: EncodingKey,
    public_key: String,
    subject: String,
}

impl VapidSigner {
    /// Build the signer from a PEM-encoded EC private key and the
    /// base64url-encoded public key advertised to browsers.
    pub fn new(private_key_pem: &str, public_key: &str, subject: &str) -> Result<Self> {
        let encoding_key = EncodingKey::from_ec_pem(private_key_pem.as_bytes()).map_err(|e| {
            NotificationError::Configuration(format!("invalid VAPID private key: {}", e))
        })?;

        Ok(Self {
            encoding_key,
            public_key: public_key.to_string(),
            subject: subject.to_string(),
        })
    }

    /// Authorization header value for a delivery to `endpoint`:
    /// `vapid t=<jwt>, k=<public key>`.
    pub fn authorization(&self, endpoint: &str) -> Result<String> {
        let audience = endpoint_origin(endpoint)?;

        let claims = VapidClaims {
            aud: audience,
            exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            sub: self.subject.clone(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::ES256), &claims, &self.encoding_key)
            .map_err(|e| {
                NotificationError::Configuration(format!("VAPID token signing failed: {}", e))
            })?;

        Ok(format!("vapid t={}, k={}", token, self.public_key))
    }
}

/// Scheme + authority of a push endpoint URL, the JWT audience.
fn endpoint_origin(endpoint: &str) -> Result<String> {
    let scheme_end = endpoint.find("://").ok_or_else(|| {
        NotificationError::Configuration(format!("push endpoint is not a URL: {}", endpoint))
    })?;

    let authority_start = scheme_end + 3;
    let authority_end = endpoint[authority_start..]
        .find('/')
        .map(|i| authority_start + i)
        .unwrap_or(endpoint.len());

    if authority_end == authority_start {
        return Err(NotificationError::Configuration(format!(
            "push endpoint has no host: {}",
            endpoint
        )));
    }

    Ok(endpoint[..authority_end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_origin() {
        assert_eq!(
            endpoint_origin("https://fcm.googleapis.com/fcm/send/abc123").unwrap(),
            "https://fcm.googleapis.com"
        );
        assert_eq!(
            endpoint_origin("https://updates.push.services.mozilla.com:443/wpush/v2/x").unwrap(),
            "https://updates.push.services.mozilla.com:443"
        );
        assert_eq!(
            endpoint_origin("https://push.example.com").unwrap(),
            "https://push.example.com"
        );
    }

    #[test]
    fn test_endpoint_origin_rejects_garbage() {
        assert!(endpoint_origin("not a url").is_err());
        assert!(endpoint_origin("https:///path-only").is_err());
    }

    #[test]
    fn test_signer_rejects_bad_key() {
        assert!(VapidSigner::new("not a pem", "pubkey", "mailto:push@fete.events").is_err());
    }
}

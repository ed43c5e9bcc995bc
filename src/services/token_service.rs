//! HMAC auth tokens.
//!
//! Token = `base64url(payload_json) + "." + hex(HMAC-SHA256(secret, payload_json))`
//! where the payload carries the agent/session claims and validity window.
//! Verification recomputes the MAC and compares in constant time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::errors::{DomainError, DomainResult};

type HmacSha256 = Hmac<Sha256>;

/// Default token validity: one hour.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Claims embedded in a token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Mints and validates HMAC-SHA256 auth tokens.
pub struct TokenService {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Mint a token for the given identity.
    pub fn issue(&self, agent_id: &str, session_id: Option<&str>) -> DomainResult<String> {
        validate_agent_id(agent_id)?;
        if let Some(session_id) = session_id {
            validate_session_id(session_id)?;
        }

        let now = Utc::now();
        let claims = TokenClaims {
            agent_id: agent_id.to_string(),
            session_id: session_id.map(String::from),
            issued_at: now.timestamp(),
            expires_at: (now + self.ttl).timestamp(),
        };

        let payload = serde_json::to_string(&claims)?;
        let signature = self.sign(payload.as_bytes())?;
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            hex_encode(&signature)
        ))
    }

    /// Validate a token and return its claims.
    pub fn verify(&self, token: &str) -> DomainResult<TokenClaims> {
        self.verify_at(token, Utc::now())
    }

    /// Validation with an explicit clock, for expiry boundary tests.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> DomainResult<TokenClaims> {
        let (encoded_payload, signature_hex) = token
            .split_once('.')
            .ok_or_else(|| DomainError::Unauthorized("malformed token".into()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded_payload)
            .map_err(|_| DomainError::Unauthorized("malformed token payload".into()))?;

        let expected = self.sign(&payload)?;
        let provided = hex_decode(signature_hex)
            .ok_or_else(|| DomainError::Unauthorized("malformed token signature".into()))?;

        if !bool::from(provided.ct_eq(&expected)) {
            return Err(DomainError::Unauthorized("invalid token signature".into()));
        }

        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|_| DomainError::Unauthorized("malformed token claims".into()))?;

        if claims.expires_at <= now.timestamp() {
            return Err(DomainError::Unauthorized("token expired".into()));
        }
        validate_agent_id(&claims.agent_id)?;
        if let Some(session_id) = &claims.session_id {
            validate_session_id(session_id)?;
        }

        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> DomainResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| DomainError::Internal(format!("bad HMAC key: {e}")))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// `^[A-Za-z0-9_-]{1,64}$`
pub fn validate_agent_id(agent_id: &str) -> DomainResult<()> {
    if is_identifier(agent_id, 64) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "agent_id",
            "must match ^[A-Za-z0-9_-]{1,64}$",
        ))
    }
}

/// `^[A-Za-z0-9_-]{1,128}$`
pub fn validate_session_id(session_id: &str) -> DomainResult<()> {
    if is_identifier(session_id, 128) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "session_id",
            "must match ^[A-Za-z0-9_-]{1,128}$",
        ))
    }
}

fn is_identifier(s: &str, max_len: usize) -> bool {
    !s.is_empty()
        && s.len() <= max_len
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", DEFAULT_TOKEN_TTL_SECS)
    }

    #[test]
    fn issue_then_verify_round_trips_claims() {
        let service = service();
        let token = service.issue("agent-1", Some("session-1")).unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.agent_id, "agent-1");
        assert_eq!(claims.session_id.as_deref(), Some("session-1"));
        assert_eq!(claims.expires_at - claims.issued_at, 3600);
    }

    #[test]
    fn expired_token_rejected() {
        let service = service();
        let token = service.issue("agent-1", None).unwrap();
        let past_expiry = Utc::now() + Duration::seconds(3601);
        assert!(matches!(
            service.verify_at(&token, past_expiry),
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_valid_just_before_expiry() {
        let service = service();
        let token = service.issue("agent-1", None).unwrap();
        let just_before = Utc::now() + Duration::seconds(3598);
        assert!(service.verify_at(&token, just_before).is_ok());
    }

    #[test]
    fn tampered_payload_rejected() {
        let service = service();
        let token = service.issue("agent-1", None).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&TokenClaims {
                agent_id: "agent-2".into(),
                session_id: None,
                issued_at: 0,
                expires_at: i64::MAX,
            })
            .unwrap(),
        );
        let forged = format!("{forged_payload}.{signature}");
        assert!(service.verify(&forged).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = service().issue("agent-1", None).unwrap();
        let other = TokenService::new("other-secret", DEFAULT_TOKEN_TTL_SECS);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn malformed_tokens_rejected() {
        let service = service();
        assert!(service.verify("").is_err());
        assert!(service.verify("nodot").is_err());
        assert!(service.verify("a.b.c").is_err());
        assert!(service.verify("a.b").is_err());
        assert!(service.verify("!!!.beef").is_err());
    }

    #[test]
    fn identifier_patterns_enforced() {
        assert!(validate_agent_id("agent_1-A").is_ok());
        assert!(validate_agent_id("").is_err());
        assert!(validate_agent_id("has space").is_err());
        assert!(validate_agent_id(&"a".repeat(65)).is_err());
        assert!(validate_session_id(&"s".repeat(128)).is_ok());
        assert!(validate_session_id(&"s".repeat(129)).is_err());
    }
}

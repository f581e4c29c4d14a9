use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Header segment shared by every token this service issues.
///
/// The bytes are fixed so the first segment is identical across tokens and
/// matches what existing browser clients already receive.
pub const TOKEN_HEADER: &str = r#"{"typ":"JWT","alg":"HS256"}"#;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a token could not be issued or accepted.
///
/// The variants exist for logging only. Callers facing a client must collapse
/// every per-request variant into one "unauthenticated" answer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("signing secret is not configured")]
    MissingSecret,
}

impl TokenError {
    /// Short stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::MissingSecret => "missing_secret",
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Issues and verifies HMAC-SHA256 signed bearer tokens.
///
/// The secret is handed in once at construction and never changes for the
/// lifetime of the value. All methods take `&self` and touch no shared
/// mutable state, so one instance behind an `Arc` serves every connection.
#[derive(Clone)]
pub struct TokenService {
    mac: HmacSha256,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TokenService {
    /// Build a service around `secret`. An empty secret is a configuration
    /// error and is rejected with [`TokenError::MissingSecret`].
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let mac = HmacSha256::new_from_slice(&secret).map_err(|_| TokenError::MissingSecret)?;
        Ok(Self { mac })
    }

    /// Sign `claims` and return `header.claims.signature`.
    ///
    /// Fails only when `claims` cannot be represented as JSON.
    pub fn issue<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;

        let header_b64 = URL_SAFE_NO_PAD.encode(TOKEN_HEADER.as_bytes());
        let claims_b64 = URL_SAFE_NO_PAD.encode(payload);
        let signing_input = format!("{}.{}", header_b64, claims_b64);

        let signature = self.sign(signing_input.as_bytes());

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify `token` against the system clock.
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify `token` as if the current time were `now` (unix seconds).
    ///
    /// Checks run in a fixed order: segment count, signature, payload
    /// decoding, expiry. A token is accepted while `exp > now`; a token
    /// without an `exp` claim never expires.
    pub fn verify_at<C: DeserializeOwned>(&self, token: &str, now: i64) -> Result<C, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            debug!("Token rejected: {} segments", parts.len());
            return Err(TokenError::Malformed);
        }

        let (header_b64, claims_b64, signature_b64) = (parts[0], parts[1], parts[2]);

        let provided = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::BadSignature)?;

        let signing_input = format!("{}.{}", header_b64, claims_b64);
        let expected = self.sign(signing_input.as_bytes());

        if provided.len() != expected.len() || !constant_time_eq(&provided, &expected) {
            return Err(TokenError::BadSignature);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::Malformed)?;

        let claims: Value = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        let object = claims.as_object().ok_or(TokenError::Malformed)?;

        if let Some(exp) = object.get("exp") {
            let exp = exp.as_i64().ok_or(TokenError::Malformed)?;
            if exp <= now {
                return Err(TokenError::Expired);
            }
        }

        serde_json::from_value(claims).map_err(|_| TokenError::Malformed)
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Current wall-clock time in unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

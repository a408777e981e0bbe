//! Per-backend authentication schemes.
//!
//! Each backend produces its current `Authorization` header through one
//! operation. Static schemes return a fixed value; the signed-token scheme
//! computes a short-lived HS256 token from a key pair, so it is recomputed per
//! create call. A single poll loop reuses the header captured at creation.

use crate::error::GenerationError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

/// Signed tokens are valid for 30 minutes.
const TOKEN_VALIDITY_SECS: u64 = 1_800;

/// Tolerance for clock skew: tokens are valid from 5 seconds in the past.
const TOKEN_NEGATIVE_SKEW_SECS: u64 = 5;

/// Authentication scheme for one backend.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// Static `Authorization: Bearer <key>`.
    Bearer { key: String },
    /// Static `Authorization: Key <key>` (fal-style).
    Key { key: String },
    /// Short-lived HS256 token signed from an access/secret key pair.
    SignedToken {
        access_key: String,
        secret_key: String,
    },
}

impl AuthScheme {
    /// Produce the current `Authorization` header value.
    pub fn header_value(&self) -> Result<String, GenerationError> {
        match self {
            AuthScheme::Bearer { key } => Ok(format!("Bearer {key}")),
            AuthScheme::Key { key } => Ok(format!("Key {key}")),
            AuthScheme::SignedToken {
                access_key,
                secret_key,
            } => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| GenerationError::Auth(format!("system clock error: {e}")))?
                    .as_secs();
                Ok(format!(
                    "Bearer {}",
                    sign_token(access_key, secret_key, now)?
                ))
            }
        }
    }
}

/// Compute an HS256 token for `access_key` at unix time `now`.
///
/// Split out from `header_value` so token contents are testable against a
/// fixed clock.
pub(crate) fn sign_token(
    access_key: &str,
    secret_key: &str,
    now: u64,
) -> Result<String, GenerationError> {
    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let claims = json!({
        "iss": access_key,
        "exp": now + TOKEN_VALIDITY_SECS,
        "nbf": now.saturating_sub(TOKEN_NEGATIVE_SKEW_SECS),
    });

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .map_err(|e| GenerationError::Auth(format!("invalid secret key: {e}")))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

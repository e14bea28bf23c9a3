//! JWT Claims Decoding
//!
//! The client never verifies signatures; it only reads the payload segment
//! to learn when the access token expires. Any decode failure means the
//! token is treated as invalid.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::Utc;
use serde::{Deserialize, Serialize};

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims the client cares about
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenClaims {
    /// Token expiration timestamp (epoch seconds, may be fractional)
    pub exp: f64,
    /// Subject, usually the user id
    #[serde(default)]
    pub sub: Option<String>,
    /// Issued at timestamp
    #[serde(default)]
    pub iat: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),
    #[error("token payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token payload is not a claims object: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("token payload is not a JSON object")]
    NotAnObject,
}

/// Decode the payload segment without verifying the signature
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::SegmentCount(segments.len()));
    }
    let payload = PAYLOAD_ENGINE.decode(segments[1])?;
    let value: serde_json::Value = serde_json::from_slice(&payload)?;
    if !value.is_object() {
        return Err(TokenError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}

/// Whole seconds until expiry at `now`, or `None` when undecodable.
/// Saturates at the `i64` bounds.
pub fn seconds_until_expiry(token: &str, now: i64) -> Option<i64> {
    decode_claims(token)
        .ok()
        .map(|claims| (claims.exp - now as f64).floor() as i64)
}

/// Whether `token` is decodable and unexpired at `now` (epoch seconds)
pub fn is_token_valid_at(token: &str, now: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.exp > now as f64,
        Err(e) => {
            tracing::debug!("[jwt] treating token as invalid: {}", e);
            false
        }
    }
}

/// Whether `token` is decodable and unexpired right now
pub fn is_token_valid(token: &str) -> bool {
    is_token_valid_at(token, Utc::now().timestamp())
}

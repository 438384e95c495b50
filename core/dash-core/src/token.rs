//! Bearer token decoding.
//!
//! Tokens arrive from the identity provider as compact JWTs
//! (`header.payload.signature`). The dashboard only needs the payload for
//! display, so the signature is never checked here: the backend verifies the
//! token on every API call, and transport security is the network layer's job.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Claims carried in a bearer token.
///
/// Passthrough data: nothing here is validated, the accessors only save callers
/// from digging through the JSON map for the common OIDC fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserClaims(Map<String, Value>);

impl UserClaims {
    pub fn from_map(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_claim(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    pub fn name(&self) -> Option<&str> {
        self.str_claim("name")
    }

    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    pub fn picture(&self) -> Option<&str> {
        self.str_claim("picture")
    }

    /// `exp` claim as a timestamp. Accepts integer or fractional seconds.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.0.get("exp")?;
        let secs = exp
            .as_i64()
            .or_else(|| exp.as_f64().map(|value| value.trunc() as i64))?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Name to show in the UI: `name`, then `email`, then `sub`.
    pub fn display_name(&self) -> Option<&str> {
        self.name()
            .or_else(|| self.email())
            .or_else(|| self.subject())
    }
}

/// Decodes the payload segment of a JWT into claims.
///
/// Fails when the token is not three dot-separated segments or the payload is
/// not base64url-encoded JSON object data. Padding on the payload is tolerated.
pub fn decode(token: &str) -> Result<UserClaims, DecodeError> {
    if token.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::SegmentCount {
            found: segments.len(),
        });
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|source| DecodeError::Base64 { source })?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|source| DecodeError::Json { source })?;

    match value {
        Value::Object(claims) => Ok(UserClaims(claims)),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Builds an unsigned token around `claims`, for tests across the crate.
#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

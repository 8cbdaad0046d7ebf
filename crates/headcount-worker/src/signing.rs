//! HMAC-SHA256 event signatures.
//!
//! The signature covers the canonical JSON form of the event without its
//! `sig` field: keys sorted at every level, no insignificant whitespace.
//! Receivers rebuild the same bytes from the payload they got and compare.

use headcount_models::{Event, SignedEvent};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::SigningError;

type HmacSha256 = Hmac<Sha256>;

/// Canonical bytes of the unsigned payload.
pub fn canonical_bytes(event: &Event) -> Result<Vec<u8>, SigningError> {
    Ok(serde_json::to_vec(&event.unsigned_payload()?)?)
}

fn value_bytes(value: &Value) -> Result<Vec<u8>, SigningError> {
    Ok(serde_json::to_vec(value)?)
}

/// Lower-case hex HMAC of `bytes`; empty without a secret.
pub fn sign_bytes(bytes: &[u8], secret: Option<&str>) -> Result<String, SigningError> {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(String::new()),
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(bytes);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn sign(event: &Event, secret: Option<&str>) -> Result<String, SigningError> {
    sign_bytes(&canonical_bytes(event)?, secret)
}

/// Sign and attach the signature, producing the wire form.
pub fn sign_event(event: Event, secret: Option<&str>) -> Result<SignedEvent, SigningError> {
    let sig = sign(&event, secret)?;
    Ok(event.into_signed(sig)?)
}

/// Check a received event against `secret` in constant time.
///
/// Unsigned events never verify.
pub fn verify(signed: &SignedEvent, secret: &str) -> Result<bool, SigningError> {
    let expected = match hex::decode(&signed.sig) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => return Ok(false),
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(&value_bytes(&signed.unsigned_payload())?);
    Ok(mac.verify_slice(&expected).is_ok())
}

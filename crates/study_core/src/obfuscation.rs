//! Reversible at-rest obfuscation for the persisted resource blob.
//!
//! This is NOT encryption. Anyone holding the blob can decode it; the transform
//! only keeps the content from being readable at a glance. Deployments that need
//! confidentiality should put an authenticated cipher behind these two functions.
//!
//! Format: `obf1:` followed by the standard base64 of the UTF-8 JSON, with the
//! base64 characters in reverse order.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Serialize};

pub const MARKER: &str = "obf1:";

pub fn encode<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(data)?;
    let reversed: String = STANDARD.encode(json.as_bytes()).chars().rev().collect();
    Ok(format!("{MARKER}{reversed}"))
}

/// Returns `None` for anything that is not a well-formed blob.
pub fn decode<T: DeserializeOwned>(blob: &str) -> Option<T> {
    let body = blob.strip_prefix(MARKER)?;
    let forward: String = body.chars().rev().collect();
    let bytes = STANDARD.decode(forward).ok()?;
    let json = String::from_utf8(bytes).ok()?;
    serde_json::from_str(&json).ok()
}

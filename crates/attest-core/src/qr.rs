use crate::error::{AttestationError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrKind {
    Attestation,
    EasAttestation,
    #[serde(other)]
    Other,
}

/// A scanned QR code or deep link, already classified by the scanner.
///
/// For `Attestation` the `function_detail` holds the raw legacy attestation
/// and `address` the token contract. For `EasAttestation` the
/// `function_detail` holds the attestation JSON and `address` the origin link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResult {
    #[serde(rename = "type")]
    pub kind: QrKind,
    pub chain_id: u64,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub function_detail: String,
}

impl QrResult {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AttestationError::InvalidPayload(format!("qr json: {e}")))
    }
}

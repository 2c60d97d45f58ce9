//! Lenient parsing of the hex / base64 strings that arrive inside scanned
//! attestation payloads.

use crate::error::{AttestationError, Result};
use alloy::primitives::{Address, B256};
use base64::{engine::general_purpose, Engine as _};

/// Decode a hex string with or without `0x`. Odd lengths are left-padded.
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        padded.as_str()
    } else {
        digits
    };
    hex::decode(digits).map_err(|e| AttestationError::InvalidPayload(format!("hex: {e}")))
}

/// Scanned payload bytes: `0x` hex, otherwise base64 (standard or URL safe).
/// Unprefixed input is never read as hex, since base64 text can consist of
/// hex digits only.
pub fn decode_payload(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return decode_hex(trimmed);
    }
    general_purpose::STANDARD
        .decode(trimmed)
        .or_else(|_| general_purpose::URL_SAFE.decode(trimmed))
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(trimmed))
        .map_err(|e| AttestationError::InvalidPayload(format!("base64: {e}")))
}

/// Parse a 32-byte word the way a big integer would be read: `"0"`, empty and
/// short values are zero-extended on the left.
pub fn parse_word(value: &str) -> Result<B256> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return Ok(B256::ZERO);
    }
    let bytes = decode_hex(trimmed)?;
    if bytes.len() > 32 {
        return Err(AttestationError::InvalidPayload(format!(
            "word longer than 32 bytes: {trimmed}"
        )));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(B256::from(word))
}

/// `"0"` stands for the zero address in scanned payloads.
pub fn parse_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return Ok(Address::ZERO);
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| AttestationError::InvalidPayload(format!("address {trimmed}: {e}")))
}

pub fn hex_prefixed(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

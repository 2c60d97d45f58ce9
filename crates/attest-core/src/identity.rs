//! Content-derived identifiers used to group and deduplicate attestations.

use crate::abi::DecodedField;
use crate::encoding::hex_prefixed;
use alloy::primitives::{keccak256, B256};

fn strip_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Collection an attestation belongs to: the signer, its schema and every
/// claim field (script locations excluded), hashed together.
pub fn provisional_collection_id(signer: &str, schema_uid: &B256, fields: &[DecodedField]) -> String {
    let mut preimage = strip_prefix(signer.trim()).to_lowercase();
    preimage.push_str(&hex_prefixed(schema_uid));
    for field in fields.iter().filter(|f| !f.is_uri()) {
        preimage.push_str(&field.value.as_text());
    }
    hex_prefixed(keccak256(preimage.as_bytes()))
}

/// Per-holder uid: hash of the non-URI, non-bytes field values joined by `-`.
/// Commitments and script locations may change without changing identity.
pub fn attestation_uid(fields: &[DecodedField]) -> String {
    let joined = fields
        .iter()
        .filter(|f| !f.is_uri() && !f.value.is_bytes())
        .map(|f| f.value.as_text())
        .collect::<Vec<_>>()
        .join("-");
    hex::encode(keccak256(joined.as_bytes()))
}

pub fn identifier_hash(chain_id: u64, collection_id: &str, attestation_uid: &str) -> String {
    let preimage = format!(
        "{}{}{}",
        chain_id,
        strip_prefix(collection_id).to_lowercase(),
        attestation_uid
    );
    hex_prefixed(keccak256(preimage.as_bytes()))
}

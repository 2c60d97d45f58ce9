use crate::eas::EasAttestation;
use crate::encoding::hex_prefixed;
use crate::error::{AttestationError, Result};
use alloy::primitives::{Address, Signature};
use tracing::warn;

/// Recover the address that produced the attestation's EIP-712 signature.
pub fn recover_signer(att: &EasAttestation) -> Result<Address> {
    let hash = att.signing_hash()?;
    let raw = att.signature_bytes()?;
    let signature = Signature::from_raw(&raw)
        .map_err(|e| AttestationError::SignatureRecovery(e.to_string()))?;
    signature
        .recover_address_from_prehash(&hash)
        .map_err(|e| AttestationError::SignatureRecovery(e.to_string()))
}

/// Lowercase `0x` address of the signer, or an empty string when recovery
/// fails. An empty signer never matches any issuer.
pub fn recover_signer_lenient(att: &EasAttestation) -> String {
    match recover_signer(att) {
        Ok(address) => hex_prefixed(address),
        Err(err) => {
            warn!(error = %err, uid = %att.uid, "signer recovery failed");
            String::new()
        }
    }
}

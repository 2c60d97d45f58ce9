//! Off-chain EAS attestations as they arrive inside a scanned pass.

use crate::encoding::{decode_hex, parse_address, parse_word};
use crate::error::{AttestationError, Result};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;

pub const EAS_DOMAIN_NAME: &str = "EAS Attestation";

mod typed {
    pub mod unversioned {
        alloy::sol! {
            struct Attest {
                bytes32 schema;
                address recipient;
                uint64 time;
                uint64 expirationTime;
                bool revocable;
                bytes32 refUID;
                bytes data;
            }
        }
    }

    pub mod versioned {
        alloy::sol! {
            struct Attest {
                uint16 version;
                bytes32 schema;
                address recipient;
                uint64 time;
                uint64 expirationTime;
                bool revocable;
                bytes32 refUID;
                bytes data;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EasAttestation {
    #[serde(default)]
    pub version: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub chain_id: u64,
    #[serde(default)]
    pub verifying_contract: String,
    pub r: String,
    pub s: String,
    #[serde(alias = "vValue", deserialize_with = "lenient_u64")]
    pub v: u64,
    #[serde(default)]
    pub signer: String,
    #[serde(default)]
    pub uid: String,
    #[serde(alias = "schemaValue", alias = "schemaUID")]
    pub schema: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub time: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub expiration_time: u64,
    #[serde(rename = "refUID", alias = "refUidValue", default)]
    pub ref_uid: String,
    #[serde(default)]
    pub revocable: bool,
    pub data: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub nonce: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub message_version: u64,
}

fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(digits) => u64::from_str_radix(digits, 16),
                None => s.parse::<u64>(),
            }
            .map_err(serde::de::Error::custom)
        }
    }
}

impl EasAttestation {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AttestationError::InvalidPayload(format!("eas json: {e}")))
    }

    /// Recovery id in 27/28 form; raw 0/1 values are lifted.
    pub fn v_byte(&self) -> u8 {
        let v = if self.v == 0 || self.v == 1 {
            self.v + 27
        } else {
            self.v
        };
        (v & 0xff) as u8
    }

    pub fn schema_uid(&self) -> Result<B256> {
        parse_word(&self.schema)
    }

    pub fn ref_uid(&self) -> Result<B256> {
        parse_word(&self.ref_uid)
    }

    pub fn recipient_address(&self) -> Result<Address> {
        parse_address(&self.recipient)
    }

    /// The signed `data` field is hex, with or without `0x`.
    pub fn data_bytes(&self) -> Result<Vec<u8>> {
        decode_hex(&self.data)
    }

    pub fn domain(&self) -> Result<Eip712Domain> {
        Ok(Eip712Domain::new(
            Some(Cow::Borrowed(EAS_DOMAIN_NAME)),
            Some(Cow::Owned(self.version.clone())),
            Some(U256::from(self.chain_id)),
            Some(parse_address(&self.verifying_contract)?),
            None,
        ))
    }

    /// EIP-712 hash of the `Attest` message. The `version` member is only part
    /// of the type when the message version is non-zero.
    pub fn signing_hash(&self) -> Result<B256> {
        let domain = self.domain()?;
        let schema = self.schema_uid()?;
        let recipient = self.recipient_address()?;
        let ref_uid = self.ref_uid()?;
        let data = Bytes::from(self.data_bytes()?);

        let hash = if self.message_version > 0 {
            let version = u16::try_from(self.message_version).map_err(|_| {
                AttestationError::InvalidPayload(format!(
                    "message version {} out of range",
                    self.message_version
                ))
            })?;
            typed::versioned::Attest {
                version,
                schema,
                recipient,
                time: self.time,
                expirationTime: self.expiration_time,
                revocable: self.revocable,
                refUID: ref_uid,
                data,
            }
            .eip712_signing_hash(&domain)
        } else {
            typed::unversioned::Attest {
                schema,
                recipient,
                time: self.time,
                expirationTime: self.expiration_time,
                revocable: self.revocable,
                refUID: ref_uid,
                data,
            }
            .eip712_signing_hash(&domain)
        };
        Ok(hash)
    }

    /// 65-byte `r ‖ s ‖ v` signature.
    pub fn signature_bytes(&self) -> Result<[u8; 65]> {
        let r = parse_word(&self.r)?;
        let s = parse_word(&self.s)?;
        let mut raw = [0u8; 65];
        raw[..32].copy_from_slice(r.as_slice());
        raw[32..64].copy_from_slice(s.as_slice());
        raw[64] = self.v_byte();
        Ok(raw)
    }
}

//! The attestation aggregate shared by the legacy and EAS import paths.

use crate::abi::{DecodedField, FieldValue};
use crate::chains::RootIssuers;
use crate::eas::EasAttestation;
use crate::encoding::parse_address;
use crate::error::Result;
use crate::identity;
use crate::schema::is_smart_pass_schema;
use crate::status::AttestationValidationStatus;
use alloy::primitives::{Address, B256};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const EAS_ATTESTATION_NAME: &str = "EAS Attestation";
pub const EAS_ATTESTATION_SYMBOL: &str = "ATTN";

const SMART_LAYER: &str = "SMARTLAYER";
/// Fields that name the issuing organisation, most specific first.
const ORG_FIELDS: &[&str] = &["orgId", "eventId", "devconId"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub chain_id: u64,
    pub address: String,
    pub name: String,
    pub symbol: String,
}

impl TokenInfo {
    pub fn eas_collection(chain_id: u64, collection_id: &str) -> Self {
        Self {
            chain_id,
            address: collection_id.to_string(),
            name: EAS_ATTESTATION_NAME.to_string(),
            symbol: EAS_ATTESTATION_SYMBOL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationKind {
    Legacy,
    Eas,
}

/// Result of running a legacy attestation through its contract check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyValidation {
    pub status: AttestationValidationStatus,
    pub subject: String,
    pub issuer: String,
    pub members: Vec<DecodedField>,
}

/// Everything the EAS path has established before the aggregate is built.
#[derive(Debug, Clone)]
pub struct EasEvidence<'a> {
    pub attestation: &'a EasAttestation,
    pub origin_link: &'a str,
    pub signer: String,
    pub issuer_trusted: bool,
    pub fields: Vec<DecodedField>,
}

#[derive(Debug, Clone)]
pub struct Attestation {
    pub token: TokenInfo,
    pub kind: AttestationKind,
    status: Option<AttestationValidationStatus>,
    pub fields: Vec<DecodedField>,
    pub signer: String,
    pub subject: String,
    pub valid_from: u64,
    pub valid_to: u64,
    pub schema_uid: B256,
    raw: Vec<u8>,
    collection_id: Option<String>,
}

/// Status of an EAS attestation as seen by `wallet` at unix time `now`.
pub fn eas_status(
    issuer_trusted: bool,
    att: &EasAttestation,
    wallet: &str,
    now: u64,
) -> AttestationValidationStatus {
    if !issuer_trusted {
        return AttestationValidationStatus::IssuerNotValid;
    }
    let expired = now <= att.time || (att.expiration_time != 0 && now >= att.expiration_time);
    if expired {
        return AttestationValidationStatus::Expired;
    }
    if !subject_matches(&att.recipient, wallet) {
        return AttestationValidationStatus::IncorrectSubject;
    }
    AttestationValidationStatus::Pass
}

/// An attestation addressed to nobody in particular (`"0"` or the zero
/// address) is held by whoever imports it.
fn subject_matches(recipient: &str, wallet: &str) -> bool {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return false;
    }
    match parse_address(recipient) {
        Ok(addr) if addr == Address::ZERO => true,
        Ok(addr) => parse_address(wallet).map(|w| w == addr).unwrap_or(false),
        Err(_) => recipient.eq_ignore_ascii_case(wallet.trim()),
    }
}

impl Attestation {
    pub fn legacy(token: TokenInfo, raw: Vec<u8>, validation: Option<LegacyValidation>) -> Self {
        let (status, subject, signer, fields) = match validation {
            Some(v) => (Some(v.status), v.subject, v.issuer, v.members),
            None => (None, String::new(), String::new(), Vec::new()),
        };
        Self {
            token,
            kind: AttestationKind::Legacy,
            status,
            fields,
            signer,
            subject,
            valid_from: 0,
            valid_to: 0,
            schema_uid: B256::ZERO,
            raw,
            collection_id: None,
        }
    }

    /// Build the EAS aggregate in one step: the collection id is derived
    /// from the evidence and becomes the token address.
    pub fn from_eas(evidence: EasEvidence<'_>, wallet: &str, now: u64) -> Result<Self> {
        let att = evidence.attestation;
        let schema_uid = att.schema_uid()?;
        let collection_id =
            identity::provisional_collection_id(&evidence.signer, &schema_uid, &evidence.fields);
        let status = eas_status(evidence.issuer_trusted, att, wallet, now);
        Ok(Self {
            token: TokenInfo::eas_collection(att.chain_id, &collection_id),
            kind: AttestationKind::Eas,
            status: Some(status),
            fields: evidence.fields,
            signer: evidence.signer,
            subject: att.recipient.clone(),
            valid_from: att.time,
            valid_to: att.expiration_time,
            schema_uid,
            raw: evidence.origin_link.as_bytes().to_vec(),
            collection_id: Some(collection_id),
        })
    }

    pub fn status(&self) -> Option<AttestationValidationStatus> {
        self.status
    }

    pub fn is_eas(&self) -> bool {
        self.kind == AttestationKind::Eas
    }

    pub fn chain_id(&self) -> u64 {
        self.token.chain_id
    }

    pub fn collection_id(&self) -> String {
        match &self.collection_id {
            Some(id) => id.to_lowercase(),
            None => self.token.address.to_lowercase(),
        }
    }

    pub fn attestation_uid(&self) -> String {
        identity::attestation_uid(&self.fields)
    }

    pub fn identifier_hash(&self) -> String {
        identity::identifier_hash(self.chain_id(), &self.collection_id(), &self.attestation_uid())
    }

    /// Identifier hash over the named fields only, in the order given. Names
    /// the attestation does not carry are skipped.
    pub fn identifier_hash_over(&self, names: &[String]) -> String {
        let selected: Vec<DecodedField> = names
            .iter()
            .filter_map(|name| self.fields.iter().find(|f| &f.name == name))
            .cloned()
            .collect();
        let uid = identity::attestation_uid(&selected);
        identity::identifier_hash(self.chain_id(), &self.collection_id(), &uid)
    }

    /// Storage key. Legacy attestations share their token's key; EAS
    /// attestations are keyed per holder within their collection.
    pub fn database_key(&self) -> String {
        match self.kind {
            AttestationKind::Legacy => {
                format!("{}-{}", self.token.address.to_lowercase(), self.chain_id())
            }
            AttestationKind::Eas => format!(
                "{}-{}-{}",
                self.collection_id(),
                self.chain_id(),
                self.attestation_uid()
            ),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    fn org_is_smart_layer(&self) -> bool {
        ORG_FIELDS
            .iter()
            .find_map(|name| self.field(name))
            .map(|value| value.as_text().eq_ignore_ascii_case(SMART_LAYER))
            .unwrap_or(false)
    }

    pub fn is_smart_pass(&self, issuers: &RootIssuers) -> bool {
        self.is_eas()
            && issuers.contains(self.chain_id(), &self.signer)
            && (is_smart_pass_schema(&self.schema_uid) || self.org_is_smart_layer())
    }

    /// Origin link for EAS, the raw attestation bytes for legacy.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Text form stored with the record.
    pub fn raw_text(&self) -> String {
        match self.kind {
            AttestationKind::Eas => String::from_utf8_lossy(&self.raw).into_owned(),
            AttestationKind::Legacy => general_purpose::STANDARD.encode(&self.raw),
        }
    }

    /// Display members: every decoded field, plus the validity window.
    pub fn members_json(&self) -> Value {
        let mut members: Vec<Value> = self
            .fields
            .iter()
            .map(|f| json!({"name": f.name, "type": f.value.type_name(), "value": f.value.as_text()}))
            .collect();
        if self.is_eas() {
            members.push(json!({"name": "validFrom", "type": "time", "value": self.valid_from.to_string()}));
            if self.valid_to > 0 {
                members.push(json!({"name": "validTo", "type": "time", "value": self.valid_to.to_string()}));
            }
        }
        Value::Array(members)
    }
}

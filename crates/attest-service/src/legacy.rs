//! Legacy attestations: checked by calling a validation function described
//! in the token's attestation definition.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{keccak256, Address, Bytes};
use async_trait::async_trait;
use attest_core::abi::{DecodedField, FieldValue};
use attest_core::attestation::{LegacyValidation, TokenInfo};
use attest_core::chain::ChainReader;
use attest_core::encoding::{hex_prefixed, parse_address};
use attest_core::{AttestationError, AttestationValidationStatus, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

// ── Definitions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum ArgumentSource {
    /// The raw attestation bytes.
    Attestation,
    /// The importing wallet's address.
    Wallet,
    Literal {
        #[serde(rename = "type")]
        sol_type: String,
        value: String,
    },
}

impl ArgumentSource {
    fn sol_type(&self) -> &str {
        match self {
            Self::Attestation => "bytes",
            Self::Wallet => "address",
            Self::Literal { sol_type, .. } => sol_type,
        }
    }

    fn value(&self, raw: &[u8], wallet: Address) -> Result<DynSolValue> {
        match self {
            Self::Attestation => Ok(DynSolValue::Bytes(raw.to_vec())),
            Self::Wallet => Ok(DynSolValue::Address(wallet)),
            Self::Literal { sol_type, value } => DynSolType::parse(sol_type)
                .and_then(|ty| ty.coerce_str(value))
                .map_err(|e| AttestationError::InvalidPayload(format!("argument {value}: {e}"))),
        }
    }
}

/// Indices into the validation function's return values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    pub valid_index: usize,
    #[serde(default)]
    pub subject_index: Option<usize>,
    #[serde(default)]
    pub issuer_index: Option<usize>,
    #[serde(default)]
    pub id_index: Option<usize>,
    /// Accepted issuers. Empty accepts any issuer.
    #[serde(default)]
    pub issuers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationDefinition {
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    /// Validation function; empty for definitions that only describe an
    /// EAS collection.
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentSource>,
    #[serde(default)]
    pub returns: Vec<String>,
    #[serde(default)]
    pub rules: ValidationRules,
    /// Fields that identify one holder's attestation within a collection.
    /// Empty keeps the default identity over every claim field.
    #[serde(default)]
    pub identifier_fields: Vec<String>,
}

impl AttestationDefinition {
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.arguments.iter().map(ArgumentSource::sol_type).collect();
        format!("{}({})", self.method, types.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    pub fn calldata(&self, raw: &[u8], wallet: Address) -> Result<Bytes> {
        let args = self
            .arguments
            .iter()
            .map(|arg| arg.value(raw, wallet))
            .collect::<Result<Vec<_>>>()?;
        let mut data = self.selector().to_vec();
        data.extend(DynSolValue::Tuple(args).abi_encode_params());
        Ok(data.into())
    }

    pub fn decode_returns(&self, output: &[u8]) -> Result<Vec<DynSolValue>> {
        let types = self
            .returns
            .iter()
            .map(|t| DynSolType::parse(t))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AttestationError::Decode(format!("return type: {e}")))?;
        match DynSolType::Tuple(types)
            .abi_decode_params(output)
            .map_err(|e| AttestationError::Decode(e.to_string()))?
        {
            DynSolValue::Tuple(values) => Ok(values),
            other => Ok(vec![other]),
        }
    }
}

#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn definition(&self, chain_id: u64, address: &str)
        -> Result<Option<AttestationDefinition>>;
}

/// Definitions stored as `<chainId>-<address>.json` in one directory.
pub struct DirectoryDefinitions {
    root: PathBuf,
}

impl DirectoryDefinitions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, chain_id: u64, address: &str) -> PathBuf {
        self.root
            .join(format!("{}-{}.json", chain_id, address.trim().to_lowercase()))
    }
}

#[async_trait]
impl DefinitionSource for DirectoryDefinitions {
    async fn definition(
        &self,
        chain_id: u64,
        address: &str,
    ) -> Result<Option<AttestationDefinition>> {
        let path = self.path_for(chain_id, address);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(attest_core::StoreError::from(err).into()),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| AttestationError::InvalidPayload(format!("{}: {e}", path.display())))
    }
}

// ── Policy ──────────────────────────────────────────────────────────────────

/// Maps decoded return values to a validation outcome. `None` means the
/// values could not be interpreted.
pub trait ValidationPolicy: Send + Sync {
    fn evaluate(
        &self,
        definition: &AttestationDefinition,
        values: &[DynSolValue],
        wallet: Address,
    ) -> Option<LegacyValidation>;
}

/// Applies the definition's own rule table.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleTablePolicy;

fn address_at(values: &[DynSolValue], index: Option<usize>) -> Option<Address> {
    match values.get(index?)? {
        DynSolValue::Address(a) => Some(*a),
        DynSolValue::String(s) => parse_address(s).ok(),
        _ => None,
    }
}

impl ValidationPolicy for RuleTablePolicy {
    fn evaluate(
        &self,
        definition: &AttestationDefinition,
        values: &[DynSolValue],
        wallet: Address,
    ) -> Option<LegacyValidation> {
        let rules = &definition.rules;
        let valid = match values.get(rules.valid_index)? {
            DynSolValue::Bool(b) => *b,
            _ => return None,
        };
        let subject = address_at(values, rules.subject_index);
        let issuer = address_at(values, rules.issuer_index);

        let issuer_ok = rules.issuers.is_empty()
            || issuer.is_some_and(|i| {
                rules
                    .issuers
                    .iter()
                    .any(|allowed| parse_address(allowed).map(|a| a == i).unwrap_or(false))
            });
        let subject_ok = match subject {
            None => true,
            Some(s) => s == wallet || s == Address::ZERO,
        };

        let status = if !issuer_ok {
            AttestationValidationStatus::IssuerNotValid
        } else if !valid {
            AttestationValidationStatus::Expired
        } else if !subject_ok {
            AttestationValidationStatus::IncorrectSubject
        } else {
            AttestationValidationStatus::Pass
        };

        let mut members = Vec::new();
        if let Some(DynSolValue::Uint(id, _)) = rules.id_index.and_then(|i| values.get(i)) {
            members.push(DecodedField {
                name: "ticketId".into(),
                value: FieldValue::Uint(*id),
            });
        }
        Some(LegacyValidation {
            status,
            subject: subject.map(|a| hex_prefixed(a)).unwrap_or_default(),
            issuer: issuer.map(|a| hex_prefixed(a)).unwrap_or_default(),
            members,
        })
    }
}

// ── Validator ───────────────────────────────────────────────────────────────

pub struct LegacyValidator {
    reader: Arc<dyn ChainReader>,
    definitions: Arc<dyn DefinitionSource>,
    policy: Arc<dyn ValidationPolicy>,
}

impl LegacyValidator {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        definitions: Arc<dyn DefinitionSource>,
        policy: Arc<dyn ValidationPolicy>,
    ) -> Self {
        Self {
            reader,
            definitions,
            policy,
        }
    }

    pub async fn definition(
        &self,
        token: &TokenInfo,
    ) -> Result<AttestationDefinition> {
        self.definitions
            .definition(token.chain_id, &token.address)
            .await?
            .ok_or_else(|| AttestationError::DefinitionMissing {
                chain_id: token.chain_id,
                address: token.address.clone(),
            })
    }

    /// Run the definition's validation call. A missing definition is an
    /// error; any later failure is logged and yields `None`.
    pub async fn validate(
        &self,
        token: &TokenInfo,
        raw: &[u8],
        wallet: Address,
    ) -> Result<Option<LegacyValidation>> {
        let definition = self.definition(token).await?;
        match self.call(&definition, token, raw, wallet).await {
            Ok(values) => {
                let validation = self.policy.evaluate(&definition, &values, wallet);
                if validation.is_none() {
                    warn!(chain_id = token.chain_id, method = %definition.method, "validation result not understood");
                }
                Ok(validation)
            }
            Err(err) => {
                warn!(chain_id = token.chain_id, address = %token.address, error = %err, "legacy validation call failed");
                Ok(None)
            }
        }
    }

    async fn call(
        &self,
        definition: &AttestationDefinition,
        token: &TokenInfo,
        raw: &[u8],
        wallet: Address,
    ) -> Result<Vec<DynSolValue>> {
        if definition.method.is_empty() {
            return Err(AttestationError::InvalidPayload(format!(
                "definition {} has no validation method",
                definition.name
            )));
        }
        let contract = parse_address(&token.address)?;
        let calldata = definition.calldata(raw, wallet)?;
        debug!(signature = %definition.signature(), "calling legacy validation");
        let output = self.reader.call(token.chain_id, contract, calldata).await?;
        if output.is_empty() {
            return Err(AttestationError::Decode("empty return data".into()));
        }
        definition.decode_returns(&output)
    }
}

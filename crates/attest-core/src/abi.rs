//! Schema-driven decoding of EAS attestation payloads.
//!
//! A schema is a comma separated list of `"<type> <name>"` pairs. Every type
//! is folded onto a small fixed set (uint256, address, bytes32, string,
//! bytes, bool) and the payload is ABI-decoded as a parameter sequence of
//! those types, in declaration order.

use crate::encoding::hex_prefixed;
use crate::error::{AttestationError, Result};
use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Uint256,
    Address,
    Bytes32,
    String,
    Bytes,
    Bool,
}

impl FieldKind {
    /// Fold a declared type onto the supported set. `None` for anything else.
    pub fn normalize(declared: &str) -> Option<Self> {
        let declared = declared.trim();
        if declared.starts_with("uint") || declared.starts_with("int") {
            return Some(Self::Uint256);
        }
        if declared.starts_with("bytes") && declared != "bytes" {
            return Some(Self::Bytes32);
        }
        match declared {
            "address" => Some(Self::Address),
            "string" => Some(Self::String),
            "bytes" => Some(Self::Bytes),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    pub fn sol_type(self) -> DynSolType {
        match self {
            Self::Uint256 => DynSolType::Uint(256),
            Self::Address => DynSolType::Address,
            Self::Bytes32 => DynSolType::FixedBytes(32),
            Self::String => DynSolType::String,
            Self::Bytes => DynSolType::Bytes,
            Self::Bool => DynSolType::Bool,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Uint(U256),
    Addr(Address),
    Hash32(B256),
    Str(String),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint256",
            Self::Addr(_) => "address",
            Self::Hash32(_) => "bytes32",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Bool(_) => "bool",
        }
    }

    /// Canonical text used for display and for identity hashing.
    pub fn as_text(&self) -> String {
        match self {
            Self::Uint(v) => v.to_string(),
            Self::Addr(a) => hex_prefixed(a),
            Self::Hash32(h) => hex_prefixed(h),
            Self::Str(s) => s.clone(),
            Self::Bytes(b) => hex_prefixed(b),
            Self::Bool(b) => b.to_string(),
        }
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    fn from_dyn(value: DynSolValue) -> Result<Self> {
        Ok(match value {
            DynSolValue::Uint(v, _) => Self::Uint(v),
            DynSolValue::Int(v, _) => Self::Uint(v.into_raw()),
            DynSolValue::Address(a) => Self::Addr(a),
            DynSolValue::FixedBytes(w, _) => Self::Hash32(w),
            DynSolValue::String(s) => Self::Str(s),
            DynSolValue::Bytes(b) => Self::Bytes(b),
            DynSolValue::Bool(b) => Self::Bool(b),
            other => {
                return Err(AttestationError::Decode(format!(
                    "unexpected value {other:?}"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedField {
    pub name: String,
    pub value: FieldValue,
}

/// Field names ending in one of these carry a script location, not claim data.
const URI_SUFFIXES: &[&str] = &["scriptURI", "scriptUri"];

impl DecodedField {
    pub fn is_uri(&self) -> bool {
        URI_SUFFIXES.iter().any(|suffix| self.name.ends_with(suffix))
    }
}

/// Parse a schema string into ordered field specs. Unknown types are
/// replaced by `uint256` so one bad entry never sinks the whole layout.
pub fn parse_layout(schema: &str) -> Vec<FieldSpec> {
    if schema.trim().is_empty() {
        return Vec::new();
    }
    schema
        .split(',')
        .enumerate()
        .map(|(index, entry)| {
            let entry = entry.trim();
            let (declared, name) = match entry.split_once(' ') {
                Some((declared, name)) => (declared, name.trim().to_string()),
                None => {
                    warn!(entry, "schema entry without a field name");
                    (entry, format!("field{index}"))
                }
            };
            let kind = FieldKind::normalize(declared).unwrap_or_else(|| {
                warn!(declared, field = %name, "unhandled schema type, decoding as uint256");
                FieldKind::Uint256
            });
            FieldSpec { name, kind }
        })
        .collect()
}

/// Decode `payload` against `schema`, returning one field per schema entry in
/// declaration order.
pub fn decode(payload: &[u8], schema: &str) -> Result<Vec<DecodedField>> {
    let layout = parse_layout(schema);
    if layout.is_empty() {
        return Ok(Vec::new());
    }

    let fields = decode_prefix(payload, &layout)?;
    if fields.len() != layout.len() {
        return Err(AttestationError::Decode(format!(
            "expected {} values, decoded {}",
            layout.len(),
            fields.len()
        )));
    }
    Ok(fields)
}

/// Like [`decode`], but a payload that does not match the whole layout keeps
/// the longest leading run of fields that still decodes.
pub fn decode_lenient(payload: &[u8], schema: &str) -> Vec<DecodedField> {
    match decode(payload, schema) {
        Ok(fields) => fields,
        Err(err) => {
            warn!(error = %err, schema, "payload does not match schema, decoding leading fields");
            let layout = parse_layout(schema);
            (1..layout.len())
                .rev()
                .find_map(|len| decode_prefix(payload, &layout[..len]).ok())
                .unwrap_or_default()
        }
    }
}

fn decode_prefix(payload: &[u8], layout: &[FieldSpec]) -> Result<Vec<DecodedField>> {
    let tuple = DynSolType::Tuple(layout.iter().map(|f| f.kind.sol_type()).collect());
    let values = match tuple
        .abi_decode_params(payload)
        .map_err(|e| AttestationError::Decode(e.to_string()))?
    {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    };
    layout
        .iter()
        .zip(values)
        .map(|(spec, value)| {
            Ok(DecodedField {
                name: spec.name.clone(),
                value: FieldValue::from_dyn(value)?,
            })
        })
        .collect()
}

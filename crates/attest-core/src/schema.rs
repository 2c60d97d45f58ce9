//! Schema lookup: bootstrap table first, then the per-chain schema registry
//! contract. Successful fetches are cached for the life of the registry.

use crate::chain::ChainReader;
use crate::chains::schema_registry_contract;
use crate::contracts::ISchemaRegistry;
use crate::encoding::hex_prefixed;
use crate::error::{AttestationError, Result};
use alloy::primitives::{address, b256, Address, B256};
use alloy::sol_types::SolCall;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const KEY_SCHEMA: &str = "string KeyDescription,bytes ASN1Key,bytes PublicKey";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRecord {
    pub uid: B256,
    pub resolver: Address,
    pub revocable: bool,
    pub schema: String,
}

impl SchemaRecord {
    fn known(uid: B256, resolver: Address, schema: &str) -> Self {
        Self {
            uid,
            resolver,
            revocable: true,
            schema: schema.to_string(),
        }
    }
}

/// Ticket and membership schemas issued for SmartPass.
pub const SMART_PASS_SCHEMAS: &[B256] = &[
    b256!("0x7f6fb09beb1886d0b223e9f15242961198dd360021b2c9f75ac879c0f786cafd"),
    b256!("0x0630f3342772bf31b669bdbc05af0e9e986cf16458f292dfd3b57564b3dc3247"),
    b256!("0xba8aaaf91d1f63d998fb7da69449d9a314bef480e9555710c77d6e594e73ca7a"),
    b256!("0x44ec5251add2115c92896cf4b531eb2fcfac6d8ec8caa451df52f0a25a028545"),
];

pub fn is_smart_pass_schema(uid: &B256) -> bool {
    SMART_PASS_SCHEMAS.contains(uid)
}

/// Records that resolve without touching the network, on every chain.
pub fn bootstrap_records() -> Vec<SchemaRecord> {
    vec![
        SchemaRecord::known(
            b256!("0x4455598d3ec459c4af59335f7729fea0f50ced46cb1cd67914f5349d44142ec1"),
            address!("0x0ed88b8af0347ff49d7e09aa56bd5281165225b6"),
            KEY_SCHEMA,
        ),
        SchemaRecord::known(
            b256!("0x5f0437f7c1db1f8e575732ca52cc8ad899b3c9fe38b78b67ff4ba7c37a8bf3b4"),
            address!("0xF0768c269b015C0A246157c683f9377eF571dCD3"),
            KEY_SCHEMA,
        ),
        SchemaRecord::known(
            SMART_PASS_SCHEMAS[0],
            Address::ZERO,
            "string eventId,string ticketId,uint8 ticketClass,bytes commitment",
        ),
        SchemaRecord::known(
            SMART_PASS_SCHEMAS[1],
            Address::ZERO,
            "string devconId,string ticketIdString,uint8 ticketClass,bytes commitment",
        ),
        SchemaRecord::known(
            SMART_PASS_SCHEMAS[2],
            Address::ZERO,
            "string eventId,string ticketId,uint8 ticketClass,bytes commitment,string scriptUri",
        ),
        SchemaRecord::known(
            SMART_PASS_SCHEMAS[3],
            Address::ZERO,
            "uint16 version,string orgId,string memberId,string memberRole,bytes commitment,string scriptURI",
        ),
    ]
}

pub struct SchemaRegistry {
    reader: Arc<dyn ChainReader>,
    bootstrap: HashMap<B256, SchemaRecord>,
    fetched: RwLock<HashMap<(u64, B256), SchemaRecord>>,
}

impl SchemaRegistry {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        let bootstrap = bootstrap_records()
            .into_iter()
            .map(|record| (record.uid, record))
            .collect();
        Self {
            reader,
            bootstrap,
            fetched: RwLock::new(HashMap::new()),
        }
    }

    pub fn cached(&self, chain_id: u64, uid: &B256) -> Option<SchemaRecord> {
        if let Some(record) = self.bootstrap.get(uid) {
            return Some(record.clone());
        }
        self.fetched.read().get(&(chain_id, *uid)).cloned()
    }

    /// Resolve `uid` on `chain_id`. A failed fetch is reported to the caller
    /// and left uncached, so the next call asks the chain again.
    pub async fn resolve(&self, chain_id: u64, uid: B256) -> Result<SchemaRecord> {
        if let Some(record) = self.cached(chain_id, &uid) {
            return Ok(record);
        }

        let registry = schema_registry_contract(chain_id)
            .ok_or(AttestationError::UnsupportedChain(chain_id))?;
        let calldata = ISchemaRegistry::getSchemaCall { uid }.abi_encode();
        let output = self
            .reader
            .call(chain_id, registry, calldata.into())
            .await
            .map_err(|err| {
                warn!(chain_id, schema = %hex_prefixed(uid), error = %err, "schema fetch failed");
                AttestationError::SchemaUnresolved(hex_prefixed(uid))
            })?;
        let onchain = ISchemaRegistry::getSchemaCall::abi_decode_returns(&output)
            .map_err(|e| AttestationError::Decode(format!("getSchema return: {e}")))?;
        if onchain.uid == B256::ZERO && onchain.schema.is_empty() {
            return Err(AttestationError::SchemaUnresolved(hex_prefixed(uid)));
        }

        let record = SchemaRecord {
            uid,
            resolver: onchain.resolver,
            revocable: onchain.revocable,
            schema: onchain.schema,
        };
        debug!(chain_id, schema = %hex_prefixed(uid), "schema fetched from registry");
        self.fetched.write().insert((chain_id, uid), record.clone());
        Ok(record)
    }
}

//! Issuer trust: static root issuers first, then delegated keys vouched for
//! by the key schema's resolver contract. Anything that fails is untrusted.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use attest_core::chain::ChainReader;
use attest_core::chains::{key_schema_uid, root_key_uid, RootIssuers};
use attest_core::contracts::IKeyResolver;
use attest_core::schema::SchemaRegistry;
use attest_core::Result;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct IssuerTrustResolver {
    reader: Arc<dyn ChainReader>,
    schemas: Arc<SchemaRegistry>,
    roots: RootIssuers,
}

impl IssuerTrustResolver {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        schemas: Arc<SchemaRegistry>,
        roots: RootIssuers,
    ) -> Self {
        Self {
            reader,
            schemas,
            roots,
        }
    }

    pub fn roots(&self) -> &RootIssuers {
        &self.roots
    }

    pub async fn is_trusted(&self, chain_id: u64, signer: &str) -> bool {
        if self.roots.contains(chain_id, signer) {
            return true;
        }
        let Ok(signer_addr) = signer.trim().parse::<Address>() else {
            return false;
        };
        match self.delegated(chain_id, signer_addr).await {
            Ok(valid) => {
                debug!(chain_id, signer, valid, "delegated issuer check");
                valid
            }
            Err(err) => {
                warn!(chain_id, signer, error = %err, "issuer validation failed");
                false
            }
        }
    }

    async fn delegated(&self, chain_id: u64, signer: Address) -> Result<bool> {
        let (Some(key_schema), Some(root_key)) = (key_schema_uid(chain_id), root_key_uid(chain_id))
        else {
            return Ok(false);
        };
        let record = self.schemas.resolve(chain_id, key_schema).await?;
        if record.resolver == Address::ZERO {
            return Ok(false);
        }
        let calldata = IKeyResolver::validateSignatureCall {
            rootKeyUID: root_key,
            signer,
        }
        .abi_encode();
        let output = self
            .reader
            .call(chain_id, record.resolver, calldata.into())
            .await?;
        IKeyResolver::validateSignatureCall::abi_decode_returns(&output)
            .map_err(|e| attest_core::AttestationError::Decode(e.to_string()))
    }
}

use crate::error::Result;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;

/// Read-only contract access. Implementations perform an `eth_call` against
/// `to` on the given chain and return the raw return data.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn call(&self, chain_id: u64, to: Address, calldata: Bytes) -> Result<Bytes>;
}

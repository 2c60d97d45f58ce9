//! JSON-RPC `eth_call` reader over reqwest.

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use attest_core::chain::ChainReader;
use attest_core::encoding::{decode_hex, hex_prefixed};
use attest_core::{AttestationError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

pub struct JsonRpcReader {
    client: reqwest::Client,
    endpoints: BTreeMap<u64, String>,
    next_id: AtomicU64,
}

impl JsonRpcReader {
    pub fn new(endpoints: BTreeMap<u64, String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("attest-service/0.1")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AttestationError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoints,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl ChainReader for JsonRpcReader {
    async fn call(&self, chain_id: u64, to: Address, calldata: Bytes) -> Result<Bytes> {
        let url = self
            .endpoints
            .get(&chain_id)
            .ok_or(AttestationError::UnsupportedChain(chain_id))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [{"to": hex_prefixed(to), "data": hex_prefixed(&calldata)}, "latest"],
        });
        debug!(chain_id, to = %to, "eth_call");

        let res = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AttestationError::Transport(e.to_string()))?;
        if !res.status().is_success() {
            return Err(AttestationError::Transport(format!(
                "rpc responded {}",
                res.status()
            )));
        }
        let reply: RpcResponse = res
            .json()
            .await
            .map_err(|e| AttestationError::Transport(e.to_string()))?;
        if let Some(error) = reply.error {
            return Err(AttestationError::Transport(format!("rpc error: {error}")));
        }
        let result = reply
            .result
            .ok_or_else(|| AttestationError::Transport("rpc reply without result".into()))?;
        Ok(Bytes::from(decode_hex(&result)?))
    }
}

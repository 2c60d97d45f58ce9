#![allow(dead_code)]

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use attest_core::chain::ChainReader;
use attest_core::chains::eas_contract;
use attest_core::eas::EasAttestation;
use attest_core::encoding::{hex_prefixed, parse_word};
use attest_core::{AttestationError, Result};
use attest_service::importer::{ImportListener, TokenCard};
use attest_service::smartpass::SmartPassReturn;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TICKET_SCHEMA_UID: &str =
    "0x7f6fb09beb1886d0b223e9f15242961198dd360021b2c9f75ac879c0f786cafd";
pub const TICKET_SCHEMA: &str = "string eventId,string ticketId,uint8 ticketClass,bytes commitment";
pub const ORIGIN_LINK: &str = "https://smartpass.example/pass?type=eas&ticket=eNpjYGBgAAAABQAB";

pub fn wallet() -> Address {
    Address::repeat_byte(0x22)
}

// ── Chain double ────────────────────────────────────────────────────────────

/// Answers calls per target contract; anything unscripted is a transport error.
#[derive(Default)]
pub struct ScriptedReader {
    answers: Mutex<HashMap<Address, Bytes>>,
    calls: Mutex<Vec<(u64, Address)>>,
}

impl ScriptedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, to: Address, data: Vec<u8>) -> Self {
        self.answers.lock().insert(to, data.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn called(&self) -> Vec<(u64, Address)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChainReader for ScriptedReader {
    async fn call(&self, chain_id: u64, to: Address, _calldata: Bytes) -> Result<Bytes> {
        self.calls.lock().push((chain_id, to));
        self.answers
            .lock()
            .get(&to)
            .cloned()
            .ok_or_else(|| AttestationError::Transport("connection refused".into()))
    }
}

// ── Listener double ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingListener {
    pub imported: Mutex<Vec<TokenCard>>,
    pub errors: Mutex<Vec<String>>,
    pub smart_pass: Mutex<Vec<SmartPassReturn>>,
}

impl ImportListener for RecordingListener {
    fn attestation_imported(&self, card: &TokenCard) {
        self.imported.lock().push(card.clone());
    }

    fn import_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn smart_pass_validation(&self, result: SmartPassReturn) {
        self.smart_pass.lock().push(result);
    }
}

// ── Signed attestations ─────────────────────────────────────────────────────

pub fn ticket_data(event: &str, ticket: &str, commitment: &[u8]) -> Vec<u8> {
    DynSolValue::Tuple(vec![
        DynSolValue::String(event.into()),
        DynSolValue::String(ticket.into()),
        DynSolValue::Uint(U256::from(1u8), 8),
        DynSolValue::Bytes(commitment.to_vec()),
    ])
    .abi_encode_params()
}

pub fn signed_ticket(key: &PrivateKeySigner, chain_id: u64, data: &[u8]) -> EasAttestation {
    signed_with_schema(key, chain_id, TICKET_SCHEMA_UID, data)
}

pub fn signed_with_schema(
    key: &PrivateKeySigner,
    chain_id: u64,
    schema_uid: &str,
    data: &[u8],
) -> EasAttestation {
    let verifying = eas_contract(chain_id).unwrap_or(Address::ZERO);
    let mut att = EasAttestation {
        version: "0.26".into(),
        chain_id,
        verifying_contract: hex_prefixed(verifying),
        r: String::new(),
        s: String::new(),
        v: 0,
        signer: String::new(),
        uid: String::new(),
        schema: schema_uid.into(),
        recipient: "0".into(),
        time: Utc::now().timestamp() as u64 - 60,
        expiration_time: 0,
        ref_uid: "0".into(),
        revocable: true,
        data: hex_prefixed(data),
        nonce: 0,
        message_version: 0,
    };
    resign(&mut att, key);
    att
}

/// `getSchema` return data for a registry that knows `uid`.
pub fn schema_reply(uid: &str, schema: &str) -> Vec<u8> {
    DynSolValue::Tuple(vec![DynSolValue::Tuple(vec![
        DynSolValue::FixedBytes(parse_word(uid).unwrap(), 32),
        DynSolValue::Address(Address::ZERO),
        DynSolValue::Bool(true),
        DynSolValue::String(schema.into()),
    ])])
    .abi_encode_params()
}

pub fn resign(att: &mut EasAttestation, key: &PrivateKeySigner) {
    let hash = att.signing_hash().unwrap();
    let sig = key.sign_hash_sync(&hash).unwrap();
    att.r = hex_prefixed(B256::from(sig.r()));
    att.s = hex_prefixed(B256::from(sig.s()));
    att.v = 27 + u64::from(sig.v());
}

// ── HTTP stub ───────────────────────────────────────────────────────────────

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// One-shot HTTP server answering with `status`. The handle yields the raw
/// request it received.
pub async fn stub_server(status: u16) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response =
            format!("HTTP/1.1 {status} Stub\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });
    (format!("http://{addr}/passes/pass-installed-in-aw"), handle)
}

/// URL of a port nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/passes/pass-installed-in-aw")
}

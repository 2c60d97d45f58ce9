//! End-to-end import tests over in-memory doubles.
//!
//!  1. Root-signed SmartPass ticket: Pass, persisted, webhook notified
//!  2. Unknown signer: Issuer_Not_Valid, still persisted, no webhook
//!  3. Identity collision: old record tombstoned, new record live
//!  4. Legacy attestation validated through its definition
//!  5. Legacy attestation without token or definition
//!  6. Schema cache shared by concurrent imports, unresolved schemas
//!  7. Identifier refresh from a collection definition

mod support;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{address, Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use attest_core::abi::decode;
use attest_core::attestation::TokenInfo;
use attest_core::chains::{schema_registry_contract, RootIssuers, SEPOLIA_TESTNET_ID};
use attest_core::encoding::{hex_prefixed, parse_word};
use attest_core::identity::{attestation_uid, identifier_hash, provisional_collection_id};
use attest_core::qr::{QrKind, QrResult};
use attest_core::settings::SmartPassSettings;
use attest_core::store::{AttestationRecord, AttestationStore, MemoryStore, PersistenceManager, DELETE_KEY};
use attest_core::{AttestationError, AttestationValidationStatus};
use attest_service::importer::{Importer, TokenService};
use attest_service::legacy::DirectoryDefinitions;
use attest_service::smartpass::{SmartPassNotifier, SmartPassReturn};
use std::sync::Arc;
use support::*;

struct Harness {
    importer: Arc<Importer>,
    reader: Arc<ScriptedReader>,
    store: Arc<MemoryStore>,
    listener: Arc<RecordingListener>,
    definitions: tempfile::TempDir,
}

fn harness(reader: ScriptedReader, roots: RootIssuers, smart_pass_url: Option<&str>) -> Harness {
    harness_with_tokens(reader, roots, smart_pass_url, None)
}

fn harness_with_tokens(
    reader: ScriptedReader,
    roots: RootIssuers,
    smart_pass_url: Option<&str>,
    tokens: Option<Arc<dyn TokenService>>,
) -> Harness {
    let reader = Arc::new(reader);
    let store = Arc::new(MemoryStore::new());
    let listener = Arc::new(RecordingListener::default());
    let definitions = tempfile::tempdir().unwrap();
    let persistence = Arc::new(PersistenceManager::new(store.clone()));

    let mut importer = Importer::new(
        wallet(),
        reader.clone(),
        Arc::new(DirectoryDefinitions::new(definitions.path())),
        persistence,
        listener.clone(),
    )
    .with_root_issuers(roots);
    if let Some(url) = smart_pass_url {
        let settings = SmartPassSettings {
            production_url: url.to_string(),
            development_url: url.to_string(),
            timeout_secs: 5,
        };
        let notifier = SmartPassNotifier::new(settings, None, Some("dev-key".into())).unwrap();
        importer = importer.with_smart_pass(Arc::new(notifier));
    }
    if let Some(tokens) = tokens {
        importer = importer.with_token_service(tokens);
    }

    Harness {
        importer: Arc::new(importer),
        reader,
        store,
        listener,
        definitions,
    }
}

fn eas_qr(att: &attest_core::eas::EasAttestation) -> QrResult {
    QrResult {
        kind: QrKind::EasAttestation,
        chain_id: att.chain_id,
        address: ORIGIN_LINK.to_string(),
        function_detail: serde_json::to_string(att).unwrap(),
    }
}

#[tokio::test]
async fn root_signed_ticket_imports_and_notifies() {
    let key = PrivateKeySigner::random();
    let data = ticket_data("SMARTLAYER", "ticket-1", &[0xaa; 32]);
    let att = signed_ticket(&key, SEPOLIA_TESTNET_ID, &data);
    let (url, server) = stub_server(200).await;
    let h = harness(
        ScriptedReader::new(),
        RootIssuers::new().with_issuer(key.address()),
        Some(&url),
    );

    let outcome = h.importer.spawn_import(eas_qr(&att)).await.unwrap().unwrap();

    assert_eq!(outcome.status, AttestationValidationStatus::Pass);
    assert_eq!(outcome.smart_pass, Some(SmartPassReturn::ImportSuccess));
    assert_eq!(h.reader.call_count(), 0);

    let fields = decode(&data, TICKET_SCHEMA).unwrap();
    let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["eventId", "ticketId", "ticketClass", "commitment"]);
    let expected_collection = provisional_collection_id(
        &hex_prefixed(key.address()),
        &parse_word(TICKET_SCHEMA_UID).unwrap(),
        &fields,
    );

    let record = h.store.get(&outcome.record_key).unwrap().unwrap();
    assert_eq!(record.collection_id, expected_collection);
    assert_eq!(outcome.token.address, expected_collection);
    assert_eq!(record.attestation, ORIGIN_LINK);
    assert_eq!(record.status, Some(AttestationValidationStatus::Pass));
    assert!(record.key.starts_with(&format!("{expected_collection}-{SEPOLIA_TESTNET_ID}-")));

    let imported = h.listener.imported.lock().clone();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].record_key, outcome.record_key);
    assert_eq!(*h.listener.smart_pass.lock(), vec![SmartPassReturn::ImportSuccess]);

    let request = server.await.unwrap();
    assert!(request.contains("eNpjYGBgAAAABQAB"));
}

#[tokio::test]
async fn unknown_signer_is_stored_but_rejected() {
    let key = PrivateKeySigner::random();
    let data = ticket_data("SMARTLAYER", "ticket-2", &[1, 2, 3]);
    let att = signed_ticket(&key, SEPOLIA_TESTNET_ID, &data);
    let url = refused_url().await;
    let h = harness(ScriptedReader::new(), RootIssuers::new(), Some(&url));

    let outcome = h.importer.import(&eas_qr(&att)).await.unwrap();

    assert_eq!(outcome.status, AttestationValidationStatus::IssuerNotValid);
    assert_eq!(outcome.smart_pass, None);
    assert!(h.store.get(&outcome.record_key).unwrap().is_some());
    assert!(h.listener.imported.lock().is_empty());
    assert_eq!(outcome.signer, hex_prefixed(key.address()));
    assert_eq!(
        *h.listener.errors.lock(),
        vec![AttestationError::IssuerUntrusted(hex_prefixed(key.address())).to_string()]
    );
    // the delegated check asked the Sepolia key resolver and was refused
    assert_eq!(h.reader.call_count(), 1);
}

#[tokio::test]
async fn expired_ticket_is_stored_as_expired() {
    let key = PrivateKeySigner::random();
    let data = ticket_data("SMARTLAYER", "ticket-3", &[]);
    let mut att = signed_ticket(&key, SEPOLIA_TESTNET_ID, &data);
    att.expiration_time = att.time + 1;
    resign(&mut att, &key);
    let h = harness(
        ScriptedReader::new(),
        RootIssuers::new().with_issuer(key.address()),
        None,
    );

    let outcome = h.importer.import(&eas_qr(&att)).await.unwrap();
    assert_eq!(outcome.status, AttestationValidationStatus::Expired);
    assert_eq!(h.store.list().unwrap().len(), 1);
}

#[tokio::test]
async fn reimport_under_new_key_tombstones_previous_record() {
    let key = PrivateKeySigner::random();
    let data = ticket_data("SMARTLAYER", "ticket-4", &[7; 4]);
    let att = signed_ticket(&key, SEPOLIA_TESTNET_ID, &data);
    let h = harness(
        ScriptedReader::new(),
        RootIssuers::new().with_issuer(key.address()),
        None,
    );

    let first = h.importer.import(&eas_qr(&att)).await.unwrap();
    // same identity stored under a key from an earlier layout
    let mut older = h.store.get(&first.record_key).unwrap().unwrap();
    older.key = format!("legacy-{}", first.record_key);
    h.store.upsert(older.clone()).unwrap();

    let second = h.importer.import(&eas_qr(&att)).await.unwrap();
    assert_eq!(second.record_key, first.record_key);

    let records = h.store.list().unwrap();
    let live: Vec<&AttestationRecord> = records.iter().filter(|r| r.is_live()).collect();
    let dead: Vec<&AttestationRecord> = records.iter().filter(|r| !r.is_live()).collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].key, second.record_key);
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].key, older.key);
    assert_eq!(dead[0].collection_id, DELETE_KEY);
}

#[tokio::test]
async fn unsupported_payload_is_reported() {
    let h = harness(ScriptedReader::new(), RootIssuers::new(), None);
    let qr = QrResult {
        kind: QrKind::Other,
        chain_id: 1,
        address: String::new(),
        function_detail: String::new(),
    };
    let err = h.importer.import(&qr).await.unwrap_err();
    assert!(matches!(err, AttestationError::UnsupportedType));
    assert_eq!(h.listener.errors.lock().len(), 1);
}

// ── Legacy ──────────────────────────────────────────────────────────────────

const POLYGON: u64 = 137;
const TICKET_CONTRACT: Address = address!("0x7777777777777777777777777777777777777777");

fn write_definition(dir: &std::path::Path) {
    let definition = serde_json::json!({
        "name": "Conference Ticket",
        "symbol": "TIX",
        "method": "verifyAttestation",
        "arguments": [{"source": "attestation"}],
        "returns": ["address", "address", "uint256", "bool"],
        "rules": {"validIndex": 3, "subjectIndex": 1, "issuerIndex": 0, "idIndex": 2}
    });
    let source = DirectoryDefinitions::new(dir);
    std::fs::write(
        source.path_for(POLYGON, &hex_prefixed(TICKET_CONTRACT)),
        serde_json::to_vec(&definition).unwrap(),
    )
    .unwrap();
}

fn legacy_reply(subject: Address, valid: bool) -> Vec<u8> {
    DynSolValue::Tuple(vec![
        DynSolValue::Address(Address::repeat_byte(0x11)),
        DynSolValue::Address(subject),
        DynSolValue::Uint(U256::from(12u8), 256),
        DynSolValue::Bool(valid),
    ])
    .abi_encode_params()
}

fn legacy_qr() -> QrResult {
    QrResult {
        kind: QrKind::Attestation,
        chain_id: POLYGON,
        address: hex_prefixed(TICKET_CONTRACT),
        function_detail: "0xdeadbeef".into(),
    }
}

#[tokio::test]
async fn legacy_attestation_validates_through_definition() {
    let h = harness(
        ScriptedReader::new().answer(TICKET_CONTRACT, legacy_reply(wallet(), true)),
        RootIssuers::new(),
        None,
    );
    write_definition(h.definitions.path());

    let outcome = h.importer.import(&legacy_qr()).await.unwrap();
    assert_eq!(outcome.status, AttestationValidationStatus::Pass);
    assert_eq!(
        outcome.record_key,
        format!("{}-{}", hex_prefixed(TICKET_CONTRACT), POLYGON)
    );
    assert_eq!(outcome.token.name, "Conference Ticket");

    let record = h.store.get(&outcome.record_key).unwrap().unwrap();
    assert_eq!(record.attestation, "3q2+7w==");
    assert_eq!(record.members[0]["name"], "ticketId");
    assert_eq!(h.listener.imported.lock().len(), 1);
}

#[tokio::test]
async fn legacy_negative_status_is_still_stored() {
    let h = harness(
        ScriptedReader::new().answer(TICKET_CONTRACT, legacy_reply(Address::repeat_byte(0x33), true)),
        RootIssuers::new(),
        None,
    );
    write_definition(h.definitions.path());

    let outcome = h.importer.import(&legacy_qr()).await.unwrap();
    assert_eq!(outcome.status, AttestationValidationStatus::IncorrectSubject);
    assert!(h.store.get(&outcome.record_key).unwrap().is_some());
    assert_eq!(
        *h.listener.errors.lock(),
        vec![AttestationError::ValidationNegative(AttestationValidationStatus::IncorrectSubject)
            .to_string()]
    );
}

#[tokio::test]
async fn legacy_call_failure_leaves_store_untouched() {
    let h = harness(ScriptedReader::new(), RootIssuers::new(), None);
    write_definition(h.definitions.path());

    let err = h.importer.import(&legacy_qr()).await.unwrap_err();
    assert!(matches!(err, AttestationError::Unvalidated));
    assert!(h.store.list().unwrap().is_empty());
}

#[tokio::test]
async fn legacy_base64_payload_is_not_read_as_hex() {
    let h = harness(
        ScriptedReader::new().answer(TICKET_CONTRACT, legacy_reply(wallet(), true)),
        RootIssuers::new(),
        None,
    );
    write_definition(h.definitions.path());
    let mut qr = legacy_qr();
    qr.function_detail = "AAAAaaa6".into();

    let outcome = h.importer.import(&qr).await.unwrap();
    let record = h.store.get(&outcome.record_key).unwrap().unwrap();
    assert_eq!(record.attestation, "AAAAaaa6");
}

#[tokio::test]
async fn legacy_without_definition_is_definition_missing() {
    let h = harness(ScriptedReader::new(), RootIssuers::new(), None);
    let err = h.importer.import(&legacy_qr()).await.unwrap_err();
    assert!(matches!(err, AttestationError::DefinitionMissing { chain_id: POLYGON, .. }));
    assert!(h.store.list().unwrap().is_empty());
    assert_eq!(h.reader.call_count(), 0);
    assert_eq!(h.listener.errors.lock().len(), 1);
}

/// Token metadata from somewhere other than the definitions directory.
struct FixedTokens(Option<&'static str>);

#[async_trait]
impl TokenService for FixedTokens {
    async fn token_info(
        &self,
        chain_id: u64,
        address: &str,
    ) -> attest_core::Result<Option<TokenInfo>> {
        Ok(self.0.map(|name| TokenInfo {
            chain_id,
            address: address.to_string(),
            name: name.into(),
            symbol: "KNW".into(),
        }))
    }
}

#[tokio::test]
async fn known_token_without_definition_is_definition_missing() {
    let h = harness_with_tokens(
        ScriptedReader::new(),
        RootIssuers::new(),
        None,
        Some(Arc::new(FixedTokens(Some("Known Token")))),
    );
    let err = h.importer.import(&legacy_qr()).await.unwrap_err();
    assert!(matches!(err, AttestationError::DefinitionMissing { chain_id: POLYGON, .. }));
    assert!(h.store.list().unwrap().is_empty());
    assert_eq!(h.reader.call_count(), 0);
}

#[tokio::test]
async fn unknown_token_is_unavailable() {
    let h = harness_with_tokens(
        ScriptedReader::new(),
        RootIssuers::new(),
        None,
        Some(Arc::new(FixedTokens(None))),
    );
    let err = h.importer.import(&legacy_qr()).await.unwrap_err();
    assert!(matches!(err, AttestationError::TokenUnavailable { chain_id: POLYGON, .. }));
    assert!(h.store.list().unwrap().is_empty());
}

// ── Schema resolution and identity refresh ──────────────────────────────────

const CUSTOM_SCHEMA_UID: &str =
    "0x5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_imports_share_the_schema_cache() {
    let key = PrivateKeySigner::random();
    let registry = schema_registry_contract(SEPOLIA_TESTNET_ID).unwrap();
    let h = harness(
        ScriptedReader::new().answer(registry, schema_reply(CUSTOM_SCHEMA_UID, TICKET_SCHEMA)),
        RootIssuers::new().with_issuer(key.address()),
        None,
    );
    let ticket = |id: &str| {
        let data = ticket_data("Devcon", id, &[1, 2]);
        eas_qr(&signed_with_schema(&key, SEPOLIA_TESTNET_ID, CUSTOM_SCHEMA_UID, &data))
    };

    let (a, b) = tokio::join!(
        h.importer.spawn_import(ticket("a")),
        h.importer.spawn_import(ticket("b"))
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();
    assert_eq!(a.status, AttestationValidationStatus::Pass);
    assert_eq!(b.status, AttestationValidationStatus::Pass);
    assert_ne!(a.record_key, b.record_key);
    for outcome in [&a, &b] {
        let record = h.store.get(&outcome.record_key).unwrap().unwrap();
        assert_eq!(record.members[1]["name"], "ticketId");
    }

    // a miss may be fetched by both imports, never more
    let fetches = h.reader.call_count();
    assert!((1..=2).contains(&fetches));
    assert!(h.reader.called().iter().all(|(_, to)| *to == registry));

    h.importer.import(&ticket("c")).await.unwrap();
    assert_eq!(h.reader.call_count(), fetches);
}

#[tokio::test]
async fn unresolved_schema_imports_without_fields() {
    let key = PrivateKeySigner::random();
    let data = ticket_data("Devcon", "lost", &[3]);
    let att = signed_with_schema(&key, SEPOLIA_TESTNET_ID, CUSTOM_SCHEMA_UID, &data);
    let h = harness(
        ScriptedReader::new(),
        RootIssuers::new().with_issuer(key.address()),
        None,
    );

    let outcome = h.importer.import(&eas_qr(&att)).await.unwrap();
    assert_eq!(outcome.status, AttestationValidationStatus::Pass);
    let expected_collection = provisional_collection_id(
        &hex_prefixed(key.address()),
        &parse_word(CUSTOM_SCHEMA_UID).unwrap(),
        &[],
    );
    assert_eq!(outcome.collection_id, expected_collection);

    let record = h.store.get(&outcome.record_key).unwrap().unwrap();
    let members = record.members.as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["name"], "validFrom");
    assert_eq!(h.reader.call_count(), 1);
}

#[tokio::test]
async fn collection_definition_refreshes_identifier() {
    let key = PrivateKeySigner::random();
    let data = ticket_data("SMARTLAYER", "ticket-9", &[9; 8]);
    let att = signed_ticket(&key, SEPOLIA_TESTNET_ID, &data);
    let h = harness(
        ScriptedReader::new(),
        RootIssuers::new().with_issuer(key.address()),
        None,
    );
    let fields = decode(&data, TICKET_SCHEMA).unwrap();
    let collection = provisional_collection_id(
        &hex_prefixed(key.address()),
        &parse_word(TICKET_SCHEMA_UID).unwrap(),
        &fields,
    );
    let source = DirectoryDefinitions::new(h.definitions.path());
    let definition = serde_json::json!({"name": "Conference Pass", "identifierFields": ["ticketId"]});
    std::fs::write(
        source.path_for(SEPOLIA_TESTNET_ID, &collection),
        serde_json::to_vec(&definition).unwrap(),
    )
    .unwrap();

    let outcome = h.importer.import(&eas_qr(&att)).await.unwrap();

    let ticket_only: Vec<_> = fields.iter().filter(|f| f.name == "ticketId").cloned().collect();
    let expected = identifier_hash(SEPOLIA_TESTNET_ID, &collection, &attestation_uid(&ticket_only));
    assert_ne!(expected, identifier_hash(SEPOLIA_TESTNET_ID, &collection, &attestation_uid(&fields)));
    assert_eq!(outcome.identifier_hash, expected);
    let record = h.store.get(&outcome.record_key).unwrap().unwrap();
    assert_eq!(record.identifier_hash, expected);
    assert_eq!(record.collection_id, collection);
    assert!(record.is_live());
}

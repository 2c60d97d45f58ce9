//! Import orchestration for scanned attestations.
//!
//! Every network and crypto step finishes before the single store write, so
//! an aborted import leaves prior records untouched. The only later write is
//! the identifier refresh of the record just stored.

use crate::legacy::{
    DefinitionSource, LegacyValidator, RuleTablePolicy, ValidationPolicy,
};
use crate::smartpass::{SmartPassNotifier, SmartPassReturn};
use crate::trust::IssuerTrustResolver;
use alloy::primitives::Address;
use async_trait::async_trait;
use attest_core::abi::{decode_lenient, DecodedField};
use attest_core::attestation::{Attestation, EasEvidence, TokenInfo};
use attest_core::chain::ChainReader;
use attest_core::chains::RootIssuers;
use attest_core::eas::EasAttestation;
use attest_core::encoding::{decode_payload, hex_prefixed};
use attest_core::qr::{QrKind, QrResult};
use attest_core::schema::SchemaRegistry;
use attest_core::signer::recover_signer_lenient;
use attest_core::store::{AttestationRecord, PersistenceManager};
use attest_core::{AttestationError, AttestationValidationStatus, Result, StoreError};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

// ── Collaborators ───────────────────────────────────────────────────────────

#[async_trait]
pub trait TokenService: Send + Sync {
    async fn token_info(&self, chain_id: u64, address: &str) -> Result<Option<TokenInfo>>;
}

/// Token metadata taken from the attestation definition of the contract. A
/// contract without a definition is reported as `DefinitionMissing`.
pub struct DefinitionTokenService {
    definitions: Arc<dyn DefinitionSource>,
}

impl DefinitionTokenService {
    pub fn new(definitions: Arc<dyn DefinitionSource>) -> Self {
        Self { definitions }
    }
}

#[async_trait]
impl TokenService for DefinitionTokenService {
    async fn token_info(&self, chain_id: u64, address: &str) -> Result<Option<TokenInfo>> {
        let def = self
            .definitions
            .definition(chain_id, address)
            .await?
            .ok_or_else(|| AttestationError::DefinitionMissing {
                chain_id,
                address: address.to_string(),
            })?;
        Ok(Some(TokenInfo {
            chain_id,
            address: address.to_string(),
            name: def.name,
            symbol: def.symbol,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCard {
    pub chain_id: u64,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub attestation_uid: String,
    pub record_key: String,
}

pub trait ImportListener: Send + Sync {
    fn attestation_imported(&self, card: &TokenCard);
    fn import_error(&self, message: &str);
    fn smart_pass_validation(&self, result: SmartPassReturn);
}

/// Listener that only logs.
pub struct LogListener;

impl ImportListener for LogListener {
    fn attestation_imported(&self, card: &TokenCard) {
        info!(chain_id = card.chain_id, key = %card.record_key, name = %card.name, "attestation imported");
    }

    fn import_error(&self, message: &str) {
        warn!(message, "attestation import failed");
    }

    fn smart_pass_validation(&self, result: SmartPassReturn) {
        info!(?result, "smartpass validation");
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub token: TokenInfo,
    pub status: AttestationValidationStatus,
    pub record_key: String,
    pub attestation_uid: String,
    pub collection_id: String,
    pub identifier_hash: String,
    pub signer: String,
    pub smart_pass: Option<SmartPassReturn>,
}

impl ImportOutcome {
    fn new(record: &AttestationRecord, att: &Attestation, status: AttestationValidationStatus) -> Self {
        Self {
            token: att.token.clone(),
            status,
            record_key: record.key.clone(),
            attestation_uid: att.attestation_uid(),
            collection_id: record.collection_id.clone(),
            identifier_hash: record.identifier_hash.clone(),
            signer: att.signer.clone(),
            smart_pass: None,
        }
    }

    /// Why a stored attestation was not accepted; `None` on `Pass`.
    pub fn rejection(&self) -> Option<AttestationError> {
        match self.status {
            AttestationValidationStatus::Pass => None,
            AttestationValidationStatus::IssuerNotValid => {
                Some(AttestationError::IssuerUntrusted(self.signer.clone()))
            }
            status => Some(AttestationError::ValidationNegative(status)),
        }
    }
}

// ── Importer ────────────────────────────────────────────────────────────────

pub struct Importer {
    wallet: Address,
    reader: Arc<dyn ChainReader>,
    schemas: Arc<SchemaRegistry>,
    trust: IssuerTrustResolver,
    definitions: Arc<dyn DefinitionSource>,
    legacy: LegacyValidator,
    tokens: Arc<dyn TokenService>,
    persistence: Arc<PersistenceManager>,
    smart_pass: Option<Arc<SmartPassNotifier>>,
    listener: Arc<dyn ImportListener>,
}

impl Importer {
    pub fn new(
        wallet: Address,
        reader: Arc<dyn ChainReader>,
        definitions: Arc<dyn DefinitionSource>,
        persistence: Arc<PersistenceManager>,
        listener: Arc<dyn ImportListener>,
    ) -> Self {
        let schemas = Arc::new(SchemaRegistry::new(reader.clone()));
        let trust = IssuerTrustResolver::new(reader.clone(), schemas.clone(), RootIssuers::new());
        let legacy = LegacyValidator::new(
            reader.clone(),
            definitions.clone(),
            Arc::new(RuleTablePolicy),
        );
        let tokens = Arc::new(DefinitionTokenService::new(definitions.clone()));
        Self {
            wallet,
            reader,
            schemas,
            trust,
            definitions,
            legacy,
            tokens,
            persistence,
            smart_pass: None,
            listener,
        }
    }

    pub fn with_root_issuers(mut self, roots: RootIssuers) -> Self {
        self.trust = IssuerTrustResolver::new(self.reader.clone(), self.schemas.clone(), roots);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn ValidationPolicy>) -> Self {
        self.legacy = LegacyValidator::new(self.reader.clone(), self.definitions.clone(), policy);
        self
    }

    pub fn with_token_service(mut self, tokens: Arc<dyn TokenService>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_smart_pass(mut self, notifier: Arc<SmartPassNotifier>) -> Self {
        self.smart_pass = Some(notifier);
        self
    }

    /// Run one import as its own task. Aborting the handle before the write
    /// step leaves the store unchanged.
    pub fn spawn_import(self: &Arc<Self>, qr: QrResult) -> JoinHandle<Result<ImportOutcome>> {
        let importer = Arc::clone(self);
        tokio::spawn(async move { importer.import(&qr).await })
    }

    /// Import a scanned attestation and report the result to the listener.
    pub async fn import(&self, qr: &QrResult) -> Result<ImportOutcome> {
        let result = match qr.kind {
            QrKind::Attestation => self.import_legacy(qr).await,
            QrKind::EasAttestation => self.import_eas(qr).await,
            QrKind::Other => Err(AttestationError::UnsupportedType),
        };
        match &result {
            Ok(outcome) => match outcome.rejection() {
                Some(err) => self.listener.import_error(&err.to_string()),
                None => self.listener.attestation_imported(&TokenCard {
                    chain_id: outcome.token.chain_id,
                    address: outcome.token.address.clone(),
                    name: outcome.token.name.clone(),
                    symbol: outcome.token.symbol.clone(),
                    attestation_uid: outcome.attestation_uid.clone(),
                    record_key: outcome.record_key.clone(),
                }),
            },
            Err(err) => self.listener.import_error(&err.to_string()),
        }
        result
    }

    async fn import_legacy(&self, qr: &QrResult) -> Result<ImportOutcome> {
        let token = self
            .tokens
            .token_info(qr.chain_id, &qr.address)
            .await?
            .ok_or_else(|| AttestationError::TokenUnavailable {
                chain_id: qr.chain_id,
                address: qr.address.clone(),
            })?;
        let raw = decode_payload(&qr.function_detail)?;
        let validation = self.legacy.validate(&token, &raw, self.wallet).await?;
        let attestation = Attestation::legacy(token, raw, validation);
        let status = attestation.status().ok_or(AttestationError::Unvalidated)?;

        let record = self.persist(attestation.clone(), false).await?;
        info!(key = %record.key, %status, "legacy attestation stored");
        Ok(ImportOutcome::new(&record, &attestation, status))
    }

    async fn decode_fields(&self, att: &EasAttestation, chain_id: u64) -> Vec<DecodedField> {
        let schema_uid = match att.schema_uid() {
            Ok(uid) => uid,
            Err(err) => {
                warn!(error = %err, "schema uid unreadable");
                return Vec::new();
            }
        };
        let record = match self.schemas.resolve(chain_id, schema_uid).await {
            Ok(record) => record,
            Err(err) => {
                warn!(chain_id, error = %err, "schema unresolved, importing without fields");
                return Vec::new();
            }
        };
        match att.data_bytes() {
            Ok(data) => decode_lenient(&data, &record.schema),
            Err(err) => {
                warn!(error = %err, "attestation data unreadable");
                Vec::new()
            }
        }
    }

    async fn import_eas(&self, qr: &QrResult) -> Result<ImportOutcome> {
        let att = EasAttestation::from_json(&qr.function_detail)?;
        let chain_id = if att.chain_id != 0 { att.chain_id } else { qr.chain_id };

        let signer = recover_signer_lenient(&att);
        let issuer_trusted = !signer.is_empty() && self.trust.is_trusted(chain_id, &signer).await;
        let fields = self.decode_fields(&att, chain_id).await;

        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let attestation = Attestation::from_eas(
            EasEvidence {
                attestation: &att,
                origin_link: &qr.address,
                signer,
                issuer_trusted,
                fields,
            },
            &hex_prefixed(self.wallet),
            now,
        )?;
        let status = attestation
            .status()
            .ok_or(AttestationError::Unvalidated)?;

        let record = self.persist(attestation.clone(), true).await?;
        info!(key = %record.key, %status, "eas attestation stored");
        let mut outcome = ImportOutcome::new(&record, &attestation, status);
        if let Some(identifier_hash) = self.refresh_identity(&attestation, &record).await {
            outcome.identifier_hash = identifier_hash;
        }

        if status.is_pass() && attestation.is_smart_pass(self.trust.roots()) {
            if let Some(notifier) = &self.smart_pass {
                let result = notifier.notify(chain_id, &qr.address).await;
                self.listener.smart_pass_validation(result);
                outcome.smart_pass = Some(result);
            }
        }
        Ok(outcome)
    }

    /// Re-derive the stored record's identity from its collection's
    /// definition, when one names identifier fields. Returns the new hash if
    /// the record was updated. Failures are logged and leave the record as
    /// stored.
    async fn refresh_identity(
        &self,
        attestation: &Attestation,
        record: &AttestationRecord,
    ) -> Option<String> {
        let definition = match self
            .definitions
            .definition(attestation.chain_id(), &record.collection_id)
            .await
        {
            Ok(Some(def)) if !def.identifier_fields.is_empty() => def,
            Ok(_) => return None,
            Err(err) => {
                warn!(collection = %record.collection_id, error = %err, "collection definition unreadable");
                return None;
            }
        };
        let identifier_hash = attestation.identifier_hash_over(&definition.identifier_fields);
        let persistence = self.persistence.clone();
        let key = record.key.clone();
        let collection_id = record.collection_id.clone();
        let hash = identifier_hash.clone();
        let refreshed = tokio::task::spawn_blocking(move || {
            persistence.refresh_identifier(&key, &hash, &collection_id)
        })
        .await;
        match refreshed {
            Ok(Ok(true)) => {
                info!(key = %record.key, identifier = %identifier_hash, "identifier refreshed from definition");
                Some(identifier_hash)
            }
            Ok(Ok(false)) => None,
            Ok(Err(err)) => {
                warn!(key = %record.key, error = %err, "identifier refresh failed");
                None
            }
            Err(err) => {
                warn!(key = %record.key, error = %err, "identifier refresh aborted");
                None
            }
        }
    }

    async fn persist(&self, attestation: Attestation, eas: bool) -> Result<AttestationRecord> {
        let persistence = self.persistence.clone();
        let record = tokio::task::spawn_blocking(move || {
            if eas {
                persistence.store_eas(&attestation, Utc::now())
            } else {
                persistence.store_legacy(&attestation, Utc::now())
            }
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        Ok(record)
    }
}

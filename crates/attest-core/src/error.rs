use crate::status::AttestationValidationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttestationError {
    #[error("No token definition found for {address} on chain {chain_id}")]
    DefinitionMissing { chain_id: u64, address: String },

    #[error("Schema {0} could not be resolved")]
    SchemaUnresolved(String),

    #[error("Attestation payload could not be decoded: {0}")]
    Decode(String),

    #[error("Signer recovery failed: {0}")]
    SignatureRecovery(String),

    #[error("Issuer {0} is not trusted")]
    IssuerUntrusted(String),

    #[error("Attestation rejected: {0}")]
    ValidationNegative(AttestationValidationStatus),

    #[error("Attestation could not be validated")]
    Unvalidated,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Invalid attestation payload: {0}")]
    InvalidPayload(String),

    #[error("Token information unavailable for {address} on chain {chain_id}")]
    TokenUnavailable { chain_id: u64, address: String },

    #[error("No contract configured for chain {0}")]
    UnsupportedChain(u64),

    #[error("Unsupported QR payload type")]
    UnsupportedType,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Record not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, AttestationError>;

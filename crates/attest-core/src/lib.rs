pub mod abi;
pub mod attestation;
pub mod chain;
pub mod chains;
pub mod contracts;
pub mod eas;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod paths;
pub mod qr;
pub mod schema;
pub mod secrets;
pub mod settings;
pub mod signer;
pub mod status;
pub mod store;

pub use error::{AttestationError, Result, StoreError};
pub use status::AttestationValidationStatus;

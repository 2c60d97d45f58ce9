use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal classification of an imported attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttestationValidationStatus {
    Pass,
    Expired,
    #[serde(rename = "Issuer_Not_Valid")]
    IssuerNotValid,
    #[serde(rename = "Incorrect_Subject")]
    IncorrectSubject,
}

impl AttestationValidationStatus {
    pub fn is_pass(self) -> bool {
        self == Self::Pass
    }

    /// Label shown to the user when an import is rejected.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Expired => "Expired",
            Self::IssuerNotValid => "Issuer_Not_Valid",
            Self::IncorrectSubject => "Incorrect_Subject",
        }
    }
}

impl fmt::Display for AttestationValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

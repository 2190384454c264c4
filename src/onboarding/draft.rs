use serde::{Deserialize, Serialize};

use super::machine::Step;
use crate::paxos::VerificationStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityType {
    Person,
    Institution,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonDetails {
    pub first_name: String,
    pub last_name: String,
    /// ISO date string; parsed upstream, opaque here.
    pub date_of_birth: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstitutionDetails {
    pub legal_name: String,
    pub registration_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaxDetails {
    pub country: String,
    pub tax_id_type: String,
    pub tax_id: String,
}

/// Reference to an uploaded document. The binary payload travels to the
/// upstream API at upload time and is never persisted with the draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRef {
    pub kind: String,
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Document as submitted by the client; `content_b64` is dropped on persist.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    pub kind: String,
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_b64: Option<String>,
}

impl From<DocumentUpload> for DocumentRef {
    fn from(upload: DocumentUpload) -> Self {
        Self {
            kind: upload.kind,
            file_name: upload.file_name,
            content_type: upload.content_type,
        }
    }
}

/// Incrementally filled onboarding form state, persisted per user across
/// reloads. Cleared on approval, retained on denial for resubmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Draft {
    pub step: Step,
    #[serde(default)]
    pub identity_type: Option<IdentityType>,
    #[serde(default)]
    pub person: Option<PersonDetails>,
    #[serde(default)]
    pub institution: Option<InstitutionDetails>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub tax: Option<TaxDetails>,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    #[serde(default)]
    pub terms_accepted: bool,
    pub verification: VerificationStatus,
    #[serde(default)]
    pub denial_reason: Option<String>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            step: Step::Welcome,
            identity_type: None,
            person: None,
            institution: None,
            address: None,
            tax: None,
            documents: Vec::new(),
            terms_accepted: false,
            verification: VerificationStatus::Pending,
            denial_reason: None,
        }
    }
}

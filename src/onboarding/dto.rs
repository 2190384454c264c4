use serde::Serialize;

use crate::paxos::VerificationStatus;
use crate::store::OnboardingStatus;

/// Card shown to a denied user explaining what to do next.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DenialGuidance {
    pub title: String,
    pub message: String,
    pub can_resubmit: bool,
}

/// Map an upstream denial reason to guidance. The full set of reason codes
/// is an open external contract, so anything unrecognized falls into the
/// default bucket.
pub fn guidance_for(reason: Option<&str>) -> DenialGuidance {
    match reason {
        Some("DOCUMENT_ISSUE") => DenialGuidance {
            title: "There was a problem with your documents".into(),
            message: "One or more of your documents could not be read or has expired. \
                      Upload a clear, current document and resubmit from the review step."
                .into(),
            can_resubmit: true,
        },
        _ => DenialGuidance {
            title: "We could not verify your identity".into(),
            message: "Your application was not approved. Review your details and resubmit, \
                      or contact support if the problem persists."
                .into(),
            can_resubmit: true,
        },
    }
}

/// Response to a submission: where onboarding stands now.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub onboarding_status: OnboardingStatus,
    pub verification: VerificationStatus,
}

/// Response to a status check ("check now" or page load while pending).
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub verification: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<DenialGuidance>,
}

impl StatusResponse {
    pub fn pending() -> Self {
        Self {
            verification: VerificationStatus::Pending,
            denial_reason: None,
            guidance: None,
        }
    }
}

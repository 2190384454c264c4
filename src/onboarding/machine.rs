use serde::{Deserialize, Serialize};

use super::draft::{Draft, DocumentUpload, IdentityType};
use crate::error::FieldError;

/// Ordered onboarding steps. `welcome` through `review` collect data,
/// `pending` waits on the external verification, `approved`/`denied` are
/// terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Welcome,
    IdentityType,
    PersonalInfo,
    Address,
    TaxDetails,
    Documents,
    Review,
    Pending,
    Approved,
    Denied,
}

impl Step {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::IdentityType => "identity-type",
            Self::PersonalInfo => "personal-info",
            Self::Address => "address",
            Self::TaxDetails => "tax-details",
            Self::Documents => "documents",
            Self::Review => "review",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Some(match slug {
            "welcome" => Self::Welcome,
            "identity-type" => Self::IdentityType,
            "personal-info" => Self::PersonalInfo,
            "address" => Self::Address,
            "tax-details" => Self::TaxDetails,
            "documents" => Self::Documents,
            "review" => Self::Review,
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "denied" => Self::Denied,
            _ => return None,
        })
    }

    /// 1-based index of the data-collection steps, 0 for `welcome`,
    /// `None` past `review`.
    pub fn index(&self) -> Option<u8> {
        Some(match self {
            Self::Welcome => 0,
            Self::IdentityType => 1,
            Self::PersonalInfo => 2,
            Self::Address => 3,
            Self::TaxDetails => 4,
            Self::Documents => 5,
            Self::Review => 6,
            _ => return None,
        })
    }

    pub fn next(&self) -> Option<Self> {
        Some(match self {
            Self::Welcome => Self::IdentityType,
            Self::IdentityType => Self::PersonalInfo,
            Self::PersonalInfo => Self::Address,
            Self::Address => Self::TaxDetails,
            Self::TaxDetails => Self::Documents,
            Self::Documents => Self::Review,
            Self::Review => Self::Pending,
            _ => return None,
        })
    }

    pub fn back(&self) -> Option<Self> {
        Some(match self {
            Self::IdentityType => Self::Welcome,
            Self::PersonalInfo => Self::IdentityType,
            Self::Address => Self::PersonalInfo,
            Self::TaxDetails => Self::Address,
            Self::Documents => Self::TaxDetails,
            Self::Review => Self::Documents,
            // Re-entry after denial happens via the review step.
            Self::Denied => Self::Review,
            _ => return None,
        })
    }

    pub fn is_data_step(&self) -> bool {
        matches!(
            self,
            Self::IdentityType
                | Self::PersonalInfo
                | Self::Address
                | Self::TaxDetails
                | Self::Documents
                | Self::Review
        )
    }
}

/// Payload for `PUT /onboarding/step/:step`. Only the section matching the
/// named step is consumed.
#[derive(Debug, Default, Deserialize)]
pub struct StepUpdate {
    pub identity_type: Option<IdentityType>,
    pub person: Option<super::draft::PersonDetails>,
    pub institution: Option<super::draft::InstitutionDetails>,
    pub address: Option<super::draft::Address>,
    pub tax: Option<super::draft::TaxDetails>,
    pub documents: Option<Vec<DocumentUpload>>,
    pub terms_accepted: Option<bool>,
}

fn required(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "This field is required"));
    }
}

/// Field-completeness check for one step against the current draft.
pub fn validate_step(draft: &Draft, step: Step) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match step {
        Step::Welcome => {}
        Step::IdentityType => {
            if draft.identity_type.is_none() {
                errors.push(FieldError::new(
                    "identity_type",
                    "Choose PERSON or INSTITUTION",
                ));
            }
        }
        Step::PersonalInfo => match draft.identity_type {
            Some(IdentityType::Institution) => match &draft.institution {
                Some(inst) => {
                    required(&mut errors, "legal_name", &inst.legal_name);
                    required(&mut errors, "registration_number", &inst.registration_number);
                }
                None => errors.push(FieldError::new(
                    "institution",
                    "Institution details are required",
                )),
            },
            _ => match &draft.person {
                Some(person) => {
                    required(&mut errors, "first_name", &person.first_name);
                    required(&mut errors, "last_name", &person.last_name);
                    required(&mut errors, "date_of_birth", &person.date_of_birth);
                }
                None => errors.push(FieldError::new("person", "Personal details are required")),
            },
        },
        Step::Address => match &draft.address {
            Some(address) => {
                required(&mut errors, "line1", &address.line1);
                required(&mut errors, "city", &address.city);
                required(&mut errors, "postal_code", &address.postal_code);
                required(&mut errors, "country", &address.country);
            }
            None => errors.push(FieldError::new("address", "Address is required")),
        },
        Step::TaxDetails => match &draft.tax {
            Some(tax) => {
                required(&mut errors, "country", &tax.country);
                required(&mut errors, "tax_id_type", &tax.tax_id_type);
                required(&mut errors, "tax_id", &tax.tax_id);
            }
            None => errors.push(FieldError::new("tax", "Tax details are required")),
        },
        Step::Documents => {
            if draft.documents.is_empty() {
                errors.push(FieldError::new(
                    "documents",
                    "At least one document is required",
                ));
            }
        }
        Step::Review => {
            if !draft.terms_accepted {
                errors.push(FieldError::new(
                    "terms_accepted",
                    "You must accept the terms to continue",
                ));
            }
        }
        Step::Pending | Step::Approved | Step::Denied => {}
    }
    errors
}

/// Merge a step payload into the draft and advance the cursor.
///
/// Forward movement only happens when the step validates; the cursor never
/// moves backwards here (that is `go_back`), so editing an earlier step
/// keeps later data intact.
pub fn apply_step(draft: &mut Draft, step: Step, update: StepUpdate) -> Result<(), Vec<FieldError>> {
    if !step.is_data_step() {
        return Err(vec![FieldError::new(
            "step",
            "This step does not accept data",
        )]);
    }

    match step {
        Step::IdentityType => {
            if let Some(kind) = update.identity_type {
                draft.identity_type = Some(kind);
            }
        }
        Step::PersonalInfo => {
            if let Some(person) = update.person {
                draft.person = Some(person);
            }
            if let Some(institution) = update.institution {
                draft.institution = Some(institution);
            }
        }
        Step::Address => {
            if let Some(address) = update.address {
                draft.address = Some(address);
            }
        }
        Step::TaxDetails => {
            if let Some(tax) = update.tax {
                draft.tax = Some(tax);
            }
        }
        Step::Documents => {
            if let Some(documents) = update.documents {
                draft.documents = documents.into_iter().map(Into::into).collect();
            }
        }
        Step::Review => {
            if let Some(accepted) = update.terms_accepted {
                draft.terms_accepted = accepted;
            }
        }
        _ => unreachable!("filtered by is_data_step"),
    }

    let errors = validate_step(draft, step);
    if !errors.is_empty() {
        return Err(errors);
    }

    if let Some(next) = step.next() {
        if next.is_data_step() && next > draft.step {
            draft.step = next;
        } else if !next.is_data_step() && draft.step < Step::Review {
            draft.step = Step::Review;
        }
    }
    Ok(())
}

/// Backward navigation: always permitted, never clears entered data.
pub fn go_back(draft: &mut Draft) {
    if let Some(previous) = draft.step.back() {
        draft.step = previous;
    }
}

/// All data steps must validate before submission.
pub fn validate_for_submit(draft: &Draft) -> Vec<FieldError> {
    [
        Step::IdentityType,
        Step::PersonalInfo,
        Step::Address,
        Step::TaxDetails,
        Step::Documents,
        Step::Review,
    ]
    .iter()
    .flat_map(|step| validate_step(draft, *step))
    .collect()
}

/// Walks a draft through every data step with valid values. Shared by the
/// handler and poller tests.
#[cfg(test)]
pub(crate) fn complete_test_draft() -> Draft {
    use crate::onboarding::draft::{Address, PersonDetails, TaxDetails};

    let mut draft = Draft::default();
    apply_step(
        &mut draft,
        Step::IdentityType,
        StepUpdate {
            identity_type: Some(IdentityType::Person),
            ..Default::default()
        },
    )
    .unwrap();
    apply_step(
        &mut draft,
        Step::PersonalInfo,
        StepUpdate {
            person: Some(PersonDetails {
                first_name: "Alice".into(),
                last_name: "Doe".into(),
                date_of_birth: "1990-04-01".into(),
                phone: None,
            }),
            ..Default::default()
        },
    )
    .unwrap();
    apply_step(
        &mut draft,
        Step::Address,
        StepUpdate {
            address: Some(Address {
                line1: "1 Main St".into(),
                city: "Springfield".into(),
                postal_code: "12345".into(),
                country: "USA".into(),
                ..Default::default()
            }),
            ..Default::default()
        },
    )
    .unwrap();
    apply_step(
        &mut draft,
        Step::TaxDetails,
        StepUpdate {
            tax: Some(TaxDetails {
                country: "USA".into(),
                tax_id_type: "SSN".into(),
                tax_id: "123-45-6789".into(),
            }),
            ..Default::default()
        },
    )
    .unwrap();
    apply_step(
        &mut draft,
        Step::Documents,
        StepUpdate {
            documents: Some(vec![DocumentUpload {
                kind: "PASSPORT".into(),
                file_name: "passport.jpg".into(),
                content_type: Some("image/jpeg".into()),
                content_b64: Some("aGVsbG8=".into()),
            }]),
            ..Default::default()
        },
    )
    .unwrap();
    apply_step(
        &mut draft,
        Step::Review,
        StepUpdate {
            terms_accepted: Some(true),
            ..Default::default()
        },
    )
    .unwrap();
    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::draft::PersonDetails;

    fn update_with_person(person: PersonDetails) -> StepUpdate {
        StepUpdate {
            person: Some(person),
            ..Default::default()
        }
    }

    #[test]
    fn step_slugs_round_trip() {
        for step in [
            Step::Welcome,
            Step::IdentityType,
            Step::PersonalInfo,
            Step::Address,
            Step::TaxDetails,
            Step::Documents,
            Step::Review,
            Step::Pending,
            Step::Approved,
            Step::Denied,
        ] {
            assert_eq!(Step::from_slug(step.as_slug()), Some(step));
        }
        assert_eq!(Step::from_slug("identity"), None);
    }

    #[test]
    fn data_steps_are_indexed_one_to_six() {
        assert_eq!(Step::IdentityType.index(), Some(1));
        assert_eq!(Step::Review.index(), Some(6));
        assert_eq!(Step::Pending.index(), None);
    }

    #[test]
    fn forward_requires_valid_step() {
        let mut draft = Draft::default();
        let err = apply_step(
            &mut draft,
            Step::PersonalInfo,
            update_with_person(PersonDetails {
                first_name: "Alice".into(),
                last_name: "".into(),
                date_of_birth: "1990-04-01".into(),
                phone: None,
            }),
        )
        .unwrap_err();
        assert_eq!(err[0].field, "last_name");
        assert_eq!(draft.step, Step::Welcome);
    }

    #[test]
    fn valid_step_advances_cursor() {
        let mut draft = Draft::default();
        apply_step(
            &mut draft,
            Step::IdentityType,
            StepUpdate {
                identity_type: Some(IdentityType::Person),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(draft.step, Step::PersonalInfo);
    }

    #[test]
    fn editing_an_earlier_step_keeps_the_cursor() {
        let mut draft = Draft {
            step: Step::TaxDetails,
            identity_type: Some(IdentityType::Person),
            ..Default::default()
        };
        apply_step(
            &mut draft,
            Step::PersonalInfo,
            update_with_person(PersonDetails {
                first_name: "Alice".into(),
                last_name: "Doe".into(),
                date_of_birth: "1990-04-01".into(),
                phone: None,
            }),
        )
        .unwrap();
        assert_eq!(draft.step, Step::TaxDetails);
    }

    #[test]
    fn back_navigation_keeps_data() {
        let mut draft = Draft {
            step: Step::Address,
            identity_type: Some(IdentityType::Person),
            person: Some(PersonDetails {
                first_name: "Alice".into(),
                last_name: "Doe".into(),
                date_of_birth: "1990-04-01".into(),
                phone: None,
            }),
            ..Default::default()
        };
        go_back(&mut draft);
        assert_eq!(draft.step, Step::PersonalInfo);
        assert!(draft.person.is_some());

        // Welcome has nowhere further back to go.
        draft.step = Step::Welcome;
        go_back(&mut draft);
        assert_eq!(draft.step, Step::Welcome);
    }

    #[test]
    fn denied_goes_back_to_review() {
        let mut draft = Draft {
            step: Step::Denied,
            ..Default::default()
        };
        go_back(&mut draft);
        assert_eq!(draft.step, Step::Review);
    }

    #[test]
    fn review_requires_terms() {
        let mut draft = complete_test_draft();
        draft.terms_accepted = false;
        draft.step = Step::Documents;
        let err = apply_step(&mut draft, Step::Review, StepUpdate::default()).unwrap_err();
        assert_eq!(err[0].field, "terms_accepted");
        assert!(!validate_for_submit(&draft).is_empty());

        apply_step(
            &mut draft,
            Step::Review,
            StepUpdate {
                terms_accepted: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(validate_for_submit(&draft).is_empty());
    }

    #[test]
    fn full_walk_ends_on_review() {
        let draft = complete_test_draft();
        assert_eq!(draft.step, Step::Review);
        assert!(validate_for_submit(&draft).is_empty());
    }
}

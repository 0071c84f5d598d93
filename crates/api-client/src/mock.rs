//! Canned payloads for local development.
//!
//! With the `mock-responses` feature on, the binary can substitute these for
//! live calls, which is the first step of the shared error-to-route policy.
//! The feature is never enabled in production builds.

use crate::wire::DocumentReference;
use chrono::{NaiveDate, TimeZone, Utc};
use lgp_core::lloyd_george::RecordDetails;
use lgp_core::patient::PatientDetails;
use lgp_core::session::UserAuth;
use lgp_types::{NhsNumber, Role};

/// The standard test patient.
pub fn fixture_patient() -> PatientDetails {
    PatientDetails {
        nhs_number: NhsNumber::parse("9000000009").expect("fixture NHS number is valid"),
        family_name: "Surname".to_string(),
        given_name: vec!["GivenName".to_string()],
        birth_date: NaiveDate::from_ymd_opt(1970, 1, 1).expect("fixture date is valid"),
        postal_code: Some("LS1 6AE".to_string()),
        superseded: false,
        restricted: false,
        active: Some(true),
        deceased: Some(false),
    }
}

/// A small stitched record for the fixture patient.
pub fn fixture_stitch() -> RecordDetails {
    RecordDetails {
        presign_url: "https://mock.example.test/stitched.pdf".to_string(),
        number_of_files: 3,
        last_updated: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).single(),
        total_file_size: 2 * 1024 * 1024,
    }
}

/// Document metadata matching [`fixture_stitch`].
pub fn fixture_document_references() -> Vec<DocumentReference> {
    (1..=3)
        .map(|n| DocumentReference {
            file_name: format!(
                "{n}of3_Lloyd_George_Record_[GivenName Surname]_[9000000009]_[01011970].pdf"
            ),
            created: Utc
                .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            virus_scanner_result: "Clean".to_string(),
        })
        .collect()
}

/// Credentials for a mock login in the given role.
pub fn fixture_auth(role: Role) -> UserAuth {
    UserAuth {
        role,
        authorisation_token: "mock-token".to_string(),
        refresh_token: Some("mock-refresh".to_string()),
        is_bsol: false,
    }
}

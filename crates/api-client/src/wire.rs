//! Wire models for the records API.
//!
//! These structs mirror the collaborator's JSON exactly; translation into the
//! domain types consumed by the workflows happens here and nowhere else.
//! Unknown keys are tolerated: the API is external and adds fields without
//! notice.

use crate::error::ApiError;
use chrono::{DateTime, NaiveDate, Utc};
use lgp_core::lloyd_george::RecordDetails;
use lgp_core::patient::PatientDetails;
use lgp_core::session::UserAuth;
use lgp_types::{NhsNumber, Role};
use serde::{Deserialize, Serialize};

/// Error body shape shared by every endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub err_code: Option<String>,
    #[serde(default)]
    pub interaction_id: Option<String>,
}

// ============================================================================
// Patient search
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct PatientWire {
    #[serde(rename = "nhsNumber")]
    pub nhs_number: String,

    #[serde(rename = "familyName")]
    pub family_name: String,

    #[serde(rename = "givenName", default)]
    pub given_name: Vec<String>,

    #[serde(rename = "birthDate")]
    pub birth_date: String,

    #[serde(rename = "postalCode", default)]
    pub postal_code: Option<String>,

    #[serde(default)]
    pub superseded: bool,

    #[serde(default)]
    pub restricted: bool,

    #[serde(default)]
    pub active: Option<bool>,

    #[serde(default)]
    pub deceased: Option<bool>,
}

impl TryFrom<PatientWire> for PatientDetails {
    type Error = ApiError;

    fn try_from(wire: PatientWire) -> Result<Self, Self::Error> {
        let nhs_number = NhsNumber::parse(&wire.nhs_number)
            .map_err(|e| ApiError::Decode(format!("patient NHS number: {e}")))?;
        let birth_date = NaiveDate::parse_from_str(&wire.birth_date, "%Y-%m-%d")
            .map_err(|e| ApiError::Decode(format!("patient birth date: {e}")))?;

        Ok(PatientDetails {
            nhs_number,
            family_name: wire.family_name,
            given_name: wire.given_name,
            birth_date,
            postal_code: wire.postal_code,
            superseded: wire.superseded,
            restricted: wire.restricted,
            active: wire.active,
            deceased: wire.deceased,
        })
    }
}

// ============================================================================
// Document references
// ============================================================================

/// Metadata of one stored document, fetched fresh per page load.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DocumentReference {
    #[serde(rename = "fileName")]
    pub file_name: String,

    pub created: DateTime<Utc>,

    #[serde(rename = "virusScannerResult")]
    pub virus_scanner_result: String,
}

// ============================================================================
// Stitched record
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct StitchWire {
    pub presign_url: String,
    pub number_of_files: u64,

    /// Older deployments report `created` instead of `last_updated`.
    #[serde(default, alias = "created")]
    pub last_updated: Option<String>,

    pub total_file_size_in_byte: u64,
}

impl From<StitchWire> for RecordDetails {
    fn from(wire: StitchWire) -> Self {
        let last_updated = wire
            .last_updated
            .as_deref()
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());

        RecordDetails {
            presign_url: wire.presign_url,
            number_of_files: wire.number_of_files,
            last_updated,
            total_file_size: wire.total_file_size_in_byte,
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct AuthWire {
    pub authorisation_token: String,
    pub role: String,

    #[serde(rename = "isBSOL", default)]
    pub is_bsol: bool,

    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TryFrom<AuthWire> for UserAuth {
    type Error = ApiError;

    fn try_from(wire: AuthWire) -> Result<Self, Self::Error> {
        let role = Role::from_wire(&wire.role)
            .ok_or_else(|| ApiError::Decode(format!("unknown role '{}'", wire.role)))?;

        Ok(UserAuth {
            role,
            authorisation_token: wire.authorisation_token,
            refresh_token: wire.refresh_token,
            is_bsol: wire.is_bsol,
        })
    }
}

// ============================================================================
// Upload targets
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct UploadRequestWire {
    pub documents: Vec<UploadRequestDocumentWire>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadRequestDocumentWire {
    #[serde(rename = "fileName")]
    pub file_name: String,

    #[serde(rename = "contentType")]
    pub content_type: String,

    #[serde(rename = "docType")]
    pub doc_type: String,

    #[serde(rename = "fileSize")]
    pub file_size: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadTargetsWire {
    pub documents: Vec<UploadTargetWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadTargetWire {
    #[serde(rename = "fileName")]
    pub file_name: String,

    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_wire_decodes_and_translates() {
        let json = r#"{
            "nhsNumber": "9000000009",
            "familyName": "Surname",
            "givenName": ["GivenName"],
            "birthDate": "1970-01-01",
            "postalCode": "LS1 6AE",
            "superseded": false,
            "restricted": false,
            "active": true
        }"#;

        let wire: PatientWire = serde_json::from_str(json).expect("decodes");
        let patient = PatientDetails::try_from(wire).expect("translates");
        assert_eq!(patient.formatted_nhs_number(), "900 000 0009");
        assert_eq!(patient.display_name(), "GivenName Surname");
        assert_eq!(patient.formatted_birth_date(), "01 January 1970");
        assert_eq!(patient.active, Some(true));
        assert_eq!(patient.deceased, None);
    }

    #[test]
    fn patient_wire_rejects_bad_identifiers() {
        let json = r#"{
            "nhsNumber": "12345",
            "familyName": "Surname",
            "birthDate": "1970-01-01"
        }"#;
        let wire: PatientWire = serde_json::from_str(json).expect("decodes");
        assert!(matches!(
            PatientDetails::try_from(wire),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn stitch_wire_accepts_created_alias() {
        let json = r#"{
            "presign_url": "https://bucket.example.test/stitched.pdf",
            "number_of_files": 7,
            "created": "2024-05-01T09:30:00Z",
            "total_file_size_in_byte": 2097152
        }"#;

        let wire: StitchWire = serde_json::from_str(json).expect("decodes");
        let details = RecordDetails::from(wire);
        assert_eq!(details.number_of_files, 7);
        assert_eq!(details.file_count_text(), "7 files");
        assert_eq!(details.size_text(), "2.0 MB");
        assert!(details.last_updated.is_some());
    }

    #[test]
    fn stitch_wire_tolerates_missing_timestamp() {
        let json = r#"{
            "presign_url": "https://bucket.example.test/stitched.pdf",
            "number_of_files": 1,
            "total_file_size_in_byte": 100
        }"#;
        let wire: StitchWire = serde_json::from_str(json).expect("decodes");
        assert!(RecordDetails::from(wire).last_updated.is_none());
    }

    #[test]
    fn auth_wire_translates_roles() {
        let json = r#"{
            "authorisation_token": "token-abc",
            "role": "GP_ADMIN",
            "isBSOL": true,
            "refresh_token": "refresh-abc"
        }"#;

        let wire: AuthWire = serde_json::from_str(json).expect("decodes");
        let auth = UserAuth::try_from(wire).expect("translates");
        assert_eq!(auth.role, Role::GpAdmin);
        assert!(auth.is_bsol);
        assert_eq!(auth.refresh_token.as_deref(), Some("refresh-abc"));
    }

    #[test]
    fn auth_wire_rejects_unknown_roles() {
        let json = r#"{
            "authorisation_token": "token-abc",
            "role": "RECEPTIONIST"
        }"#;
        let wire: AuthWire = serde_json::from_str(json).expect("decodes");
        assert!(matches!(UserAuth::try_from(wire), Err(ApiError::Decode(_))));
    }

    #[test]
    fn document_reference_decodes_scanner_result() {
        let json = r#"[{
            "fileName": "1of1_Lloyd_George_Record_[Jane Smith]_[9000000009]_[22031998].pdf",
            "created": "2024-01-10T12:00:00Z",
            "virusScannerResult": "Clean"
        }]"#;

        let refs: Vec<DocumentReference> = serde_json::from_str(json).expect("decodes");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].virus_scanner_result, "Clean");
    }
}

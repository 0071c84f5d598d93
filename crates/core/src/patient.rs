//! Verified patient context.
//!
//! A [`PatientDetails`] value is only ever produced by a successful patient
//! search against the records API. The portal holds at most one verified
//! patient at a time; starting a new search clears the previous one. All
//! downstream workflows read this context, none of them mutate it.

use chrono::NaiveDate;
use lgp_types::NhsNumber;

/// Demographics of the currently verified patient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientDetails {
    /// The patient's validated NHS number.
    pub nhs_number: NhsNumber,

    /// Family name (surname).
    pub family_name: String,

    /// Given names in order.
    pub given_name: Vec<String>,

    /// Date of birth.
    pub birth_date: NaiveDate,

    /// Postcode, where the record holds one.
    pub postal_code: Option<String>,

    /// The searched number has been superseded by a newer one.
    pub superseded: bool,

    /// Access to this record is restricted.
    pub restricted: bool,

    /// Whether the patient is registered at an active practice.
    pub active: Option<bool>,

    /// Whether the patient is recorded as deceased.
    pub deceased: Option<bool>,
}

impl PatientDetails {
    /// Full display name, given names first, e.g. `Sarah Jane Williams`.
    pub fn display_name(&self) -> String {
        let mut parts = self.given_name.clone();
        parts.push(self.family_name.clone());
        parts.join(" ")
    }

    /// Date of birth in the portal's long form, e.g. `01 January 1970`.
    pub fn formatted_birth_date(&self) -> String {
        crate::format::long_date(self.birth_date)
    }

    /// NHS number in the national display grouping, e.g. `900 000 0009`.
    pub fn formatted_nhs_number(&self) -> String {
        self.nhs_number.display_grouped()
    }
}

/// Holder for the verified patient, set by search and cleared on navigation
/// back to the start of the journey.
#[derive(Debug, Default)]
pub struct PatientContext {
    current: Option<PatientDetails>,
}

impl PatientContext {
    /// Creates an empty context with no verified patient.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the context with a freshly verified patient.
    pub fn set(&mut self, details: PatientDetails) {
        self.current = Some(details);
    }

    /// Clears the verified patient, e.g. when a new search starts.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// The verified patient, if one is held.
    pub fn current(&self) -> Option<&PatientDetails> {
        self.current.as_ref()
    }
}

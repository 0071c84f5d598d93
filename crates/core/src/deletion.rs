//! Permanent deletion stage machine.
//!
//! Deletion is a three-step journey: an explicit yes/no choice, the network
//! submission, and a confirmation or inline failure. The choice gate is a
//! local validation; nothing touches the network until "yes" is chosen. A
//! failed submission is never retried automatically and keeps no state, so a
//! repeat attempt with the same patient and document type routes identically.

use crate::routing::{FetchFailure, Route};
use lgp_types::{DocType, Role};

/// The radio choice on the confirmation view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteChoice {
    Yes,
    No,
}

/// Stage of the deletion submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Initial,
    Pending,
    Succeeded,
    Failed,
}

/// Raised when the form is submitted without a choice.
#[derive(Debug, thiserror::Error)]
#[error("select whether you want to permanently delete these records")]
pub struct MissingChoice;

/// What the page does after the choice gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceOutcome {
    /// "No": back to the record view, nothing submitted.
    ReturnToRecord,
    /// "Yes": the caller submits the delete request.
    ProceedToSubmit,
}

/// The deletion journey for one patient and document type.
#[derive(Debug)]
pub struct DeletionJourney {
    doc_type: DocType,
    files_in_record: u64,
    state: SubmissionState,
    cache_cleared: bool,
}

impl DeletionJourney {
    /// Starts a journey.
    ///
    /// `doc_type` is `Lg` for the Lloyd-George-only flow and `LgAndArf` for
    /// the national-role delete-everything flow. `files_in_record` is carried
    /// into the confirmation view.
    pub fn new(doc_type: DocType, files_in_record: u64) -> Self {
        Self {
            doc_type,
            files_in_record,
            state: SubmissionState::Initial,
            cache_cleared: false,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn doc_type(&self) -> DocType {
        self.doc_type
    }

    /// File count shown on the deletion-complete view.
    pub fn files_in_record(&self) -> u64 {
        self.files_in_record
    }

    /// True once a successful deletion has invalidated any cached document
    /// list, so the next record-page visit re-fetches.
    pub fn clears_cached_documents(&self) -> bool {
        self.cache_cleared
    }

    /// Applies the yes/no gate.
    ///
    /// # Errors
    ///
    /// Returns [`MissingChoice`] when no radio option was selected; the page
    /// renders this inline and the network is not called.
    pub fn submit_choice(
        &mut self,
        choice: Option<DeleteChoice>,
    ) -> Result<ChoiceOutcome, MissingChoice> {
        match choice {
            None => Err(MissingChoice),
            Some(DeleteChoice::No) => Ok(ChoiceOutcome::ReturnToRecord),
            Some(DeleteChoice::Yes) => {
                self.state = SubmissionState::Pending;
                Ok(ChoiceOutcome::ProceedToSubmit)
            }
        }
    }

    /// Feeds the delete response into the machine.
    ///
    /// Success reaches `Succeeded` and flags the cached document state for
    /// clearing. An authorisation failure leaves the journey for a
    /// role-dependent route. Every other failure, including server errors,
    /// renders inline because it happened during a user-initiated action on
    /// an already-rendered page; it is not retried.
    pub fn on_delete_result(
        &mut self,
        result: Result<(), FetchFailure>,
        role: Role,
    ) -> Option<Route> {
        match result {
            Ok(()) => {
                self.state = SubmissionState::Succeeded;
                self.cache_cleared = true;
                None
            }
            Err(FetchFailure::Unauthorized) => {
                self.state = SubmissionState::Failed;
                Some(match role {
                    Role::Pcse => Route::Home,
                    Role::GpAdmin | Role::GpClinical => Route::SessionExpired,
                })
            }
            Err(_) => {
                self.state = SubmissionState::Failed;
                None
            }
        }
    }

    /// Starts over after a failure. No partial state survives.
    pub fn reset(&mut self) {
        self.state = SubmissionState::Initial;
    }
}

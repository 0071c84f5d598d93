//! Lloyd George record view/download stage machine.
//!
//! The record page is driven by two enums: [`LgRecordStage`] selects which of
//! the three sub-views owns the page (record detail, download-all, delete-all)
//! and [`DownloadStage`] tracks the initial stitched-record fetch. Every
//! transition is the result of feeding an HTTP outcome into the machine;
//! failures that leave the machine entirely (authorisation, server errors)
//! surface as a [`Route`] for the caller to navigate to.

use crate::format;
use crate::routing::{dispose, FailureDisposition, FetchFailure, Route};
use chrono::{DateTime, Utc};
use lgp_types::Role;

/// Stage of the stitched-record fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadStage {
    Initial,
    Pending,
    Succeeded,
    Failed,
    /// The record is too large to stitch in time; only the download-only path
    /// remains available.
    Timeout,
    NoRecords,
    /// Files are still being ingested for this patient.
    Uploading,
    /// A mutation elsewhere invalidated the view; the next visit re-fetches.
    Refresh,
}

/// Which sub-view owns the record page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LgRecordStage {
    Record,
    DownloadAll,
    DeleteAll,
}

/// Stage of the download-all sub-view.
///
/// `Preparing` is an explicitly indeterminate state: the collaborator API
/// gives no compilation progress, so none is simulated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadAllStage {
    Preparing,
    Ready { zip_url: String },
    /// The manifest endpoint returned no content for this patient.
    NoZip,
    Failed,
}

/// Detail of a successfully stitched record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordDetails {
    /// Presigned URL of the stitched PDF.
    pub presign_url: String,

    /// How many scanned files make up the record.
    pub number_of_files: u64,

    /// When the record set last changed, where the API knows.
    pub last_updated: Option<DateTime<Utc>>,

    /// Total size of the record set in bytes.
    pub total_file_size: u64,
}

impl RecordDetails {
    /// The file-count phrase shown on the detail view, e.g. `3 files`.
    pub fn file_count_text(&self) -> String {
        format::file_count_phrase(self.number_of_files)
    }

    /// The human-readable total size shown on the detail view.
    pub fn size_text(&self) -> String {
        format::human_size(self.total_file_size)
    }
}

/// Raised when a role may not take a download path.
#[derive(Debug, thiserror::Error)]
pub enum DownloadGateError {
    #[error("the download-and-remove action needs an explicit confirmation")]
    MissingConfirmation,
    #[error("this role may not remove records after download")]
    RemovalNotPermitted,
}

/// The record page's state machine.
#[derive(Debug)]
pub struct LloydGeorgeViewer {
    stage: DownloadStage,
    record_stage: LgRecordStage,
    download_all: Option<DownloadAllStage>,
    details: Option<RecordDetails>,
    fetch_started: bool,
}

impl Default for LloydGeorgeViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl LloydGeorgeViewer {
    pub fn new() -> Self {
        Self {
            stage: DownloadStage::Initial,
            record_stage: LgRecordStage::Record,
            download_all: None,
            details: None,
            fetch_started: false,
        }
    }

    pub fn stage(&self) -> DownloadStage {
        self.stage
    }

    pub fn record_stage(&self) -> LgRecordStage {
        self.record_stage
    }

    pub fn download_all_stage(&self) -> Option<&DownloadAllStage> {
        self.download_all.as_ref()
    }

    pub fn details(&self) -> Option<&RecordDetails> {
        self.details.as_ref()
    }

    /// Marks the initial fetch as started and moves to `Pending`.
    ///
    /// Returns false if the fetch already ran, so a re-render never fires the
    /// page-entry request twice.
    pub fn begin_fetch(&mut self) -> bool {
        if self.fetch_started && self.stage != DownloadStage::Refresh {
            return false;
        }
        self.fetch_started = true;
        self.stage = DownloadStage::Pending;
        true
    }

    /// Feeds the stitched-record result into the machine.
    ///
    /// Returns a [`Route`] when the failure leaves the machine (session
    /// expired, server error); otherwise the machine settles on the stage for
    /// the business condition and the page stays put.
    pub fn on_stitch_result(
        &mut self,
        result: Result<RecordDetails, FetchFailure>,
    ) -> Option<Route> {
        match result {
            Ok(details) => {
                self.details = Some(details);
                self.stage = DownloadStage::Succeeded;
                None
            }
            Err(failure) => match dispose(&failure) {
                FailureDisposition::Navigate(route) => Some(route),
                FailureDisposition::BusinessStage => {
                    self.stage = match &failure {
                        FetchFailure::NotFound => DownloadStage::NoRecords,
                        FetchFailure::BadRequest { code: Some(code) } if code == "LGL_400" => {
                            DownloadStage::NoRecords
                        }
                        FetchFailure::Locked => DownloadStage::Uploading,
                        FetchFailure::GatewayTimeout => DownloadStage::Timeout,
                        _ => DownloadStage::Failed,
                    };
                    None
                }
                FailureDisposition::InlineFailure => {
                    self.stage = DownloadStage::Failed;
                    None
                }
            },
        }
    }

    /// Opens the download-all sub-view.
    ///
    /// Reachable from a stitched record, or from the `Timeout` stage via the
    /// download-only path. The download-only path is an administrative
    /// affordance: a clinical user following it is refused. The national
    /// records-holding role never takes this Lloyd-George-specific path; its
    /// generic document flow applies instead.
    pub fn open_download_all(&mut self, role: Role) -> Result<(), Route> {
        if role == Role::Pcse {
            return Err(Route::Unauthorised);
        }
        match self.stage {
            DownloadStage::Succeeded => {}
            DownloadStage::Timeout => {
                if role != Role::GpAdmin {
                    return Err(Route::Unauthorised);
                }
            }
            _ => return Err(Route::Home),
        }

        self.record_stage = LgRecordStage::DownloadAll;
        self.download_all = Some(DownloadAllStage::Preparing);
        Ok(())
    }

    /// Feeds the zip-manifest result into the download-all sub-view.
    pub fn on_manifest_result(
        &mut self,
        result: Result<Option<String>, FetchFailure>,
    ) -> Option<Route> {
        let stage = match result {
            Ok(Some(zip_url)) => DownloadAllStage::Ready { zip_url },
            Ok(None) => DownloadAllStage::NoZip,
            Err(failure) => match dispose(&failure) {
                FailureDisposition::Navigate(route) => return Some(route),
                _ => DownloadAllStage::Failed,
            },
        };
        self.download_all = Some(stage);
        None
    }

    /// Cancels the download-all sub-view, returning to the record view.
    ///
    /// Discards the sub-view's state only; any in-flight request is left to
    /// complete unobserved.
    pub fn cancel_download_all(&mut self) {
        self.download_all = None;
        self.record_stage = LgRecordStage::Record;
    }

    /// Opens the delete-all sub-view. Clinical staff are refused.
    pub fn open_delete_all(&mut self, role: Role) -> Result<(), Route> {
        if role == Role::GpClinical {
            return Err(Route::Unauthorised);
        }
        self.record_stage = LgRecordStage::DeleteAll;
        Ok(())
    }

    /// Invalidates the view after a mutation elsewhere, so the next visit
    /// re-fetches the stitched record.
    pub fn mark_refresh_needed(&mut self) {
        self.stage = DownloadStage::Refresh;
        self.details = None;
        self.download_all = None;
        self.record_stage = LgRecordStage::Record;
    }
}

/// Gate for the delete-after-download step of the combined action.
///
/// Only administrative staff outside the local-office boundary may remove a
/// record after downloading it, and only once the confirmation checkbox has
/// been ticked.
pub fn confirm_delete_after_download(
    role: Role,
    is_bsol: bool,
    confirmed: bool,
) -> Result<(), DownloadGateError> {
    if role != Role::GpAdmin || is_bsol {
        return Err(DownloadGateError::RemovalNotPermitted);
    }
    if !confirmed {
        return Err(DownloadGateError::MissingConfirmation);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::decode_error_payload;

    fn details() -> RecordDetails {
        RecordDetails {
            presign_url: "https://bucket.example.test/stitched.pdf".to_string(),
            number_of_files: 3,
            last_updated: None,
            total_file_size: 5 * 1024 * 1024,
        }
    }

    fn started_viewer() -> LloydGeorgeViewer {
        let mut viewer = LloydGeorgeViewer::new();
        assert!(viewer.begin_fetch());
        viewer
    }

    #[test]
    fn successful_stitch_reaches_succeeded_with_detail_text() {
        let mut viewer = started_viewer();
        let route = viewer.on_stitch_result(Ok(details()));
        assert!(route.is_none());
        assert_eq!(viewer.stage(), DownloadStage::Succeeded);

        let detail = viewer.details().expect("details stored");
        assert_eq!(detail.file_count_text(), "3 files");
        assert_eq!(detail.size_text(), "5.0 MB");
    }

    #[test]
    fn not_found_maps_to_no_records_not_failed() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Err(FetchFailure::NotFound));
        assert_eq!(viewer.stage(), DownloadStage::NoRecords);
    }

    #[test]
    fn coded_bad_request_maps_to_no_records() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Err(FetchFailure::BadRequest {
            code: Some("LGL_400".to_string()),
        }));
        assert_eq!(viewer.stage(), DownloadStage::NoRecords);
    }

    #[test]
    fn other_coded_bad_request_is_a_failure() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Err(FetchFailure::BadRequest {
            code: Some("LGL_423".to_string()),
        }));
        assert_eq!(viewer.stage(), DownloadStage::Failed);
    }

    #[test]
    fn locked_maps_to_uploading() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Err(FetchFailure::Locked));
        assert_eq!(viewer.stage(), DownloadStage::Uploading);
    }

    #[test]
    fn gateway_timeout_maps_to_timeout() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Err(FetchFailure::GatewayTimeout));
        assert_eq!(viewer.stage(), DownloadStage::Timeout);
    }

    #[test]
    fn unauthorized_leaves_for_session_expired() {
        let mut viewer = started_viewer();
        let route = viewer.on_stitch_result(Err(FetchFailure::Unauthorized));
        assert_eq!(route, Some(Route::SessionExpired));
    }

    #[test]
    fn server_error_leaves_with_decodable_payload() {
        let mut viewer = started_viewer();
        let route = viewer.on_stitch_result(Err(FetchFailure::Server {
            err_code: "LGS_5001".to_string(),
            interaction_id: "int-1".to_string(),
        }));
        match route {
            Some(Route::ServerError { encoded_error }) => {
                let (code, _) = decode_error_payload(&encoded_error).expect("decodes");
                assert_eq!(code, "LGS_5001");
            }
            other => panic!("expected server-error route, got {other:?}"),
        }
    }

    #[test]
    fn network_failure_is_an_inline_failure() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Err(FetchFailure::Other("connection reset".to_string())));
        assert_eq!(viewer.stage(), DownloadStage::Failed);
    }

    #[test]
    fn page_entry_fetch_fires_exactly_once() {
        let mut viewer = LloydGeorgeViewer::new();
        assert!(viewer.begin_fetch());
        assert!(!viewer.begin_fetch());
    }

    #[test]
    fn refresh_stage_allows_refetch() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Ok(details()));

        viewer.mark_refresh_needed();
        assert_eq!(viewer.stage(), DownloadStage::Refresh);
        assert!(viewer.details().is_none());
        assert!(viewer.begin_fetch());
    }

    #[test]
    fn successful_deletion_invalidates_the_record_view() {
        use crate::deletion::{DeleteChoice, DeletionJourney};
        use lgp_types::DocType;

        let mut viewer = started_viewer();
        viewer.on_stitch_result(Ok(details()));
        viewer.open_delete_all(Role::GpAdmin).expect("admin allowed");

        let mut journey = DeletionJourney::new(DocType::Lg, 3);
        journey
            .submit_choice(Some(DeleteChoice::Yes))
            .expect("choice accepted");
        journey.on_delete_result(Ok(()), Role::GpAdmin);
        assert!(journey.clears_cached_documents());

        viewer.mark_refresh_needed();
        assert!(viewer.begin_fetch());
        viewer.on_stitch_result(Err(FetchFailure::NotFound));
        assert_eq!(viewer.stage(), DownloadStage::NoRecords);
    }

    #[test]
    fn clinical_user_is_refused_the_download_instead_path() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Err(FetchFailure::GatewayTimeout));
        assert_eq!(viewer.stage(), DownloadStage::Timeout);

        let refused = viewer.open_download_all(Role::GpClinical);
        assert_eq!(refused, Err(Route::Unauthorised));
        assert_eq!(viewer.record_stage(), LgRecordStage::Record);
    }

    #[test]
    fn pcse_never_enters_the_lloyd_george_download_view() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Ok(details()));
        assert_eq!(
            viewer.open_download_all(Role::Pcse),
            Err(Route::Unauthorised)
        );
    }

    #[test]
    fn admin_may_take_the_download_instead_path() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Err(FetchFailure::GatewayTimeout));

        viewer
            .open_download_all(Role::GpAdmin)
            .expect("admin allowed");
        assert_eq!(viewer.record_stage(), LgRecordStage::DownloadAll);
        assert_eq!(
            viewer.download_all_stage(),
            Some(&DownloadAllStage::Preparing)
        );
    }

    #[test]
    fn manifest_result_drives_download_all_stage() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Ok(details()));
        viewer
            .open_download_all(Role::GpAdmin)
            .expect("open download");

        viewer.on_manifest_result(Ok(Some("https://bucket.example.test/all.zip".into())));
        assert_eq!(
            viewer.download_all_stage(),
            Some(&DownloadAllStage::Ready {
                zip_url: "https://bucket.example.test/all.zip".to_string()
            })
        );

        viewer.on_manifest_result(Ok(None));
        assert_eq!(viewer.download_all_stage(), Some(&DownloadAllStage::NoZip));
    }

    #[test]
    fn cancel_discards_download_state_and_returns_to_record() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Ok(details()));
        viewer
            .open_download_all(Role::GpAdmin)
            .expect("open download");

        viewer.cancel_download_all();
        assert_eq!(viewer.record_stage(), LgRecordStage::Record);
        assert!(viewer.download_all_stage().is_none());
    }

    #[test]
    fn delete_all_is_refused_for_clinical_staff() {
        let mut viewer = started_viewer();
        viewer.on_stitch_result(Ok(details()));

        assert_eq!(
            viewer.open_delete_all(Role::GpClinical),
            Err(Route::Unauthorised)
        );
        viewer.open_delete_all(Role::GpAdmin).expect("admin allowed");
        assert_eq!(viewer.record_stage(), LgRecordStage::DeleteAll);
    }

    #[test]
    fn delete_after_download_gate() {
        assert!(confirm_delete_after_download(Role::GpAdmin, false, true).is_ok());

        assert!(matches!(
            confirm_delete_after_download(Role::GpAdmin, false, false),
            Err(DownloadGateError::MissingConfirmation)
        ));
        assert!(matches!(
            confirm_delete_after_download(Role::GpAdmin, true, true),
            Err(DownloadGateError::RemovalNotPermitted)
        ));
        assert!(matches!(
            confirm_delete_after_download(Role::GpClinical, false, true),
            Err(DownloadGateError::RemovalNotPermitted)
        ));
    }
}

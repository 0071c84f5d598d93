//! Multi-file upload stage machine and batch validation.
//!
//! The upload journey accumulates files in a `Select` stage, validates the
//! whole batch before any network call, then tracks each file independently
//! through `Selected → Uploading → Succeeded | Failed` while the page shows a
//! per-file progress indicator. The batch is complete once every file is
//! terminal; the summary view reports per-file outcome and overall counts.
//!
//! Validation is all-or-nothing: a single failing file blocks the whole batch
//! with one error keyed to its category (size, type, naming, duplicate), and
//! no partial upload is attempted.

use lgp_types::{DocType, NhsNumber};
use std::path::PathBuf;
use uuid::Uuid;

/// Upper bound on a single scanned file.
pub const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// MIME type required of every Lloyd George scan.
pub const LLOYD_GEORGE_MIME: &str = "application/pdf";

/// MIME types accepted for electronic (ARF) documents.
pub const ARF_ALLOWED_MIMES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/tiff",
    "image/bmp",
    "image/gif",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Stage of the upload journey as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStage {
    Select,
    Uploading,
    Summary,
}

impl Default for UploadStage {
    fn default() -> Self {
        UploadStage::Select
    }
}

/// Lifecycle of one file within a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    Selected,
    Uploading { progress: u8 },
    Succeeded,
    Failed,
}

impl FileState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Succeeded | FileState::Failed)
    }
}

/// One selected file and its upload state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadDocument {
    /// Unique id used to address progress updates.
    pub id: String,

    /// Where the file lives locally.
    pub path: PathBuf,

    /// The filename as validated and sent to the API.
    pub file_name: String,

    /// Size in bytes.
    pub size: u64,

    /// Declared MIME type.
    pub content_type: String,

    /// Which document category the file belongs to.
    pub doc_type: DocType,

    pub state: FileState,
}

impl UploadDocument {
    pub fn new(path: PathBuf, size: u64, content_type: String, doc_type: DocType) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: Uuid::new_v4().to_string(),
            path,
            file_name,
            size,
            content_type,
            doc_type,
            state: FileState::Selected,
        }
    }
}

/// Batch-level validation failure, one per category.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BatchValidationError {
    #[error("select at least one file to upload")]
    NoFilesSelected,
    #[error("'{file_name}' is larger than 5GB. Split the file and try again")]
    FileTooLarge { file_name: String },
    #[error("'{file_name}' is not a file type we accept for these records")]
    UnsupportedFileType { file_name: String },
    #[error("you have already selected a file named '{file_name}'")]
    DuplicateFilename { file_name: String },
    #[error("the selected files do not match the required filename format: {reason}")]
    NamingConvention { reason: String },
}

/// The patient identity and ordering fields encoded in a Lloyd George
/// filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LgFilenameParts {
    pub position: u32,
    pub total: u32,
    pub patient_name: String,
    pub nhs_number: String,
    pub date: String,
}

/// Parses a filename of the form
/// `NofM_Lloyd_George_Record_[Name]_[NhsNumber]_[DDMMYYYY].pdf`.
pub fn parse_lg_filename(file_name: &str) -> Option<LgFilenameParts> {
    let stem = file_name
        .strip_suffix(".pdf")
        .or_else(|| file_name.strip_suffix(".PDF"))?;

    let (position_str, rest) = stem.split_once("of")?;
    let position: u32 = position_str.parse().ok()?;
    let (total_str, rest) = rest.split_once('_')?;
    let total: u32 = total_str.parse().ok()?;

    let rest = rest.strip_prefix("Lloyd_George_Record_[")?;
    let (patient_name, rest) = rest.split_once("]_[")?;
    let (nhs_number, rest) = rest.split_once("]_[")?;
    let date = rest.strip_suffix(']')?;

    if patient_name.is_empty() {
        return None;
    }
    if nhs_number.len() != 10 || !nhs_number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if position == 0 || total == 0 || position > total {
        return None;
    }

    Some(LgFilenameParts {
        position,
        total,
        patient_name: patient_name.to_string(),
        nhs_number: nhs_number.to_string(),
        date: date.to_string(),
    })
}

fn normalised(file_name: &str) -> String {
    file_name.trim().to_lowercase()
}

/// Validates a whole batch before submission.
///
/// Checks run in a fixed order so one failure category surfaces at a time:
/// empty batch, per-file size, per-file type, duplicate filenames, then the
/// Lloyd George naming convention (ordering coverage and consistent patient
/// identity, including a match against the verified patient's NHS number).
pub fn validate_batch(
    files: &[UploadDocument],
    doc_type: DocType,
    patient: &NhsNumber,
) -> Result<(), BatchValidationError> {
    if files.is_empty() {
        return Err(BatchValidationError::NoFilesSelected);
    }

    for file in files {
        if file.size > MAX_FILE_BYTES {
            return Err(BatchValidationError::FileTooLarge {
                file_name: file.file_name.clone(),
            });
        }
    }

    for file in files {
        let allowed = match doc_type {
            DocType::Lg => file.content_type == LLOYD_GEORGE_MIME,
            DocType::Arf | DocType::LgAndArf => {
                ARF_ALLOWED_MIMES.contains(&file.content_type.as_str())
            }
        };
        if !allowed {
            return Err(BatchValidationError::UnsupportedFileType {
                file_name: file.file_name.clone(),
            });
        }
    }

    let mut seen = std::collections::HashSet::new();
    for file in files {
        if !seen.insert(normalised(&file.file_name)) {
            return Err(BatchValidationError::DuplicateFilename {
                file_name: file.file_name.clone(),
            });
        }
    }

    if doc_type == DocType::Lg {
        validate_lg_naming(files, patient)?;
    }

    Ok(())
}

fn validate_lg_naming(
    files: &[UploadDocument],
    patient: &NhsNumber,
) -> Result<(), BatchValidationError> {
    let mut parsed = Vec::with_capacity(files.len());
    for file in files {
        let parts = parse_lg_filename(&file.file_name).ok_or_else(|| {
            BatchValidationError::NamingConvention {
                reason: format!("'{}' does not follow the naming format", file.file_name),
            }
        })?;
        parsed.push(parts);
    }

    let first = &parsed[0];
    let expected_total = files.len() as u32;

    if first.total != expected_total {
        return Err(BatchValidationError::NamingConvention {
            reason: format!(
                "filenames say {} files but {} were selected",
                first.total, expected_total
            ),
        });
    }

    for parts in &parsed {
        if parts.total != first.total
            || parts.patient_name != first.patient_name
            || parts.nhs_number != first.nhs_number
        {
            return Err(BatchValidationError::NamingConvention {
                reason: "every file must carry the same total, patient name and NHS number"
                    .to_string(),
            });
        }
    }

    if first.nhs_number != patient.as_str() {
        return Err(BatchValidationError::NamingConvention {
            reason: "the NHS number in the filenames does not match this patient".to_string(),
        });
    }

    let mut positions: Vec<u32> = parsed.iter().map(|p| p.position).collect();
    positions.sort_unstable();
    let complete = positions
        .iter()
        .enumerate()
        .all(|(i, p)| *p == i as u32 + 1);
    if !complete {
        return Err(BatchValidationError::NamingConvention {
            reason: format!("file numbering must run 1 to {} with no gaps", expected_total),
        });
    }

    Ok(())
}

/// Per-file outcome counts for the summary view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// The upload journey for one patient.
#[derive(Debug, Default)]
pub struct UploadBatch {
    files: Vec<UploadDocument>,
    stage: UploadStage,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> UploadStage {
        self.stage
    }

    pub fn files(&self) -> &[UploadDocument] {
        &self.files
    }

    /// Adds a file while still selecting. Ignored after submission.
    pub fn add_file(&mut self, document: UploadDocument) {
        if self.stage == UploadStage::Select {
            self.files.push(document);
        }
    }

    /// Removes a file by id while still selecting.
    pub fn remove_file(&mut self, id: &str) {
        if self.stage == UploadStage::Select {
            self.files.retain(|f| f.id != id);
        }
    }

    /// Validates the batch and, on success, moves every file to `Uploading`
    /// with zero progress and the journey to the `Uploading` stage.
    ///
    /// All files are dispatched together; completion order is not defined.
    pub fn begin_upload(
        &mut self,
        doc_type: DocType,
        patient: &NhsNumber,
    ) -> Result<(), BatchValidationError> {
        validate_batch(&self.files, doc_type, patient)?;

        for file in &mut self.files {
            file.state = FileState::Uploading { progress: 0 };
        }
        self.stage = UploadStage::Uploading;
        Ok(())
    }

    /// Records progress for one file. Terminal files are left untouched.
    pub fn set_progress(&mut self, id: &str, progress: u8) {
        if let Some(file) = self.files.iter_mut().find(|f| f.id == id) {
            if !file.state.is_terminal() {
                file.state = FileState::Uploading {
                    progress: progress.min(100),
                };
            }
        }
    }

    pub fn mark_succeeded(&mut self, id: &str) {
        if let Some(file) = self.files.iter_mut().find(|f| f.id == id) {
            file.state = FileState::Succeeded;
        }
    }

    pub fn mark_failed(&mut self, id: &str) {
        if let Some(file) = self.files.iter_mut().find(|f| f.id == id) {
            file.state = FileState::Failed;
        }
    }

    /// True while any file is mid-upload; the page warns against navigating
    /// away while this holds.
    pub fn navigation_blocked(&self) -> bool {
        self.stage == UploadStage::Uploading
            && self
                .files
                .iter()
                .any(|f| matches!(f.state, FileState::Uploading { .. }))
    }

    /// True once every file has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.stage == UploadStage::Uploading && self.files.iter().all(|f| f.state.is_terminal())
    }

    /// Moves to the summary stage and reports the overall counts.
    ///
    /// Returns `None` while any file is still in flight.
    pub fn finish(&mut self) -> Option<UploadSummary> {
        if !self.is_complete() {
            return None;
        }
        self.stage = UploadStage::Summary;
        let mut summary = UploadSummary::default();
        for file in &self.files {
            match file.state {
                FileState::Succeeded => summary.succeeded += 1,
                FileState::Failed => summary.failed += 1,
                _ => {}
            }
        }
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> NhsNumber {
        NhsNumber::parse("9000000009").expect("valid number")
    }

    fn lg_file(name: &str) -> UploadDocument {
        UploadDocument::new(
            PathBuf::from(format!("/scans/{name}")),
            1024,
            LLOYD_GEORGE_MIME.to_string(),
            DocType::Lg,
        )
    }

    fn lg_name(position: u32, total: u32) -> String {
        format!(
            "{position}of{total}_Lloyd_George_Record_[Jane Smith]_[9000000009]_[22031998].pdf"
        )
    }

    #[test]
    fn well_formed_filename_parses() {
        let parts = parse_lg_filename(&lg_name(1, 2)).expect("parses");
        assert_eq!(parts.position, 1);
        assert_eq!(parts.total, 2);
        assert_eq!(parts.patient_name, "Jane Smith");
        assert_eq!(parts.nhs_number, "9000000009");
        assert_eq!(parts.date, "22031998");
    }

    #[test]
    fn malformed_filenames_do_not_parse() {
        assert!(parse_lg_filename("scan.pdf").is_none());
        assert!(parse_lg_filename("1of2_Lloyd_George_Record_[Jane]_[123]_[22031998].pdf").is_none());
        assert!(parse_lg_filename(
            "1of2_Lloyd_George_Record_[Jane]_[9000000009]_[22-03-98].pdf"
        )
        .is_none());
        assert!(parse_lg_filename(
            "0of2_Lloyd_George_Record_[Jane]_[9000000009]_[22031998].pdf"
        )
        .is_none());
        assert!(parse_lg_filename(
            "3of2_Lloyd_George_Record_[Jane]_[9000000009]_[22031998].pdf"
        )
        .is_none());
    }

    #[test]
    fn complete_batch_passes_validation() {
        let files: Vec<_> = (1..=3).map(|n| lg_file(&lg_name(n, 3))).collect();
        validate_batch(&files, DocType::Lg, &patient()).expect("valid batch");
    }

    #[test]
    fn total_mismatch_is_a_naming_error() {
        let files = vec![lg_file(&lg_name(1, 2))];
        let err = validate_batch(&files, DocType::Lg, &patient()).expect_err("short batch");
        assert!(matches!(err, BatchValidationError::NamingConvention { .. }));
    }

    #[test]
    fn gap_in_numbering_is_a_naming_error() {
        let files = vec![lg_file(&lg_name(1, 3)), lg_file(&lg_name(3, 3))];
        let err = validate_batch(&files, DocType::Lg, &patient()).expect_err("missing 2of3");
        assert!(matches!(err, BatchValidationError::NamingConvention { .. }));
    }

    #[test]
    fn inconsistent_patient_identity_is_a_naming_error() {
        let files = vec![
            lg_file(&lg_name(1, 2)),
            lg_file(
                "2of2_Lloyd_George_Record_[John Smith]_[9000000009]_[22031998].pdf",
            ),
        ];
        let err = validate_batch(&files, DocType::Lg, &patient()).expect_err("name differs");
        assert!(matches!(err, BatchValidationError::NamingConvention { .. }));
    }

    #[test]
    fn filename_nhs_number_must_match_the_verified_patient() {
        let other = NhsNumber::parse("9000000010").expect("valid number");
        let files: Vec<_> = (1..=2).map(|n| lg_file(&lg_name(n, 2))).collect();
        let err = validate_batch(&files, DocType::Lg, &other).expect_err("wrong patient");
        assert!(matches!(err, BatchValidationError::NamingConvention { .. }));
    }

    #[test]
    fn duplicates_are_distinct_from_naming_errors() {
        let files = vec![lg_file(&lg_name(1, 2)), lg_file(&lg_name(1, 2))];
        let err = validate_batch(&files, DocType::Lg, &patient()).expect_err("duplicate");
        assert!(matches!(err, BatchValidationError::DuplicateFilename { .. }));
    }

    #[test]
    fn duplicate_detection_normalises_case_and_whitespace() {
        let mut second = lg_file(&lg_name(1, 2));
        second.file_name = second.file_name.to_uppercase();
        // Duplicates are checked before the naming convention.
        let files = vec![lg_file(&lg_name(1, 2)), second];
        let err = validate_batch(&files, DocType::Lg, &patient()).expect_err("duplicate");
        assert!(matches!(err, BatchValidationError::DuplicateFilename { .. }));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let mut file = lg_file(&lg_name(1, 1));
        file.size = MAX_FILE_BYTES + 1;
        let err = validate_batch(&[file], DocType::Lg, &patient()).expect_err("too large");
        assert!(matches!(err, BatchValidationError::FileTooLarge { .. }));
    }

    #[test]
    fn lloyd_george_files_must_be_pdf() {
        let mut file = lg_file(&lg_name(1, 1));
        file.content_type = "image/jpeg".to_string();
        let err = validate_batch(&[file], DocType::Lg, &patient()).expect_err("not pdf");
        assert!(matches!(err, BatchValidationError::UnsupportedFileType { .. }));
    }

    #[test]
    fn arf_accepts_images_without_naming_rules() {
        let file = UploadDocument::new(
            PathBuf::from("/scans/referral-letter.jpg"),
            2048,
            "image/jpeg".to_string(),
            DocType::Arf,
        );
        validate_batch(&[file], DocType::Arf, &patient()).expect("valid ARF batch");
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = validate_batch(&[], DocType::Lg, &patient()).expect_err("empty");
        assert!(matches!(err, BatchValidationError::NoFilesSelected));
    }

    #[test]
    fn batch_lifecycle_reaches_summary_with_counts() {
        let mut batch = UploadBatch::new();
        for n in 1..=3 {
            batch.add_file(lg_file(&lg_name(n, 3)));
        }
        batch
            .begin_upload(DocType::Lg, &patient())
            .expect("validation passes");
        assert_eq!(batch.stage(), UploadStage::Uploading);
        assert!(batch.navigation_blocked());

        let ids: Vec<String> = batch.files().iter().map(|f| f.id.clone()).collect();

        // Files complete out of submission order.
        batch.set_progress(&ids[2], 40);
        batch.mark_succeeded(&ids[2]);
        batch.set_progress(&ids[0], 90);
        batch.mark_failed(&ids[0]);
        assert!(batch.finish().is_none());

        batch.mark_succeeded(&ids[1]);
        assert!(!batch.navigation_blocked());

        let summary = batch.finish().expect("all files terminal");
        assert_eq!(summary, UploadSummary { succeeded: 2, failed: 1 });
        assert_eq!(batch.stage(), UploadStage::Summary);
    }

    #[test]
    fn failed_validation_never_starts_an_upload() {
        let mut batch = UploadBatch::new();
        batch.add_file(lg_file(&lg_name(1, 2)));
        let err = batch
            .begin_upload(DocType::Lg, &patient())
            .expect_err("incomplete batch");
        assert!(matches!(err, BatchValidationError::NamingConvention { .. }));
        assert_eq!(batch.stage(), UploadStage::Select);
        assert!(batch.files().iter().all(|f| f.state == FileState::Selected));
    }

    #[test]
    fn progress_is_clamped_and_terminal_states_stick() {
        let mut batch = UploadBatch::new();
        batch.add_file(lg_file(&lg_name(1, 1)));
        batch
            .begin_upload(DocType::Lg, &patient())
            .expect("validation passes");

        let id = batch.files()[0].id.clone();
        batch.set_progress(&id, 250);
        assert_eq!(
            batch.files()[0].state,
            FileState::Uploading { progress: 100 }
        );

        batch.mark_succeeded(&id);
        batch.set_progress(&id, 10);
        assert_eq!(batch.files()[0].state, FileState::Succeeded);
    }

    #[test]
    fn files_can_be_removed_while_selecting() {
        let mut batch = UploadBatch::new();
        batch.add_file(lg_file(&lg_name(1, 2)));
        batch.add_file(lg_file(&lg_name(2, 2)));
        let id = batch.files()[0].id.clone();

        batch.remove_file(&id);
        assert_eq!(batch.files().len(), 1);
    }
}

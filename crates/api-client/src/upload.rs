//! Concurrent dispatch of a validated upload batch.
//!
//! The batch must already have passed validation via
//! [`UploadBatch::begin_upload`]. Dispatch asks the API for one presigned
//! target per file, then sends every file together; files progress and finish
//! independently, in no particular order, and the batch completes when the
//! last file reaches a terminal state.

use crate::client::{RecordsClient, UploadFileSpec, UploadTarget};
use crate::error::ApiError;
use lgp_core::upload::{UploadBatch, UploadSummary};
use lgp_types::NhsNumber;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

const CHUNK_BYTES: usize = 256 * 1024;

/// A snapshot of one file taken under the batch lock.
#[derive(Clone, Debug)]
struct FileSnapshot {
    id: String,
    path: PathBuf,
    file_name: String,
    content_type: String,
    doc_type: lgp_types::DocType,
    size: u64,
}

/// Uploads every file in the batch and returns the summary counts.
///
/// Progress and terminal states are written back into `batch` as transfers
/// advance, so a caller holding the same handle can render per-file state.
/// If the presign request itself fails, every file is marked failed and the
/// error is returned.
pub async fn dispatch_batch(
    client: &RecordsClient,
    patient: &NhsNumber,
    batch: Arc<Mutex<UploadBatch>>,
) -> Result<UploadSummary, ApiError> {
    let snapshots = snapshot_files(&batch);
    if snapshots.is_empty() {
        return Ok(UploadSummary::default());
    }

    let specs: Vec<UploadFileSpec> = snapshots
        .iter()
        .map(|f| UploadFileSpec {
            file_name: f.file_name.clone(),
            content_type: f.content_type.clone(),
            doc_type: f.doc_type,
            size: f.size,
        })
        .collect();

    let targets = match client.create_upload_targets(patient, &specs).await {
        Ok(targets) => targets,
        Err(e) => {
            tracing::warn!("presign request failed, failing the whole batch: {}", e);
            if let Ok(mut b) = batch.lock() {
                for file in &snapshots {
                    b.mark_failed(&file.id);
                }
                b.finish();
            }
            return Err(e);
        }
    };

    let (matched, unmatched) = match_targets(snapshots, &targets);

    if let Ok(mut b) = batch.lock() {
        for file in &unmatched {
            tracing::warn!(file = %file.file_name, "no upload target issued");
            b.mark_failed(&file.id);
        }
    }

    let mut tasks = JoinSet::new();
    for (file, url) in matched {
        let client = client.clone();
        let batch = batch.clone();
        tasks.spawn(async move {
            let result = upload_one(&client, &file, &url, batch.clone()).await;
            (file.id, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, Ok(()))) => {
                if let Ok(mut b) = batch.lock() {
                    b.mark_succeeded(&id);
                }
            }
            Ok((id, Err(e))) => {
                tracing::warn!("file upload failed: {}", e);
                if let Ok(mut b) = batch.lock() {
                    b.mark_failed(&id);
                }
            }
            Err(e) => {
                tracing::warn!("upload task panicked: {}", e);
            }
        }
    }

    let summary = batch
        .lock()
        .ok()
        .and_then(|mut b| b.finish())
        .unwrap_or_default();
    Ok(summary)
}

async fn upload_one(
    client: &RecordsClient,
    file: &FileSnapshot,
    url: &str,
    batch: Arc<Mutex<UploadBatch>>,
) -> Result<(), ApiError> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(ApiError::FileRead)?;
    let content_length = bytes.len() as u64;
    let body = progress_body(bytes, batch, file.id.clone());
    client
        .put_presigned(url, &file.content_type, content_length, body)
        .await
}

fn snapshot_files(batch: &Arc<Mutex<UploadBatch>>) -> Vec<FileSnapshot> {
    match batch.lock() {
        Ok(b) => b
            .files()
            .iter()
            .map(|f| FileSnapshot {
                id: f.id.clone(),
                path: f.path.clone(),
                file_name: f.file_name.clone(),
                content_type: f.content_type.clone(),
                doc_type: f.doc_type,
                size: f.size,
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn match_targets(
    files: Vec<FileSnapshot>,
    targets: &[UploadTarget],
) -> (Vec<(FileSnapshot, String)>, Vec<FileSnapshot>) {
    let by_name: HashMap<&str, &str> = targets
        .iter()
        .map(|t| (t.file_name.as_str(), t.url.as_str()))
        .collect();

    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    for file in files {
        match by_name.get(file.file_name.as_str()) {
            Some(url) => matched.push((file, url.to_string())),
            None => unmatched.push(file),
        }
    }
    (matched, unmatched)
}

fn progress_percent(sent: usize, total: usize) -> u8 {
    ((sent * 100) / total.max(1)).min(100) as u8
}

/// Wraps the file bytes in a chunked stream that reports percentage progress
/// into the batch as each chunk is handed to the transport.
fn progress_body(
    bytes: Vec<u8>,
    batch: Arc<Mutex<UploadBatch>>,
    id: String,
) -> reqwest::Body {
    let total = bytes.len();
    let chunks: Vec<bytes::Bytes> = bytes
        .chunks(CHUNK_BYTES)
        .map(bytes::Bytes::copy_from_slice)
        .collect();

    let mut sent = 0usize;
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        if let Ok(mut b) = batch.lock() {
            b.set_progress(&id, progress_percent(sent, total));
        }
        Ok::<bytes::Bytes, std::io::Error>(chunk)
    }));

    reqwest::Body::wrap_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str) -> FileSnapshot {
        FileSnapshot {
            id: format!("id-{name}"),
            path: PathBuf::from(format!("/scans/{name}")),
            file_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            doc_type: lgp_types::DocType::Lg,
            size: 100,
        }
    }

    #[test]
    fn progress_reaches_exactly_one_hundred() {
        assert_eq!(progress_percent(0, 1000), 0);
        assert_eq!(progress_percent(500, 1000), 50);
        assert_eq!(progress_percent(1000, 1000), 100);
        // Empty files complete immediately rather than dividing by zero.
        assert_eq!(progress_percent(0, 0), 0);
    }

    #[test]
    fn files_match_targets_by_name() {
        let files = vec![snapshot("a.pdf"), snapshot("b.pdf"), snapshot("c.pdf")];
        let targets = vec![
            UploadTarget {
                file_name: "a.pdf".to_string(),
                url: "https://bucket.example.test/a".to_string(),
            },
            UploadTarget {
                file_name: "c.pdf".to_string(),
                url: "https://bucket.example.test/c".to_string(),
            },
        ];

        let (matched, unmatched) = match_targets(files, &targets);
        assert_eq!(matched.len(), 2);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].file_name, "b.pdf");
        assert_eq!(matched[0].1, "https://bucket.example.test/a");
    }
}

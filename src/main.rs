use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_client::{dispatch_batch, RecordsClient};
use lgp_core::deletion::{ChoiceOutcome, DeleteChoice, DeletionJourney, SubmissionState};
use lgp_core::lloyd_george::{
    confirm_delete_after_download, DownloadAllStage, DownloadStage, LloydGeorgeViewer,
};
use lgp_core::menu::{permitted_actions, ActionKind};
use lgp_core::patient::{PatientContext, PatientDetails};
use lgp_core::routing::Route;
use lgp_core::session::{restore, FileSessionStorage, Session, SessionStorage};
use lgp_core::upload::{FileState, UploadBatch, UploadDocument};
use lgp_core::PortalConfig;
use lgp_types::{DocType, NhsNumber, Role};

#[derive(Parser)]
#[command(name = "lgp")]
#[command(about = "Lloyd George record portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange a login callback code for a session
    Login {
        /// Authorisation code from the login callback
        code: String,
        /// State value from the login callback
        state: String,
    },
    /// Discard the current session
    Logout,
    /// Verify a patient by NHS number
    Search {
        /// NHS number, spaces and dashes allowed
        nhs_number: String,
    },
    /// Lloyd George record operations
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },
    /// Stored document operations
    Docs {
        #[command(subcommand)]
        command: DocsCommands,
    },
}

#[derive(Subcommand)]
enum RecordCommands {
    /// View the stitched record summary
    View { nhs_number: String },
    /// Download the whole record as a zip
    Download {
        nhs_number: String,
        /// Remove the record from storage after downloading
        #[arg(long)]
        delete_after: bool,
        /// Confirm the removal explicitly (required with --delete-after)
        #[arg(long)]
        confirm: bool,
        /// Where to write the zip (defaults to the working directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Permanently delete the record
    Delete {
        nhs_number: String,
        /// Delete electronic documents as well (national-role flow)
        #[arg(long)]
        all_types: bool,
        /// Answer yes to the confirmation question
        #[arg(long)]
        yes: bool,
        /// Answer no to the confirmation question
        #[arg(long)]
        no: bool,
    },
}

#[derive(Subcommand)]
enum DocsCommands {
    /// List stored document metadata
    List {
        nhs_number: String,
        /// Document category to list
        #[arg(long, default_value = "LG")]
        doc_type: String,
    },
    /// Upload scanned files
    Upload {
        nhs_number: String,
        /// Files to upload
        paths: Vec<PathBuf>,
        /// Document category to upload as
        #[arg(long, default_value = "LG")]
        doc_type: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("lgp=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = PortalConfig::from_env()?;
    tracing::debug!("++ LGP portal against {}", config.api_base_url());

    let storage = FileSessionStorage::new(config.session_file().clone());
    let session = restore(&storage, config.inactivity_window(), Utc::now())?;
    let session = Arc::new(RwLock::new(session));
    let client = RecordsClient::new(config.api_base_url(), session.clone())?;

    let outcome = match cli.command {
        Commands::Login { code, state } => run_login(&client, &code, &state).await,
        Commands::Logout => run_logout(&session, &storage).await,
        Commands::Search { nhs_number } => run_search(&client, &nhs_number).await,
        Commands::Record { command } => match command {
            RecordCommands::View { nhs_number } => {
                run_record_view(&client, &session, &nhs_number).await
            }
            RecordCommands::Download {
                nhs_number,
                delete_after,
                confirm,
                output,
            } => {
                run_record_download(&client, &session, &nhs_number, delete_after, confirm, output)
                    .await
            }
            RecordCommands::Delete {
                nhs_number,
                all_types,
                yes,
                no,
            } => run_record_delete(&client, &session, &nhs_number, all_types, yes, no).await,
        },
        Commands::Docs { command } => match command {
            DocsCommands::List {
                nhs_number,
                doc_type,
            } => run_docs_list(&client, &session, &nhs_number, &doc_type).await,
            DocsCommands::Upload {
                nhs_number,
                paths,
                doc_type,
            } => run_docs_upload(&client, &session, &config, &nhs_number, paths, &doc_type).await,
        },
    };

    // Persist any token refresh or recorded activity for the next invocation.
    // A session cleared by a terminal authorisation failure is removed from
    // storage here too.
    {
        let session = session.read().await;
        if session.is_logged_in() {
            storage.save(&session)?;
        } else {
            storage.clear()?;
        }
    }

    outcome
}

// ============================================================================
// Command handlers
// ============================================================================

async fn run_login(client: &RecordsClient, code: &str, state: &str) -> anyhow::Result<()> {
    let auth = client
        .login(code, state)
        .await
        .map_err(|e| anyhow!("login failed: {e}"))?;

    println!("Logged in as {}.", auth.role.to_wire());
    if auth.is_bsol {
        println!("You are working inside the local-office boundary.");
    }
    Ok(())
}

async fn run_logout(
    session: &Arc<RwLock<Session>>,
    storage: &FileSessionStorage,
) -> anyhow::Result<()> {
    session.write().await.logout();
    storage.clear()?;
    println!("Logged out.");
    Ok(())
}

async fn run_search(client: &RecordsClient, nhs_number: &str) -> anyhow::Result<()> {
    let nhs = parse_nhs(nhs_number)?;

    #[cfg(feature = "mock-responses")]
    {
        let _ = (client, &nhs);
        let mut context = PatientContext::new();
        context.set(api_client::mock::fixture_patient());
        if let Some(patient) = context.current() {
            print_patient(patient);
        }
        return Ok(());
    }

    #[cfg(not(feature = "mock-responses"))]
    {
        let mut context = PatientContext::new();
        return match client.search_patient(&nhs).await {
            Ok(patient) => {
                context.set(patient);
                if let Some(patient) = context.current() {
                    print_patient(patient);
                }
                Ok(())
            }
            Err(e) => match e.to_failure() {
                lgp_core::FetchFailure::NotFound
                | lgp_core::FetchFailure::BadRequest { .. } => {
                    bail!("No patient found with NHS number {}.", nhs)
                }
                failure => Err(failure_to_error(&failure)),
            },
        };
    }
}

async fn run_record_view(
    client: &RecordsClient,
    session: &Arc<RwLock<Session>>,
    nhs_number: &str,
) -> anyhow::Result<()> {
    let (role, is_bsol) = require_auth(session).await?;
    let nhs = parse_nhs(nhs_number)?;

    #[cfg(feature = "mock-responses")]
    {
        let _ = (client, &nhs);
        let details = api_client::mock::fixture_stitch();
        print_record_details(&details);
        print_menu(role, true, is_bsol);
        return Ok(());
    }

    #[cfg(not(feature = "mock-responses"))]
    {
        let patient = verify_patient(client, &nhs).await?;
        println!("Lloyd George record for {}", patient.display_name());

        let mut viewer = LloydGeorgeViewer::new();
        viewer.begin_fetch();
        let result = client
            .lloyd_george_stitch(&nhs)
            .await
            .map_err(|e| e.to_failure());

        if let Some(route) = viewer.on_stitch_result(result) {
            return Err(route_to_error(&route));
        }

        return match viewer.stage() {
            DownloadStage::Succeeded => {
                if let Some(details) = viewer.details() {
                    print_record_details(details);
                }
                print_menu(role, true, is_bsol);
                Ok(())
            }
            DownloadStage::NoRecords => {
                println!("No documents are available.");
                print_menu(role, false, is_bsol);
                Ok(())
            }
            DownloadStage::Uploading => {
                println!("Files are still being uploaded for this patient. Try again shortly.");
                Ok(())
            }
            DownloadStage::Timeout => {
                println!(
                    "This record is too large to view here. Use 'lgp record download' instead."
                );
                Ok(())
            }
            _ => bail!("The record could not be loaded. Try again later."),
        };
    }
}

async fn run_record_download(
    client: &RecordsClient,
    session: &Arc<RwLock<Session>>,
    nhs_number: &str,
    delete_after: bool,
    confirm: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (role, is_bsol) = require_auth(session).await?;
    let nhs = parse_nhs(nhs_number)?;
    let patient = verify_patient(client, &nhs).await?;

    if delete_after {
        confirm_delete_after_download(role, is_bsol, confirm)
            .map_err(|e| anyhow!("{e}"))?;
    }

    let mut viewer = LloydGeorgeViewer::new();
    viewer.begin_fetch();
    let result = client
        .lloyd_george_stitch(&nhs)
        .await
        .map_err(|e| e.to_failure());
    if let Some(route) = viewer.on_stitch_result(result) {
        return Err(route_to_error(&route));
    }

    if viewer.stage() == DownloadStage::NoRecords {
        println!("No documents are available.");
        return Ok(());
    }

    viewer
        .open_download_all(role)
        .map_err(|route| route_to_error(&route))?;
    println!("Preparing your download...");

    let manifest = client
        .document_manifest(&nhs, DocType::Lg)
        .await
        .map_err(|e| e.to_failure());
    if let Some(route) = viewer.on_manifest_result(manifest) {
        return Err(route_to_error(&route));
    }

    let zip_url = match viewer.download_all_stage() {
        Some(DownloadAllStage::Ready { zip_url }) => zip_url.clone(),
        Some(DownloadAllStage::NoZip) => {
            println!("There are no records available to download.");
            return Ok(());
        }
        _ => bail!("The download could not be prepared. Try again later."),
    };

    let bytes = client
        .fetch_presigned(&zip_url)
        .await
        .map_err(|e| anyhow!("downloading the zip failed: {e}"))?;

    let path = output
        .unwrap_or_else(|| PathBuf::from(format!("lloyd_george_{}.zip", nhs.as_str())));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!(
        "Saved {} ({}) to {}.",
        patient.display_name(),
        lgp_core::format::human_size(bytes.len() as u64),
        path.display()
    );

    if delete_after {
        let files_in_record = viewer.details().map(|d| d.number_of_files).unwrap_or(0);
        let mut journey = DeletionJourney::new(DocType::Lg, files_in_record);
        journey
            .submit_choice(Some(DeleteChoice::Yes))
            .map_err(|e| anyhow!("{e}"))?;

        let result = client
            .delete_documents(&nhs, DocType::Lg)
            .await
            .map_err(|e| e.to_failure());
        if let Some(route) = journey.on_delete_result(result, role) {
            return Err(route_to_error(&route));
        }
        match journey.state() {
            SubmissionState::Succeeded => {
                print_deletion_complete(&patient, journey.files_in_record());
            }
            _ => bail!("The record was downloaded but could not be removed. Try again later."),
        }
    }

    Ok(())
}

async fn run_record_delete(
    client: &RecordsClient,
    session: &Arc<RwLock<Session>>,
    nhs_number: &str,
    all_types: bool,
    yes: bool,
    no: bool,
) -> anyhow::Result<()> {
    let (role, _) = require_auth(session).await?;
    if role == Role::GpClinical {
        return Err(route_to_error(&Route::Unauthorised));
    }

    let nhs = parse_nhs(nhs_number)?;
    let patient = verify_patient(client, &nhs).await?;

    // The national role's flow always removes everything held for the patient.
    let doc_type = if all_types || role == Role::Pcse {
        DocType::LgAndArf
    } else {
        DocType::Lg
    };

    let documents = client
        .search_document_references(&nhs, doc_type)
        .await
        .map_err(|e| failure_to_error(&e.to_failure()))?;

    let mut journey = DeletionJourney::new(doc_type, documents.len() as u64);

    let choice = match (yes, no) {
        (true, true) => bail!("pass either --yes or --no, not both"),
        (true, false) => Some(DeleteChoice::Yes),
        (false, true) => Some(DeleteChoice::No),
        (false, false) => None,
    };

    match journey.submit_choice(choice) {
        Err(e) => bail!("{e}"),
        Ok(ChoiceOutcome::ReturnToRecord) => {
            println!("The records have been kept.");
            Ok(())
        }
        Ok(ChoiceOutcome::ProceedToSubmit) => {
            let result = client
                .delete_documents(&nhs, doc_type)
                .await
                .map_err(|e| e.to_failure());

            if let Some(route) = journey.on_delete_result(result, role) {
                return Err(route_to_error(&route));
            }
            match journey.state() {
                SubmissionState::Succeeded => {
                    print_deletion_complete(&patient, journey.files_in_record());
                    Ok(())
                }
                _ => bail!("The records could not be deleted. Try again later."),
            }
        }
    }
}

async fn run_docs_list(
    client: &RecordsClient,
    session: &Arc<RwLock<Session>>,
    nhs_number: &str,
    doc_type: &str,
) -> anyhow::Result<()> {
    require_auth(session).await?;
    let nhs = parse_nhs(nhs_number)?;
    let doc_type = parse_doc_type(doc_type)?;

    let documents = client
        .search_document_references(&nhs, doc_type)
        .await
        .map_err(|e| failure_to_error(&e.to_failure()))?;

    if documents.is_empty() {
        println!("No documents are available.");
        return Ok(());
    }

    for doc in &documents {
        println!(
            "{}  uploaded {}  scan: {}",
            doc.file_name,
            doc.created.format("%d %B %Y %H:%M"),
            doc.virus_scanner_result
        );
    }
    println!("{}", lgp_core::format::file_count_phrase(documents.len() as u64));
    Ok(())
}

async fn run_docs_upload(
    client: &RecordsClient,
    session: &Arc<RwLock<Session>>,
    config: &PortalConfig,
    nhs_number: &str,
    paths: Vec<PathBuf>,
    doc_type: &str,
) -> anyhow::Result<()> {
    if !config.upload_enabled() {
        bail!("uploads are switched off for this deployment");
    }

    let (role, _) = require_auth(session).await?;
    if role != Role::GpAdmin {
        return Err(route_to_error(&Route::Unauthorised));
    }

    let nhs = parse_nhs(nhs_number)?;
    let doc_type = parse_doc_type(doc_type)?;
    verify_patient(client, &nhs).await?;

    let mut batch = UploadBatch::new();
    for path in paths {
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let content_type = content_type_for(&path);
        batch.add_file(UploadDocument::new(
            path,
            metadata.len(),
            content_type,
            doc_type,
        ));
    }

    if let Err(e) = batch.begin_upload(doc_type, &nhs) {
        bail!("{e}");
    }
    println!("Uploading {}...", lgp_core::format::file_count_phrase(batch.files().len() as u64));
    println!("Do not close this window while files are uploading.");

    let batch = Arc::new(std::sync::Mutex::new(batch));
    let summary = dispatch_batch(client, &nhs, batch.clone())
        .await
        .map_err(|e| anyhow!("upload failed: {e}"))?;

    if let Ok(batch) = batch.lock() {
        for file in batch.files() {
            let outcome = match file.state {
                FileState::Succeeded => "uploaded",
                FileState::Failed => "failed",
                _ => "incomplete",
            };
            println!("{}  {}", file.file_name, outcome);
        }
    }
    println!(
        "{} uploaded, {} failed.",
        summary.succeeded, summary.failed
    );

    if summary.failed > 0 {
        bail!("{} file(s) failed to upload", summary.failed);
    }
    Ok(())
}

// ============================================================================
// Shared helpers
// ============================================================================

fn parse_nhs(input: &str) -> anyhow::Result<NhsNumber> {
    NhsNumber::parse(input).map_err(|e| anyhow!("{e}"))
}

fn parse_doc_type(input: &str) -> anyhow::Result<DocType> {
    match input {
        "LG" => Ok(DocType::Lg),
        "ARF" => Ok(DocType::Arf),
        "LG,ARF" => Ok(DocType::LgAndArf),
        other => bail!("unknown document type '{other}' (expected LG, ARF or LG,ARF)"),
    }
}

async fn require_auth(session: &Arc<RwLock<Session>>) -> anyhow::Result<(Role, bool)> {
    let session = session.read().await;
    match session.auth() {
        Some(auth) => Ok((auth.role, auth.is_bsol)),
        None => bail!("not logged in; run 'lgp login' first"),
    }
}

async fn verify_patient(
    client: &RecordsClient,
    nhs: &NhsNumber,
) -> anyhow::Result<PatientDetails> {
    client
        .search_patient(nhs)
        .await
        .map_err(|e| failure_to_error(&e.to_failure()))
}

fn print_patient(patient: &PatientDetails) {
    println!("{}", patient.display_name());
    println!("NHS number: {}", patient.formatted_nhs_number());
    println!("Date of birth: {}", patient.formatted_birth_date());
    if let Some(postcode) = &patient.postal_code {
        println!("Postcode: {}", postcode);
    }
    if patient.superseded {
        println!("This NHS number has been superseded.");
    }
    if patient.restricted {
        println!("Access to this record is restricted.");
    }
    if patient.deceased == Some(true) {
        println!("This patient is recorded as deceased.");
    }
}

fn print_record_details(details: &lgp_core::lloyd_george::RecordDetails) {
    println!("{}", details.file_count_text());
    println!("Total size: {}", details.size_text());
    if let Some(last_updated) = details.last_updated {
        println!("Last updated: {}", last_updated.format("%d %B %Y %H:%M"));
    }
}

fn print_menu(role: Role, has_record: bool, is_bsol: bool) {
    let actions = permitted_actions(role, has_record, is_bsol);
    if actions.is_empty() {
        return;
    }
    println!("Available actions:");
    for action in actions {
        let label = match action.kind {
            ActionKind::Update => "update",
            ActionKind::Download => "download",
        };
        println!("  [{}] {:?}", label, action.action);
    }
}

fn print_deletion_complete(patient: &PatientDetails, files_deleted: u64) {
    println!("Deletion complete.");
    println!(
        "{} of {}'s record have been permanently deleted.",
        lgp_core::format::file_count_phrase(files_deleted),
        patient.display_name()
    );
    println!("No documents are available.");
}

fn route_to_error(route: &Route) -> anyhow::Error {
    match route {
        Route::Home => anyhow!("return to the start and search again"),
        Route::SessionExpired => anyhow!("your session has expired; run 'lgp login' again"),
        Route::Unauthorised => anyhow!("you are not authorised to take this action"),
        Route::ServerError { .. } => {
            let query = route.query_string().unwrap_or_default();
            anyhow!("the service is unavailable; quote /server-error{query} when reporting this")
        }
    }
}

fn failure_to_error(failure: &lgp_core::FetchFailure) -> anyhow::Error {
    use lgp_core::routing::{dispose, FailureDisposition};
    match dispose(failure) {
        FailureDisposition::Navigate(route) => route_to_error(&route),
        FailureDisposition::BusinessStage | FailureDisposition::InlineFailure => {
            anyhow!("the request could not be completed: {failure:?}")
        }
    }
}

fn content_type_for(path: &std::path::Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
    .to_string()
}

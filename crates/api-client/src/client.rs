//! The records API client.

use crate::error::{classify, ApiError};
use crate::wire::{
    AuthWire, DocumentReference, ErrorBody, PatientWire, StitchWire, UploadRequestDocumentWire,
    UploadRequestWire, UploadTargetsWire,
};
use chrono::Utc;
use lgp_core::lloyd_george::RecordDetails;
use lgp_core::patient::PatientDetails;
use lgp_core::session::{Session, UserAuth};
use lgp_types::{DocType, NhsNumber};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Connection establishment timeout. No overall request timeout is set; the
/// server signals long-running work itself with a 504.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A file the upload flow wants a presigned target for.
#[derive(Clone, Debug)]
pub struct UploadFileSpec {
    pub file_name: String,
    pub content_type: String,
    pub doc_type: DocType,
    pub size: u64,
}

/// A presigned upload target issued by the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadTarget {
    pub file_name: String,
    pub url: String,
}

/// Client for the external records-management API.
///
/// The client shares the session with its caller: a successful login or token
/// refresh updates the session in place, and every successful authenticated
/// call records activity against the inactivity window.
#[derive(Clone)]
pub struct RecordsClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<RwLock<Session>>,
}

impl RecordsClient {
    /// Creates a client against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] when the URL does not parse or
    /// does not use an HTTP scheme.
    pub fn new(base_url: &str, session: Arc<RwLock<Session>>) -> Result<Self, ApiError> {
        let cleaned = base_url.trim_end_matches('/');
        let parsed = url::Url::parse(cleaned)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("'{cleaned}': {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl(format!(
                "URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: cleaned.to_string(),
            session,
        })
    }

    // ========================================================================
    // Auth endpoints
    // ========================================================================

    /// Exchanges the login callback's code and state for a session.
    pub async fn login(&self, code: &str, state: &str) -> Result<UserAuth, ApiError> {
        let response = self
            .http
            .get(format!("{}/Auth", self.base_url))
            .query(&[("code", code), ("state", state)])
            .send()
            .await?;

        let wire: AuthWire = handle_response(response).await?;
        let auth = UserAuth::try_from(wire)?;

        self.session.write().await.login(auth.clone(), Utc::now());
        tracing::info!(role = auth.role.to_wire(), "logged in");
        Ok(auth)
    }

    /// Attempts the single token refresh.
    ///
    /// Any failure here is terminal for the calling request and reported as an
    /// authorisation failure.
    async fn refresh_once(&self) -> Result<(), ApiError> {
        let refresh_token = {
            let session = self.session.read().await;
            session
                .auth()
                .and_then(|a| a.refresh_token.clone())
                .ok_or(ApiError::Forbidden)?
        };

        let response = self
            .http
            .get(format!("{}/AuthRefresh", self.base_url))
            .query(&[("refreshToken", refresh_token.as_str())])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("token refresh failed: {}", e);
                ApiError::Forbidden
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "token refresh rejected");
            return Err(ApiError::Forbidden);
        }

        let wire: AuthWire = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        self.session.write().await.replace_tokens(
            wire.authorisation_token,
            wire.refresh_token,
            Utc::now(),
        );
        Ok(())
    }

    // ========================================================================
    // Record endpoints
    // ========================================================================

    /// Looks a patient up by NHS number.
    pub async fn search_patient(&self, patient: &NhsNumber) -> Result<PatientDetails, ApiError> {
        let response = self
            .send_authed(|http, token| {
                http.get(format!("{}/SearchPatient", self.base_url))
                    .query(&[("patientId", patient.as_str())])
                    .bearer_auth(token)
            })
            .await?;

        let wire: PatientWire = handle_response(response).await?;
        PatientDetails::try_from(wire)
    }

    /// Lists stored document metadata for a patient. A 204 means the patient
    /// has no documents of this type and yields an empty list.
    pub async fn search_document_references(
        &self,
        patient: &NhsNumber,
        doc_type: DocType,
    ) -> Result<Vec<DocumentReference>, ApiError> {
        let response = self
            .send_authed(|http, token| {
                http.get(format!("{}/SearchDocumentReferences", self.base_url))
                    .query(&[("patientId", patient.as_str()), ("docType", doc_type.to_wire())])
                    .bearer_auth(token)
            })
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        handle_response(response).await
    }

    /// Requests the stitched Lloyd George record for a patient.
    pub async fn lloyd_george_stitch(
        &self,
        patient: &NhsNumber,
    ) -> Result<RecordDetails, ApiError> {
        let response = self
            .send_authed(|http, token| {
                http.get(format!("{}/LloydGeorgeStitch", self.base_url))
                    .query(&[("patientId", patient.as_str())])
                    .bearer_auth(token)
            })
            .await?;

        let wire: StitchWire = handle_response(response).await?;
        Ok(RecordDetails::from(wire))
    }

    /// Requests the presigned zip manifest URL. A 204 means no zip could be
    /// compiled and yields `None`.
    pub async fn document_manifest(
        &self,
        patient: &NhsNumber,
        doc_type: DocType,
    ) -> Result<Option<String>, ApiError> {
        let response = self
            .send_authed(|http, token| {
                http.get(format!("{}/DocumentManifest", self.base_url))
                    .query(&[("patientId", patient.as_str()), ("docType", doc_type.to_wire())])
                    .bearer_auth(token)
            })
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let url: String = handle_response(response).await?;
        Ok(Some(url))
    }

    /// Permanently deletes a patient's documents of the given type.
    pub async fn delete_documents(
        &self,
        patient: &NhsNumber,
        doc_type: DocType,
    ) -> Result<(), ApiError> {
        let response = self
            .send_authed(|http, token| {
                http.delete(format!("{}/DocumentDelete", self.base_url))
                    .query(&[("patientId", patient.as_str()), ("docType", doc_type.to_wire())])
                    .bearer_auth(token)
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(read_error(status, response).await)
    }

    /// Requests presigned upload targets for a batch of files.
    pub async fn create_upload_targets(
        &self,
        patient: &NhsNumber,
        files: &[UploadFileSpec],
    ) -> Result<Vec<UploadTarget>, ApiError> {
        let body = UploadRequestWire {
            documents: files
                .iter()
                .map(|f| UploadRequestDocumentWire {
                    file_name: f.file_name.clone(),
                    content_type: f.content_type.clone(),
                    doc_type: f.doc_type.to_wire().to_string(),
                    file_size: f.size,
                })
                .collect(),
        };

        let response = self
            .send_authed(|http, token| {
                http.post(format!("{}/DocumentReference", self.base_url))
                    .query(&[("patientId", patient.as_str())])
                    .bearer_auth(token)
                    .json(&body)
            })
            .await?;

        let wire: UploadTargetsWire = handle_response(response).await?;
        Ok(wire
            .documents
            .into_iter()
            .map(|d| UploadTarget {
                file_name: d.file_name,
                url: d.url,
            })
            .collect())
    }

    // ========================================================================
    // Presigned URL transfers
    // ========================================================================

    /// Fetches the bytes behind a presigned URL. The URL carries its own
    /// credentials; no bearer token is attached.
    pub async fn fetch_presigned(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(read_error(status, response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Streams a file body to a presigned upload URL.
    pub(crate) async fn put_presigned(
        &self,
        url: &str,
        content_type: &str,
        content_length: u64,
        body: reqwest::Body,
    ) -> Result<(), ApiError> {
        let response = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(read_error(status, response).await);
        }
        Ok(())
    }

    // ========================================================================
    // Shared plumbing
    // ========================================================================

    async fn bearer(&self) -> Result<String, ApiError> {
        self.session
            .read()
            .await
            .bearer_token()
            .map(str::to_string)
            .ok_or(ApiError::NotAuthenticated)
    }

    /// Sends an authenticated request, refreshing the token and replaying
    /// exactly once on a 403. A second 403 is terminal and clears the
    /// session.
    async fn send_authed<F>(&self, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    {
        let token = self.bearer().await?;
        let response = build(&self.http, &token).send().await?;

        if response.status() != StatusCode::FORBIDDEN {
            self.record_activity().await;
            return Ok(response);
        }

        tracing::debug!("received 403, attempting one token refresh");
        if let Err(e) = self.refresh_once().await {
            self.session.write().await.logout();
            return Err(e);
        }

        let token = self.bearer().await?;
        let response = build(&self.http, &token).send().await?;
        if response.status() == StatusCode::FORBIDDEN {
            self.session.write().await.logout();
            return Err(ApiError::Forbidden);
        }

        self.record_activity().await;
        Ok(response)
    }

    async fn record_activity(&self) {
        self.session.write().await.touch(Utc::now());
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()));
    }
    Err(read_error(status, response).await)
}

async fn read_error(status: StatusCode, response: reqwest::Response) -> ApiError {
    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    classify(status.as_u16(), parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Arc<RwLock<Session>> {
        Arc::new(RwLock::new(Session::logged_out(Utc::now())))
    }

    #[test]
    fn accepts_http_and_https_base_urls() {
        assert!(RecordsClient::new("https://api.example.test", session()).is_ok());
        assert!(RecordsClient::new("http://localhost:3000/", session()).is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(matches!(
            RecordsClient::new("ftp://api.example.test", session()),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            RecordsClient::new("not a url", session()),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn authenticated_call_requires_a_session() {
        let client = RecordsClient::new("https://api.example.test", session())
            .expect("client builds");
        let err = client.bearer().await.expect_err("no session held");
        assert!(matches!(err, ApiError::NotAuthenticated));
    }
}

//! Shared error-to-route policy.
//!
//! Every HTTP failure surfaced by the request layer is first reduced to a
//! [`FetchFailure`] category, then run through [`dispose`] with a fixed
//! priority: authorisation failures leave the current workflow for the
//! session-expired route, server errors leave for the error page with an
//! opaque diagnostic payload, the feature-specific 4xx conditions are handed
//! back to the owning stage machine, and anything else becomes an inline
//! failure with no navigation.
//!
//! The development-only mock override that short-circuits this policy lives in
//! the request layer behind its `mock-responses` feature and is absent from
//! production builds.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Errors raised while decoding an opaque error payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid base64: {0}")]
    Base64(base64::DecodeError),
    #[error("payload is not a two-element JSON array: {0}")]
    Shape(String),
}

/// Category of a failed request, independent of any one endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchFailure {
    /// HTTP 403 that survived the single token refresh.
    Unauthorized,
    /// HTTP 404.
    NotFound,
    /// HTTP 400, with the service error code when the body carried one.
    BadRequest { code: Option<String> },
    /// HTTP 423: the record set is still being assembled.
    Locked,
    /// HTTP 504: the operation ran too long server-side.
    GatewayTimeout,
    /// Any other HTTP 5xx, with its diagnostic identifiers.
    Server {
        err_code: String,
        interaction_id: String,
    },
    /// Network, decoding or other unclassified failures.
    Other(String),
}

/// Target routes a failure can navigate to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// The start of the patient journey.
    Home,
    /// Login-adjacent route shown when the session is no longer valid.
    SessionExpired,
    /// Shown when a role is not allowed to take the attempted path.
    Unauthorised,
    /// Generic error page carrying the opaque payload.
    ServerError { encoded_error: String },
}

impl Route {
    /// The query string appended when navigating to the error page.
    pub fn query_string(&self) -> Option<String> {
        match self {
            Route::ServerError { encoded_error } => {
                Some(format!("?encodedError={}", encoded_error))
            }
            _ => None,
        }
    }
}

/// What the caller should do with a failure, in policy priority order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Leave the current workflow: the session is cleared or the error page
    /// shown. Terminal for the owning stage machine.
    Navigate(Route),
    /// A business condition the owning feature maps to one of its stages.
    BusinessStage,
    /// Stay on the page and render an inline failure block.
    InlineFailure,
}

/// Applies the shared policy to a failure. First match wins.
pub fn dispose(failure: &FetchFailure) -> FailureDisposition {
    match failure {
        FetchFailure::Unauthorized => FailureDisposition::Navigate(Route::SessionExpired),
        FetchFailure::Server {
            err_code,
            interaction_id,
        } => FailureDisposition::Navigate(Route::ServerError {
            encoded_error: encode_error_payload(err_code, interaction_id),
        }),
        FetchFailure::NotFound
        | FetchFailure::Locked
        | FetchFailure::GatewayTimeout
        | FetchFailure::BadRequest { code: Some(_) } => FailureDisposition::BusinessStage,
        FetchFailure::BadRequest { code: None } | FetchFailure::Other(_) => {
            FailureDisposition::InlineFailure
        }
    }
}

/// Encodes `[err_code, interaction_id]` as the opaque query payload.
pub fn encode_error_payload(err_code: &str, interaction_id: &str) -> String {
    let json = serde_json::json!([err_code, interaction_id]);
    BASE64.encode(json.to_string())
}

/// Decodes the opaque query payload back into `(err_code, interaction_id)`.
pub fn decode_error_payload(encoded: &str) -> Result<(String, String), PayloadError> {
    let bytes = BASE64.decode(encoded).map_err(PayloadError::Base64)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| PayloadError::Shape(e.to_string()))?;

    match value.as_array().map(|a| a.as_slice()) {
        Some([code, interaction]) => {
            let code = code
                .as_str()
                .ok_or_else(|| PayloadError::Shape("error code is not a string".into()))?;
            let interaction = interaction
                .as_str()
                .ok_or_else(|| PayloadError::Shape("interaction id is not a string".into()))?;
            Ok((code.to_string(), interaction.to_string()))
        }
        _ => Err(PayloadError::Shape(
            "expected a two-element array".to_string(),
        )),
    }
}

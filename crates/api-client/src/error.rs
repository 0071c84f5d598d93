//! Request-layer error taxonomy and HTTP status mapping.

use crate::wire::ErrorBody;
use lgp_core::routing::FetchFailure;

/// Errors surfaced by the request layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An authenticated call was attempted with no session.
    #[error("not logged in")]
    NotAuthenticated,

    /// HTTP 403 that survived the single token refresh.
    #[error("authorisation rejected")]
    Forbidden,

    /// HTTP 404.
    #[error("resource not found")]
    NotFound,

    /// HTTP 400, with the service error code when the body carried one.
    #[error("bad request: {message}")]
    BadRequest {
        code: Option<String>,
        message: String,
    },

    /// HTTP 423: the record set is locked while files are ingested.
    #[error("the record is still being assembled")]
    Locked,

    /// HTTP 504: the operation ran too long server-side.
    #[error("the operation timed out server-side")]
    GatewayTimeout,

    /// Any other HTTP 5xx.
    #[error("service error {err_code} (interaction {interaction_id})")]
    Server {
        status: u16,
        err_code: String,
        interaction_id: String,
    },

    /// A status outside the contract, e.g. an unexpected 3xx.
    #[error("unexpected HTTP status {0}")]
    Unexpected(u16),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Reduces the error to the shared failure category consumed by the
    /// stage machines and the error-to-route policy.
    pub fn to_failure(&self) -> FetchFailure {
        match self {
            ApiError::NotAuthenticated | ApiError::Forbidden => FetchFailure::Unauthorized,
            ApiError::NotFound => FetchFailure::NotFound,
            ApiError::BadRequest { code, .. } => FetchFailure::BadRequest { code: code.clone() },
            ApiError::Locked => FetchFailure::Locked,
            ApiError::GatewayTimeout => FetchFailure::GatewayTimeout,
            ApiError::Server {
                err_code,
                interaction_id,
                ..
            } => FetchFailure::Server {
                err_code: err_code.clone(),
                interaction_id: interaction_id.clone(),
            },
            ApiError::Unexpected(status) => {
                FetchFailure::Other(format!("unexpected HTTP status {status}"))
            }
            ApiError::Network(e) => FetchFailure::Other(e.to_string()),
            ApiError::FileRead(e) => FetchFailure::Other(e.to_string()),
            ApiError::Decode(msg) => FetchFailure::Other(msg.clone()),
            ApiError::InvalidBaseUrl(msg) => FetchFailure::Other(msg.clone()),
        }
    }
}

/// Maps a non-success status and its parsed body to an [`ApiError`].
///
/// Server errors always carry an error code and interaction id for the opaque
/// diagnostic payload; when the body omits them a code is derived from the
/// status and a fresh interaction id is minted.
pub(crate) fn classify(status: u16, body: ErrorBody) -> ApiError {
    match status {
        400 => ApiError::BadRequest {
            code: body.err_code,
            message: body
                .message
                .unwrap_or_else(|| "invalid request".to_string()),
        },
        403 => ApiError::Forbidden,
        404 => ApiError::NotFound,
        423 => ApiError::Locked,
        504 => ApiError::GatewayTimeout,
        500..=599 => ApiError::Server {
            status,
            err_code: body.err_code.unwrap_or_else(|| format!("HTTP_{status}")),
            interaction_id: body
                .interaction_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        },
        other => ApiError::Unexpected(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(message: Option<&str>, err_code: Option<&str>) -> ErrorBody {
        ErrorBody {
            message: message.map(str::to_string),
            err_code: err_code.map(str::to_string),
            interaction_id: None,
        }
    }

    #[test]
    fn contract_statuses_map_to_their_categories() {
        assert!(matches!(
            classify(403, body(None, None)),
            ApiError::Forbidden
        ));
        assert!(matches!(classify(404, body(None, None)), ApiError::NotFound));
        assert!(matches!(classify(423, body(None, None)), ApiError::Locked));
        assert!(matches!(
            classify(504, body(None, None)),
            ApiError::GatewayTimeout
        ));
    }

    #[test]
    fn bad_request_keeps_the_service_code() {
        match classify(400, body(Some("no record"), Some("LGL_400"))) {
            ApiError::BadRequest { code, message } => {
                assert_eq!(code.as_deref(), Some("LGL_400"));
                assert_eq!(message, "no record");
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn server_errors_always_carry_diagnostics() {
        match classify(500, body(None, None)) {
            ApiError::Server {
                status,
                err_code,
                interaction_id,
            } => {
                assert_eq!(status, 500);
                assert_eq!(err_code, "HTTP_500");
                assert!(!interaction_id.is_empty());
            }
            other => panic!("expected Server, got {other:?}"),
        }

        match classify(502, body(Some("bad gateway"), Some("GWY_5002"))) {
            ApiError::Server { err_code, .. } => assert_eq!(err_code, "GWY_5002"),
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[test]
    fn failure_categories_feed_the_shared_policy() {
        assert_eq!(
            ApiError::Forbidden.to_failure(),
            FetchFailure::Unauthorized
        );
        assert_eq!(ApiError::NotFound.to_failure(), FetchFailure::NotFound);
        assert_eq!(
            classify(400, body(None, Some("LGL_400"))).to_failure(),
            FetchFailure::BadRequest {
                code: Some("LGL_400".to_string())
            }
        );
        assert!(matches!(
            ApiError::Unexpected(302).to_failure(),
            FetchFailure::Other(_)
        ));
    }
}

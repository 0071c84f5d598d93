//! Typed HTTP request layer for the records API.
//!
//! One narrow async method per collaborator endpoint, each translating a
//! typed request into an HTTP call and a typed response or [`ApiError`].
//! Authenticated requests carry the session's bearer token; a 403 triggers
//! exactly one token refresh and one replay before becoming terminal.
//!
//! This crate owns the wire models and the HTTP-status→error mapping. What a
//! failure means for the page is decided by the stage machines in `lgp-core`,
//! fed via [`ApiError::to_failure`].

mod client;
mod error;
mod upload;
mod wire;

#[cfg(feature = "mock-responses")]
pub mod mock;

pub use client::{RecordsClient, UploadFileSpec, UploadTarget};
pub use error::ApiError;
pub use upload::dispatch_batch;
pub use wire::DocumentReference;
